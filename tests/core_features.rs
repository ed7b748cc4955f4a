// Core feature tests for pkgfront
use anyhow::{Context, Result};
use pkgfront::actions::{self, ActionsFile};
use pkgfront::backend::{PacmanBackend, PkgBackend};
use pkgfront::config::{self, BackendKind, FrontConfig};
use pkgfront::doctor::Report;
use pkgfront::log::LogPane;
use pkgfront::pacman_conf;
use pkgfront::PkgError;
use pkgfront::privilege::{PrivilegeTool, shell_quote, shell_word};
use pkgfront::system::{self, Distro};
use pkgfront::terminal::{ExecStyle, Terminal};
use pkgfront::transaction::{CommandExecuting, MIRROR_CHECK_APP, Targets, Transaction};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

const PACMAN_CONF: &str = r#"
[options]
HoldPkg     = pacman glibc
#IgnorePkg   = commented-out
IgnorePkg   = linux linux-headers # kernel pinned
IgnorePkg   = nvidia
IgnoreGroup = gnome
IgnorePkgExtra = not-a-match
Color
ILoveCandy

[core]
Include = /etc/pacman.d/mirrorlist

[extra]
Include = /etc/pacman.d/mirrorlist
"#;

#[test]
fn test_pacman_conf_field_scraping() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pacman.conf");
    fs::write(&path, PACMAN_CONF).context("Failed to write fixture")?;

    assert_eq!(
        pacman_conf::get_field(&path, "IgnorePkg"),
        vec!["linux", "linux-headers", "nvidia"]
    );
    assert_eq!(pacman_conf::get_field(&path, "IgnoreGroup"), vec!["gnome"]);
    assert_eq!(pacman_conf::get_field(&path, "HoldPkg"), vec!["pacman", "glibc"]);
    assert!(pacman_conf::get_field(&path, "NoUpgrade").is_empty());
    Ok(())
}

#[test]
fn test_pacman_conf_missing_file_is_empty() {
    let path = PathBuf::from("/nonexistent/pkgfront/pacman.conf");
    assert!(pacman_conf::get_field(&path, "IgnorePkg").is_empty());
}

#[test]
fn test_pacman_conf_options_and_repositories() {
    assert!(pacman_conf::has_option(PACMAN_CONF, "ILoveCandy"));
    assert!(pacman_conf::has_option(PACMAN_CONF, "Color"));
    assert!(!pacman_conf::has_option("#ILoveCandy\n", "ILoveCandy"));
    assert!(!pacman_conf::has_option("ILoveCandyFloss\n", "ILoveCandy"));
    assert_eq!(pacman_conf::repositories_in(PACMAN_CONF), vec!["core", "extra"]);
}

#[test]
fn test_config_set_get_reset() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested/pkgfront.toml");

    // missing file loads defaults
    assert_eq!(FrontConfig::load_from(&path), FrontConfig::default());

    config::set_config_key_at(&path, "backend", "pkg")?;
    config::set_config_key_at(&path, "clean_keep", "5")?;
    config::set_config_key_at(&path, "user_language", "true")?;
    config::set_config_key_at(&path, "terminal", "kitty")?;

    let cfg = FrontConfig::load_from(&path);
    assert_eq!(cfg.backend, Some(BackendKind::Pkg));
    assert_eq!(cfg.clean_keep, 5);
    assert!(cfg.user_language);
    assert_eq!(cfg.terminal.as_deref(), Some("kitty"));
    assert_eq!(
        config::get_config_key_at(&path, "clean_keep").as_deref(),
        Some("5")
    );
    assert_eq!(
        config::get_config_key_at(&path, "backend").as_deref(),
        Some("\"pkg\"")
    );
    assert!(config::get_config_key_at(&path, "aur_helper").is_none());

    config::reset_config_at(&path)?;
    assert_eq!(FrontConfig::load_from(&path), FrontConfig::default());
    Ok(())
}

#[test]
fn test_config_rejects_invalid_values() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pkgfront.toml");
    config::set_config_key_at(&path, "clean_keep", "2")?;
    let before = fs::read_to_string(&path)?;

    assert!(config::set_config_key_at(&path, "backend", "apt").is_err());
    assert!(config::set_config_key_at(&path, "clean_keep", "plenty").is_err());
    assert_eq!(fs::read_to_string(&path)?, before);
    Ok(())
}

#[test]
fn test_config_parse_failure_falls_back_to_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pkgfront.toml");
    fs::write(&path, "backend = [this is not toml")?;
    assert_eq!(FrontConfig::load_from(&path), FrontConfig::default());
    Ok(())
}

#[test]
fn test_actions_file_permissions_and_cleanup() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut file = ActionsFile::create_in(dir.path())?;
    file.push("echo staged")?;
    file.finalize()?;

    let path = file.path().to_path_buf();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("actions file has no name")?;
    assert!(name.starts_with(actions::PREFIX));
    let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o500);

    let body = fs::read_to_string(&path)?;
    assert!(body.starts_with("#!/bin/sh\n"));
    assert!(body.contains("echo staged\n"));

    let out = pkgfront::process::run_command(&format!(
        "sh {}",
        shell_quote(&path.to_string_lossy())
    ));
    assert_eq!(out.stdout_str(), "staged\n");

    drop(file);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_remove_stale_actions_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join(format!("{}abc", actions::PREFIX)), "x")?;
    fs::write(dir.path().join(format!("{}def", actions::PREFIX)), "y")?;
    fs::write(dir.path().join("unrelated.txt"), "z")?;

    let removed = actions::remove_stale_in(dir.path());
    assert_eq!(removed.len(), 2);
    assert!(dir.path().join("unrelated.txt").exists());
    assert!(actions::remove_stale_in(dir.path()).is_empty());
    Ok(())
}

#[test]
fn test_terminal_invocation_args() {
    let xterm = Terminal::new("xterm");
    assert_eq!(xterm.command_args("ls"), vec!["-e", "sh", "-c", "ls"]);

    let kitty = Terminal::new("kitty");
    assert_eq!(kitty.style, ExecStyle::Direct);
    assert_eq!(kitty.command_args("ls"), vec!["sh", "-c", "ls"]);

    let gnome = Terminal::new("gnome-terminal");
    assert_eq!(gnome.command_args("ls"), vec!["--", "sh", "-c", "ls"]);

    let xfce = Terminal::new("xfce4-terminal");
    assert_eq!(xfce.command_args("ls"), vec!["-x", "sh", "-c", "ls"]);

    let lx = Terminal::new("lxterminal");
    assert_eq!(lx.command_args("ls -l"), vec!["-e", "sh -c 'ls -l'"]);

    // unknown emulators get the common -e convention
    assert_eq!(Terminal::new("my-term").style, ExecStyle::DashE);
}

#[test]
fn test_transaction_commands_pacman() -> Result<()> {
    let tx = Transaction::new(Arc::new(PacmanBackend), FrontConfig::default());
    let pkgs = |p: &[&str]| p.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    assert_eq!(
        tx.commands(CommandExecuting::SyncDatabase, &Targets::default())?,
        vec!["pacman -Sy"]
    );
    assert_eq!(
        tx.commands(CommandExecuting::Install, &Targets::install(pkgs(&["vim", "git"])))?,
        vec!["pacman -S --noconfirm vim git"]
    );
    let swap = Targets {
        install: pkgs(&["pipewire-pulse"]),
        remove: pkgs(&["pulseaudio"]),
        ..Default::default()
    };
    assert_eq!(
        tx.commands(CommandExecuting::RemoveInstall, &swap)?,
        vec![
            "pacman -R --noconfirm pulseaudio",
            "pacman -S --noconfirm pipewire-pulse"
        ]
    );
    let local = Targets {
        files: pkgs(&["/tmp/my pkg-1.0-1-x86_64.pkg.tar.zst"]),
        ..Default::default()
    };
    assert_eq!(
        tx.commands(CommandExecuting::LocalPkgRefresh, &local)?,
        vec!["pacman -U --noconfirm '/tmp/my pkg-1.0-1-x86_64.pkg.tar.zst'"]
    );
    assert!(tx.commands(CommandExecuting::None, &Targets::default())?.is_empty());
    assert!(tx
        .commands(CommandExecuting::Install, &Targets::default())
        .is_err());
    assert!(tx
        .commands(CommandExecuting::RemoveInstall, &Targets::remove(pkgs(&["a"])))
        .is_err());
    Ok(())
}

#[test]
fn test_transaction_targets_are_shell_safe() -> Result<()> {
    let tx = Transaction::new(Arc::new(PacmanBackend), FrontConfig::default());
    let targets = Targets::install(vec![
        "glibc>=2.30".to_string(),
        "foo>=1".to_string(),
        "a;b".to_string(),
        "$(id)".to_string(),
        "vim".to_string(),
    ]);
    let lines = tx.commands(CommandExecuting::Install, &targets)?;
    assert_eq!(
        lines,
        vec!["pacman -S --noconfirm 'glibc>=2.30' 'foo>=1' 'a;b' '$(id)' vim"]
    );

    // printf stands in for pacman: every target must arrive as one argument
    let dir = tempfile::tempdir()?;
    let args = lines[0]
        .strip_prefix("pacman ")
        .context("line does not start with pacman")?;
    let out = pkgfront::process::run_command(&format!(
        "cd {} && printf '%s\\n' {}",
        shell_quote(&dir.path().to_string_lossy()),
        args
    ));
    assert!(out.success());
    assert_eq!(
        out.stdout_str(),
        "-S\n--noconfirm\nglibc>=2.30\nfoo>=1\na;b\n$(id)\nvim\n"
    );
    // no redirection happened
    assert_eq!(fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_missing_mirror_check_is_reported_as_missing_tool() {
    if system::has_executable(MIRROR_CHECK_APP) {
        return;
    }
    let tx = Transaction::new(Arc::new(PacmanBackend), FrontConfig::default());
    match tx.commands(CommandExecuting::MirrorCheck, &Targets::default()) {
        Err(err @ PkgError::MissingTool(_)) => {
            assert_eq!(err.to_string(), "`mirror-check` is not installed");
        }
        other => panic!("expected MissingTool, got {:?}", other),
    }
}

#[test]
fn test_transaction_commands_pkg() -> Result<()> {
    let tx = Transaction::new(Arc::new(PkgBackend), FrontConfig::default());
    assert_eq!(
        tx.commands(CommandExecuting::SystemUpgrade, &Targets::default())?,
        vec!["pkg upgrade -y"]
    );
    assert_eq!(
        tx.commands(
            CommandExecuting::Remove,
            &Targets::remove(vec!["firefox".to_string()])
        )?,
        vec!["pkg remove -y firefox"]
    );
    Ok(())
}

#[tokio::test]
async fn test_transaction_none_is_a_no_op() -> Result<()> {
    let tx = Transaction::new(Arc::new(PacmanBackend), FrontConfig::default());
    let outcome = tx
        .execute(CommandExecuting::None, &Targets::default())
        .await?;
    assert!(outcome.success());
    assert!(tx.log().get().is_empty());
    Ok(())
}

#[test]
fn test_command_kinds() {
    assert!(!CommandExecuting::None.needs_root());
    assert!(!CommandExecuting::MirrorCheck.needs_root());
    assert!(CommandExecuting::SystemUpgrade.needs_root());
    assert!(CommandExecuting::RunInTerminal.forces_terminal());
    assert!(CommandExecuting::RunSystemUpgradeInTerminal.forces_terminal());
    assert!(!CommandExecuting::Install.forces_terminal());
}

#[test]
fn test_distro_detection() {
    assert_eq!(Distro::from_os_release("ID=arch\n"), Distro::Arch);
    assert_eq!(
        Distro::from_os_release("NAME=\"Manjaro Linux\"\nID=manjaro\nID_LIKE=arch\n"),
        Distro::Manjaro
    );
    assert_eq!(
        Distro::from_os_release("ID=\"cachyos\"\nID_LIKE=\"arch\"\n"),
        Distro::Arch
    );
    assert_eq!(Distro::from_os_release("ID=freebsd\n"), Distro::FreeBsd);
    assert_eq!(Distro::from_os_release("ID=debian\n"), Distro::Unknown);
    assert_eq!(Distro::from_os_release(""), Distro::Unknown);
}

#[test]
fn test_instance_counting() {
    let ps = "systemd\nbash\npkgfront\nsh\npkgfront\n";
    assert_eq!(system::count_instances(ps, "pkgfront"), 2);
    assert_eq!(system::count_instances(ps, "pkgfron"), 0);
    // comm is cut at 15 chars
    assert_eq!(
        system::count_instances("gnome-terminal-\n", "gnome-terminal-server"),
        1
    );
}

#[test]
fn test_privilege_helpers() {
    assert_eq!(shell_quote("ls -l"), "'ls -l'");
    assert_eq!(shell_quote("it's"), r"'it'\''s'");
    assert_eq!(shell_word("linux-lts"), "linux-lts");
    assert_eq!(shell_word("lib32-glibc@2.39+x:y/z=1"), "lib32-glibc@2.39+x:y/z=1");
    assert_eq!(shell_word("foo>=1"), "'foo>=1'");
    assert_eq!(shell_word("*"), "'*'");
    assert_eq!(shell_word(""), "''");
    assert_eq!(PrivilegeTool::from_name(" DOAS "), Some(PrivilegeTool::Doas));
    assert_eq!(PrivilegeTool::from_name("su"), None);
    assert_eq!(
        PrivilegeTool::Sudo.wrap("pacman -Syu"),
        "sudo sh -c 'pacman -Syu'"
    );
}

#[test]
fn test_log_pane_is_bounded() {
    let pane = LogPane::new();
    for i in 0..1005 {
        pane.push(&format!("line {}", i));
    }
    let lines = pane.get();
    assert_eq!(lines.len(), 1000);
    assert!(lines[0].ends_with("line 5"));
    assert!(lines[999].ends_with("line 1004"));

    pane.clear();
    pane.push_chunk("one\n\n  \ntwo\n");
    assert_eq!(pane.get().len(), 2);
}

#[test]
fn test_doctor_issues() {
    let report = Report {
        distro: "Arch Linux".into(),
        architecture: "x86_64".into(),
        root: false,
        backend: "pacman".into(),
        backend_version: None,
        aur_helper: None,
        terminal: None,
        privilege_tool: None,
        internet: true,
        pkgfile: false,
        pacman_conf: PathBuf::from("/nonexistent/pacman.conf"),
        i_love_candy: false,
        ignored_packages: Vec::new(),
        repositories: Vec::new(),
        config_path: PathBuf::from("/tmp/pkgfront.toml"),
    };
    let issues = report.issues();
    assert_eq!(issues.len(), 4);
    assert!(issues.iter().any(|i| i.contains("pacman is not runnable")));
    assert!(issues.iter().any(|i| i.contains("/nonexistent/pacman.conf")));
}
