use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use pkgfront::backend::{self, AurHelper};
use pkgfront::cli::{BackendArg, Cli, Commands, ConfigCmd, TargetsCmd};
use pkgfront::config::{self, BackendKind, FrontConfig};
use pkgfront::doctor::Report;
use pkgfront::query::{self, Query};
use pkgfront::transaction::{CommandExecuting, Mode, Outcome, Targets, Transaction};
use pkgfront::{actions, system};
use std::io::Write;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    pkgfront::log::init(cli.verbose || FrontConfig::load().log_verbose);
    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "[pkgfront]".red(), e);
        std::process::exit(1);
    }
}

/// Config file values, overridden by whatever was given on the command line.
fn effective_config(cli: &Cli) -> FrontConfig {
    let mut cfg = FrontConfig::load();
    if let Some(b) = cli.backend {
        cfg.backend = Some(match b {
            BackendArg::Pacman => BackendKind::Pacman,
            BackendArg::Pkg => BackendKind::Pkg,
        });
    }
    if let Some(t) = &cli.terminal {
        cfg.terminal = Some(t.clone());
    }
    cfg
}

fn write_raw(bytes: &[u8]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(bytes)?;
    out.flush()?;
    Ok(())
}

fn report(what: &str, outcome: Outcome) -> Result<()> {
    if outcome.success() {
        println!("{} {} finished", "[pkgfront]".green(), what);
        Ok(())
    } else {
        bail!("{} failed (exit code {:?}, {:?})", what, outcome.code, outcome.status)
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Config { cmd } = &cli.command {
        return run_config(cmd);
    }
    let cfg = effective_config(&cli);
    let backend = backend::select(&cfg)?;
    let aur = (backend.name() == "pacman")
        .then(|| AurHelper::detect(cfg.aur_helper.as_deref()))
        .flatten();
    let query = Query::new(backend.clone())
        .with_aur_helper(aur.clone())
        .with_language(cfg.language());
    let mode = if cli.in_terminal {
        Mode::Terminal
    } else if cli.no_terminal {
        Mode::Session
    } else {
        Mode::Auto
    };
    let tx = Transaction::new(backend.clone(), cfg.clone())
        .with_mode(mode)
        .with_aur_helper(aur)
        .with_echo(true);

    if !system::is_app_running("pkgfront", true) {
        actions::remove_stale();
    }

    match cli.command {
        Commands::Search {
            term,
            names_only,
            aur,
        } => {
            if aur {
                write_raw(&query.aur_search(&term).await?)?;
            } else {
                write_raw(&query.remote_package_list(&term, !names_only).await)?;
            }
        }
        Commands::Info { pkg, local, field } => match field {
            Some(field) => {
                let value = if local {
                    query.field_from_local_package(&field, &pkg).await
                } else {
                    query.field_from_remote_package(&field, &pkg).await
                };
                match value {
                    Some(v) => println!("{}", v),
                    None => bail!("no {} field for {}", field, pkg),
                }
            }
            None => {
                let out = query.package_information(&pkg, local).await;
                if out.is_empty() && !local && query.aur_helper().is_some() {
                    write_raw(&query.aur_package_information(&pkg).await?)?;
                } else {
                    write_raw(&out)?;
                }
            }
        },
        Commands::Installed => write_raw(&query.installed_packages().await)?,
        Commands::Outdated { aur: true } => {
            for (name, installed, available) in query.aur_package_version_information().await? {
                println!("{} {} -> {}", name.bold(), installed, available.green());
            }
        }
        Commands::Outdated { aur: false } => {
            let out = query.outdated_package_list().await;
            let ignored = query.ignored_packages();
            for (name, version) in query::name_version_pairs(&out) {
                if ignored.contains(&name) {
                    println!("{} {} {}", name, version, "[ignored]".yellow());
                } else {
                    println!("{} {}", name.bold(), version);
                }
            }
        }
        Commands::Foreign => write_raw(&query.foreign_package_list().await?)?,
        Commands::Orphans => write_raw(&query.unrequired_package_list().await)?,
        Commands::Deps { pkg } => write_raw(&query.dependencies_list(&pkg).await)?,
        Commands::Files { pkg, pkgfile } => {
            if pkgfile {
                write_raw(&query.package_contents_pkgfile(&pkg).await?)?;
            } else {
                write_raw(&query.package_contents(&pkg).await)?;
            }
        }
        Commands::Owns { path } => match query.package_by_file_path(&path).await {
            Some(pkg) => println!("{}", pkg),
            None => bail!("no package owns {}", path),
        },
        Commands::Suggest { file } => {
            for path in query.file_path_suggestions(&file).await {
                println!("{}", path);
            }
        }
        Commands::Groups => write_raw(&query.package_groups().await?)?,
        Commands::Group { name } => write_raw(&query.packages_from_group(&name).await?)?,
        Commands::List { repo } => write_raw(&query.package_list(repo.as_deref()).await)?,
        Commands::Ignored => {
            for pkg in query.ignored_packages() {
                println!("{}", pkg);
            }
        }
        Commands::Targets { cmd } => match cmd {
            TargetsCmd::Upgrade { pkg } => {
                write_raw(&query.target_upgrade_list(pkg.as_deref()).await)?
            }
            TargetsCmd::Remove { pkg } => write_raw(&query.target_removal_list(&pkg).await)?,
        },
        Commands::SyncDb => report(
            "database sync",
            tx.execute(CommandExecuting::SyncDatabase, &Targets::default())
                .await?,
        )?,
        Commands::Upgrade => {
            let kind = if mode == Mode::Terminal {
                CommandExecuting::RunSystemUpgradeInTerminal
            } else {
                CommandExecuting::SystemUpgrade
            };
            report("system upgrade", tx.execute(kind, &Targets::default()).await?)?
        }
        Commands::Install { pkgs, aur } => {
            if pkgs.is_empty() {
                bail!("nothing to install");
            }
            let outcome = if aur {
                tx.install_aur(&pkgs).await?
            } else {
                tx.execute(CommandExecuting::Install, &Targets::install(pkgs))
                    .await?
            };
            report("install", outcome)?
        }
        Commands::Local { paths } => {
            let targets = Targets {
                files: paths,
                ..Default::default()
            };
            report(
                "local install",
                tx.execute(CommandExecuting::LocalPkgRefresh, &targets).await?,
            )?
        }
        Commands::Remove { pkgs, install } => {
            let kind = if install.is_empty() {
                CommandExecuting::Remove
            } else {
                CommandExecuting::RemoveInstall
            };
            let targets = Targets {
                install,
                remove: pkgs,
                ..Default::default()
            };
            report("remove", tx.execute(kind, &targets).await?)?
        }
        Commands::Terminal { commands } => {
            let outcome = if commands.is_empty() {
                tx.open_root_terminal().await?
            } else {
                let targets = Targets {
                    commands,
                    ..Default::default()
                };
                tx.execute(CommandExecuting::RunInTerminal, &targets).await?
            };
            report("terminal", outcome)?
        }
        Commands::MirrorCheck => report(
            "mirror check",
            tx.execute(CommandExecuting::MirrorCheck, &Targets::default())
                .await?,
        )?,
        Commands::Clean { keep } => {
            report("cache clean", tx.clean_cache(keep.unwrap_or(cfg.clean_keep)).await?)?
        }
        Commands::Doctor { json } => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
            pb.set_message("probing system...");
            pb.enable_steady_tick(Duration::from_millis(100));
            let report = Report::gather(backend.as_ref(), &cfg).await;
            pb.finish_and_clear();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Config { cmd } => run_config(&cmd)?,
    }
    Ok(())
}

fn print_report(report: &Report) {
    let none = || "-".to_string();
    println!("{:<16} {}", "distro".bold(), report.distro);
    println!("{:<16} {}", "architecture".bold(), report.architecture);
    println!("{:<16} {}", "root".bold(), report.root);
    println!(
        "{:<16} {} ({})",
        "backend".bold(),
        report.backend,
        report.backend_version.clone().unwrap_or_else(none)
    );
    println!("{:<16} {}", "aur helper".bold(), report.aur_helper.clone().unwrap_or_else(none));
    println!("{:<16} {}", "terminal".bold(), report.terminal.clone().unwrap_or_else(none));
    println!(
        "{:<16} {}",
        "privilege".bold(),
        report.privilege_tool.clone().unwrap_or_else(none)
    );
    println!("{:<16} {}", "internet".bold(), report.internet);
    println!("{:<16} {}", "pkgfile".bold(), report.pkgfile);
    if report.backend == "pacman" {
        println!("{:<16} {}", "pacman.conf".bold(), report.pacman_conf.display());
        println!("{:<16} {}", "ILoveCandy".bold(), report.i_love_candy);
        println!("{:<16} {}", "IgnorePkg".bold(), report.ignored_packages.join(" "));
        println!("{:<16} {}", "repositories".bold(), report.repositories.join(" "));
    }
    println!("{:<16} {}", "config".bold(), report.config_path.display());
    let issues = report.issues();
    if issues.is_empty() {
        println!("{} System appears healthy", "[doctor]".green());
    } else {
        for issue in issues {
            println!("{} {}", "[doctor]".yellow(), issue);
        }
    }
}

fn run_config(cmd: &ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Show => println!("{}", config::show_config()),
        ConfigCmd::Get { key } => match config::get_config_key(key) {
            Some(val) => println!("{} = {}", key, val),
            None => println!("Key '{}' not found in config.", key),
        },
        ConfigCmd::Set { key, value } => {
            config::set_config_key(key, value)
                .with_context(|| format!("setting {} in {}", key, config::config_path().display()))?;
            println!("{} {} = {}", "[config]".green(), key, value);
        }
        ConfigCmd::Reset => {
            config::reset_config().context("resetting config")?;
            println!("{} reset to defaults", "[config]".green());
        }
    }
    Ok(())
}
