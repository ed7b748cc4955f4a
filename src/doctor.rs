use crate::backend::{AurHelper, Backend};
use crate::config::FrontConfig;
use crate::privilege::{self, PrivilegeTool};
use crate::terminal::Terminal;
use crate::{pacman_conf, system};
use serde::Serialize;
use std::path::PathBuf;

/// Snapshot of everything pkgfront depends on at runtime.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub distro: String,
    pub architecture: String,
    pub root: bool,
    pub backend: String,
    pub backend_version: Option<String>,
    pub aur_helper: Option<String>,
    pub terminal: Option<String>,
    pub privilege_tool: Option<String>,
    pub internet: bool,
    pub pkgfile: bool,
    pub pacman_conf: PathBuf,
    pub i_love_candy: bool,
    pub ignored_packages: Vec<String>,
    pub repositories: Vec<String>,
    pub config_path: PathBuf,
}

impl Report {
    pub async fn gather(backend: &dyn Backend, config: &FrontConfig) -> Self {
        let program = backend.program().to_string();
        let version = tokio::task::spawn_blocking(move || system::tool_version(&program));
        let internet = tokio::task::spawn_blocking(system::has_internet_connection);
        let (version, internet) = futures::join!(version, internet);
        let is_pacman = backend.name() == "pacman";
        Report {
            distro: system::distro().label().to_string(),
            architecture: system::system_architecture(),
            root: privilege::is_root_running(),
            backend: backend.name().to_string(),
            backend_version: version.ok().flatten(),
            aur_helper: is_pacman
                .then(|| AurHelper::detect(config.aur_helper.as_deref()))
                .flatten()
                .map(|h| h.binary),
            terminal: Terminal::discover(config.terminal.as_deref())
                .ok()
                .map(|t| t.binary),
            privilege_tool: PrivilegeTool::detect(config.privilege_tool)
                .ok()
                .map(|t| t.binary().to_string()),
            internet: internet.unwrap_or(false),
            pkgfile: system::has_executable("pkgfile"),
            pacman_conf: pacman_conf::path(),
            i_love_candy: is_pacman && pacman_conf::is_i_love_candy_enabled(),
            ignored_packages: if is_pacman {
                pacman_conf::ignore_pkgs()
            } else {
                Vec::new()
            },
            repositories: if is_pacman {
                pacman_conf::repositories()
            } else {
                Vec::new()
            },
            config_path: crate::config::config_path(),
        }
    }

    /// Human-readable problems, empty when everything needed is present.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.backend_version.is_none() {
            issues.push(format!("{} is not runnable", self.backend));
        }
        if self.terminal.is_none() {
            issues.push("no terminal emulator found; privileged actions need --no-terminal".into());
        }
        if self.privilege_tool.is_none() && !self.root {
            issues.push("no sudo, doas or pkexec found".into());
        }
        if !self.internet {
            issues.push("no internet connection".into());
        }
        if self.backend == "pacman" && !self.pacman_conf.exists() {
            issues.push(format!("missing {}", self.pacman_conf.display()));
        }
        issues
    }
}
