//! User-level operations: building the tool command lines for an action and
//! running them either in-process (streaming output) or in a terminal window.
use crate::backend::{AurHelper, Backend};
use crate::config::FrontConfig;
use crate::error::{PkgError, Result};
use crate::log::LogPane;
use crate::privilege::{self, shell_word};
use crate::process::{self, CommandSession, ExitStatus, Language, ProcessEvent};
use crate::system::has_executable;
use crate::terminal::{self, Terminal, TerminalSession};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

pub const MIRROR_CHECK_APP: &str = "mirror-check";

/// The operation currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandExecuting {
    #[default]
    None,
    MirrorCheck,
    SyncDatabase,
    SystemUpgrade,
    Install,
    Remove,
    RemoveInstall,
    RunSystemUpgradeInTerminal,
    RunInTerminal,
    LocalPkgRefresh,
}

impl CommandExecuting {
    pub fn needs_root(&self) -> bool {
        !matches!(self, CommandExecuting::None | CommandExecuting::MirrorCheck)
    }

    /// Kinds that always run inside a terminal window.
    pub fn forces_terminal(&self) -> bool {
        matches!(
            self,
            CommandExecuting::RunSystemUpgradeInTerminal | CommandExecuting::RunInTerminal
        )
    }
}

/// Where the commands of a transaction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// In-process when root, otherwise in a terminal so prompts work.
    #[default]
    Auto,
    Session,
    Terminal,
}

/// Packages, files or raw command lines an operation acts on.
#[derive(Debug, Clone, Default)]
pub struct Targets {
    pub install: Vec<String>,
    pub remove: Vec<String>,
    /// Local package files for `LocalPkgRefresh`
    pub files: Vec<String>,
    /// Raw command lines for `RunInTerminal`
    pub commands: Vec<String>,
}

impl Targets {
    pub fn install(pkgs: Vec<String>) -> Self {
        Self {
            install: pkgs,
            ..Default::default()
        }
    }

    pub fn remove(pkgs: Vec<String>) -> Self {
        Self {
            remove: pkgs,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub code: Option<i32>,
    pub status: ExitStatus,
}

impl Outcome {
    pub fn success(&self) -> bool {
        self.status == ExitStatus::Normal && self.code == Some(0)
    }
}

/// `program` followed by `args`, each quoted so sh passes it through verbatim.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(shell_word(program))
        .chain(args.iter().map(|a| shell_word(a)))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Transaction {
    backend: Arc<dyn Backend>,
    aur: Option<AurHelper>,
    config: FrontConfig,
    mode: Mode,
    log: LogPane,
    echo: bool,
}

impl Transaction {
    pub fn new(backend: Arc<dyn Backend>, config: FrontConfig) -> Self {
        Self {
            backend,
            aur: None,
            config,
            mode: Mode::Auto,
            log: LogPane::default(),
            echo: false,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_aur_helper(mut self, aur: Option<AurHelper>) -> Self {
        self.aur = aur;
        self
    }

    /// Also copy streamed output to our own stdout/stderr.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn log(&self) -> &LogPane {
        &self.log
    }

    fn line(&self, args: Vec<String>) -> String {
        command_line(self.backend.program(), &args)
    }

    /// Command lines `kind` runs for `targets`.
    pub fn commands(&self, kind: CommandExecuting, targets: &Targets) -> Result<Vec<String>> {
        let b = &self.backend;
        let empty = |what: &str| PkgError::Config(format!("no {} given", what));
        Ok(match kind {
            CommandExecuting::None => Vec::new(),
            CommandExecuting::MirrorCheck => {
                if !has_executable(MIRROR_CHECK_APP) {
                    return Err(PkgError::MissingTool(MIRROR_CHECK_APP.to_string()));
                }
                vec![MIRROR_CHECK_APP.to_string()]
            }
            CommandExecuting::SyncDatabase => vec![self.line(b.sync_database())],
            CommandExecuting::SystemUpgrade | CommandExecuting::RunSystemUpgradeInTerminal => {
                vec![self.line(b.system_upgrade())]
            }
            CommandExecuting::Install => {
                if targets.install.is_empty() {
                    return Err(empty("packages to install"));
                }
                vec![self.line(b.install(&targets.install))]
            }
            CommandExecuting::Remove => {
                if targets.remove.is_empty() {
                    return Err(empty("packages to remove"));
                }
                vec![self.line(b.remove(&targets.remove))]
            }
            CommandExecuting::RemoveInstall => {
                if targets.remove.is_empty() || targets.install.is_empty() {
                    return Err(empty("packages to remove and install"));
                }
                vec![
                    self.line(b.remove(&targets.remove)),
                    self.line(b.install(&targets.install)),
                ]
            }
            CommandExecuting::LocalPkgRefresh => {
                if targets.files.is_empty() {
                    return Err(empty("package files"));
                }
                vec![self.line(b.install_local(&targets.files))]
            }
            CommandExecuting::RunInTerminal => {
                if targets.commands.is_empty() {
                    return Err(empty("commands"));
                }
                targets.commands.clone()
            }
        })
    }

    /// Run `kind`, wait for it, and report how it ended.
    pub async fn execute(&self, kind: CommandExecuting, targets: &Targets) -> Result<Outcome> {
        let commands = self.commands(kind, targets)?;
        if commands.is_empty() {
            return Ok(Outcome {
                code: Some(0),
                status: ExitStatus::Normal,
            });
        }
        if matches!(
            kind,
            CommandExecuting::SystemUpgrade | CommandExecuting::RunSystemUpgradeInTerminal
        ) {
            self.report_ignored();
        }
        info!(?kind, ?commands, "executing transaction");
        let in_terminal = kind.forces_terminal()
            || match self.mode {
                Mode::Terminal => true,
                Mode::Session => false,
                Mode::Auto => kind.needs_root() && !privilege::is_root_running(),
            };
        if in_terminal {
            self.run_in_terminal(kind, &commands).await
        } else {
            let script = commands.join(" && ");
            let script = if kind.needs_root() {
                privilege::wrap(&script, self.config.privilege_tool)?
            } else {
                script
            };
            self.run_in_session(&script).await
        }
    }

    /// AUR packages are built as the normal user by the helper itself.
    pub async fn install_aur(&self, pkgs: &[String]) -> Result<Outcome> {
        let helper = self
            .aur
            .as_ref()
            .ok_or_else(|| PkgError::Unsupported("AUR installs".into(), self.backend.name()))?;
        if pkgs.is_empty() {
            return Err(PkgError::Config("no AUR packages given".to_string()));
        }
        let line = command_line(&helper.binary, &helper.install(pkgs));
        let (session, mut rx) = TerminalSession::new(self.terminal()?, self.config.privilege_tool);
        session.run_command_in_terminal_as_normal_user(&[line])?;
        self.await_terminal(&mut rx).await
    }

    pub async fn clean_cache(&self, keep: u32) -> Result<Outcome> {
        let line = self.backend.clean_cache(keep);
        let targets = Targets {
            commands: vec![line.clone()],
            ..Default::default()
        };
        if self.mode == Mode::Terminal || (!privilege::is_root_running() && self.mode == Mode::Auto)
        {
            return self.execute(CommandExecuting::RunInTerminal, &targets).await;
        }
        self.run_in_session(&privilege::wrap(&line, self.config.privilege_tool)?)
            .await
    }

    pub async fn open_root_terminal(&self) -> Result<Outcome> {
        let (session, mut rx) = TerminalSession::new(self.terminal()?, self.config.privilege_tool);
        session.open_root_terminal()?;
        self.await_terminal(&mut rx).await
    }

    fn terminal(&self) -> Result<Terminal> {
        Terminal::discover(self.config.terminal.as_deref())
    }

    fn report_ignored(&self) {
        if self.backend.name() != "pacman" {
            return;
        }
        let ignored = crate::pacman_conf::ignore_pkgs();
        if !ignored.is_empty() {
            let msg = format!("[pacman.conf] IgnorePkg: {}", ignored.join(" "));
            warn!("{}", msg);
            self.log.push(&msg);
        }
    }

    async fn run_in_terminal(&self, kind: CommandExecuting, commands: &[String]) -> Result<Outcome> {
        let terminal = self.terminal()?;
        self.log
            .push(&format!("[terminal] running in {}", terminal.binary));
        let (session, mut rx) = TerminalSession::new(terminal, self.config.privilege_tool);
        if kind.needs_root() {
            session.run_command_in_terminal(commands)?;
        } else {
            session.run_command_in_terminal_as_normal_user(commands)?;
        }
        self.await_terminal(&mut rx).await
    }

    async fn await_terminal(
        &self,
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<terminal::TerminalEvent>,
    ) -> Result<Outcome> {
        let (code, status) = terminal::wait_finished(rx)
            .await
            .unwrap_or((None, ExitStatus::Crashed));
        self.log.push(&format!("[terminal] closed ({:?})", code));
        Ok(Outcome { code, status })
    }

    async fn run_in_session(&self, script: &str) -> Result<Outcome> {
        let lang = if self.echo {
            self.config.language()
        } else {
            Language::English
        };
        let (session, mut rx) = CommandSession::new();
        session.execute_command(script, lang)?;
        let finished = process::wait_finished(&mut rx, |ev| match ev {
            ProcessEvent::StandardOutput => {
                let chunk = session.read_all_standard_output();
                self.log.push_chunk(&chunk);
                if self.echo {
                    print!("{}", chunk);
                    let _ = std::io::stdout().flush();
                }
            }
            ProcessEvent::StandardError => {
                let chunk = session.read_all_standard_error();
                self.log.push_chunk(&chunk);
                if self.echo {
                    eprint!("{}", chunk);
                }
            }
            _ => {}
        })
        .await;
        let (code, status) = finished.unwrap_or((None, ExitStatus::Crashed));
        let err = session.error_string();
        if !err.is_empty() {
            self.log.push(&format!("[error] {}", err));
        }
        Ok(Outcome { code, status })
    }
}
