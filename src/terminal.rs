//! Terminal wrapper: runs commands inside a terminal emulator window so the
//! user can answer prompts (passwords, pacman questions) interactively.
use crate::actions::{self, ActionsFile};
use crate::error::{PkgError, Result};
use crate::privilege::{self, PrivilegeTool, shell_quote};
use crate::process::ExitStatus;
use crate::system::has_executable;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// How an emulator expects the command it should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStyle {
    /// `term -e prog args...`
    DashE,
    /// `term -e "prog args"` as one string
    DashEString,
    /// `term -x prog args...`
    DashX,
    /// `term -- prog args...`
    DoubleDash,
    /// `term prog args...`
    Direct,
}

/// Known emulators in probing order.
pub const KNOWN_TERMINALS: [(&str, ExecStyle); 10] = [
    ("alacritty", ExecStyle::DashE),
    ("kitty", ExecStyle::Direct),
    ("konsole", ExecStyle::DashE),
    ("gnome-terminal", ExecStyle::DoubleDash),
    ("xfce4-terminal", ExecStyle::DashX),
    ("lxterminal", ExecStyle::DashEString),
    ("mate-terminal", ExecStyle::DashX),
    ("terminator", ExecStyle::DashX),
    ("qterminal", ExecStyle::DashEString),
    ("xterm", ExecStyle::DashE),
];

const HOLD: &str = "echo; printf 'Press Enter to close this window...'; read _";

/// `script` followed by the hold prompt; the window exits with the status of
/// `script`, not of the prompt.
fn with_hold(script: &str) -> String {
    format!("{}; rc=$?; {}; exit $rc", script, HOLD)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub binary: String,
    pub style: ExecStyle,
}

impl Terminal {
    pub fn new(binary: &str) -> Self {
        let style = KNOWN_TERMINALS
            .iter()
            .find(|(name, _)| *name == binary)
            .map(|(_, s)| *s)
            .unwrap_or(ExecStyle::DashE);
        Self {
            binary: binary.to_string(),
            style,
        }
    }

    /// Preferred terminal when installed, else the first known one found.
    pub fn discover(preferred: Option<&str>) -> Result<Self> {
        if let Some(p) = preferred {
            if has_executable(p) {
                return Ok(Self::new(p));
            }
            tracing::warn!(terminal = p, "configured terminal not installed");
        }
        KNOWN_TERMINALS
            .iter()
            .find(|(name, _)| has_executable(name))
            .map(|(name, _)| Self::new(name))
            .ok_or(PkgError::NoTerminal)
    }

    /// Arguments that make this emulator run `script` through `sh -c`.
    pub fn command_args(&self, script: &str) -> Vec<String> {
        let argv = ["sh".to_string(), "-c".to_string(), script.to_string()];
        let mut args = Vec::new();
        match self.style {
            ExecStyle::DashE => args.push("-e".to_string()),
            ExecStyle::DashX => args.push("-x".to_string()),
            ExecStyle::DoubleDash => args.push("--".to_string()),
            ExecStyle::Direct => {}
            ExecStyle::DashEString => {
                args.push("-e".to_string());
                args.push(format!("sh -c {}", shell_quote(script)));
                return args;
            }
        }
        args.extend(argv);
        args
    }
}

/// Lifecycle notifications of a terminal run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    Started,
    Finished { code: Option<i32>, status: ExitStatus },
}

/// Runs commands in a terminal window and reports when the window closes.
pub struct TerminalSession {
    terminal: Terminal,
    privilege: Option<PrivilegeTool>,
    events: UnboundedSender<TerminalEvent>,
}

impl TerminalSession {
    pub fn new(
        terminal: Terminal,
        privilege: Option<PrivilegeTool>,
    ) -> (Self, UnboundedReceiver<TerminalEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                terminal,
                privilege,
                events: tx,
            },
            rx,
        )
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// Stage `commands` in an actions file and run it as root in the terminal.
    pub fn run_command_in_terminal(&self, commands: &[String]) -> Result<()> {
        let file = actions::stage(commands)?;
        let run = privilege::wrap(
            &format!("sh {}", shell_quote(&file.path().to_string_lossy())),
            self.privilege,
        )?;
        self.spawn(&with_hold(&run), Some(file))
    }

    /// Run `commands` in the terminal without elevation.
    pub fn run_command_in_terminal_as_normal_user(&self, commands: &[String]) -> Result<()> {
        let script = privilege::as_normal_user(&commands.join(" && "));
        self.spawn(&with_hold(&script), None)
    }

    /// Interactive root shell in a terminal window.
    pub fn open_root_terminal(&self) -> Result<()> {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let script = privilege::wrap(&shell, self.privilege)?;
        self.spawn(&script, None)
    }

    fn spawn(&self, script: &str, file: Option<ActionsFile>) -> Result<()> {
        let args = self.terminal.command_args(script);
        debug!(terminal = %self.terminal.binary, ?args, "spawning terminal");
        let mut child = tokio::process::Command::new(&self.terminal.binary)
            .args(&args)
            // the emulator brings its own tty
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| PkgError::Spawn {
                program: self.terminal.binary.clone(),
                source,
            })?;
        info!(terminal = %self.terminal.binary, "terminal started");
        let _ = self.events.send(TerminalEvent::Started);
        let events = self.events.clone();
        tokio::spawn(async move {
            let finished = match child.wait().await {
                Ok(status) => TerminalEvent::Finished {
                    code: status.code(),
                    status: if status.signal().is_some() {
                        ExitStatus::Crashed
                    } else {
                        ExitStatus::Normal
                    },
                },
                Err(_) => TerminalEvent::Finished {
                    code: None,
                    status: ExitStatus::Crashed,
                },
            };
            if let Some(file) = file {
                if let Err(e) = file.remove() {
                    debug!(error = %e, "actions file already gone");
                }
            }
            let _ = events.send(finished);
        });
        Ok(())
    }
}

/// Wait for the terminal window to close.
pub async fn wait_finished(
    rx: &mut UnboundedReceiver<TerminalEvent>,
) -> Option<(Option<i32>, ExitStatus)> {
    while let Some(ev) = rx.recv().await {
        if let TerminalEvent::Finished { code, status } = ev {
            return Some((code, status));
        }
    }
    None
}
