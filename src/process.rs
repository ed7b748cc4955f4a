//! Process invocation helpers.
//!
//! Everything in pkgfront eventually lands here: a command line is handed to
//! `sh -c`, its stdout/stderr are captured, and the caller gets the raw bytes
//! back together with whatever error text the tool produced.

use crate::error::{PkgError, Result};
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Locale the child process runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// Force the C locale so output can be scraped.
    #[default]
    English,
    /// Keep the caller's locale (used for output shown verbatim to a human).
    UserDefined,
}

impl Language {
    fn env(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Language::English => &[("LANG", "C"), ("LC_ALL", "C"), ("LC_MESSAGES", "C")],
            Language::UserDefined => &[],
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, `None` if the process died from a signal or never started.
    pub code: Option<i32>,
    /// Set when the process could not be started at all.
    pub spawn_error: Option<String>,
}

impl CommandOutput {
    pub fn from_std(output: std::process::Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            code: output.status.code(),
            spawn_error: None,
        }
    }

    pub fn spawn_failed(err: &std::io::Error) -> Self {
        Self {
            spawn_error: Some(err.to_string()),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.spawn_error.is_none() && self.code == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Error text for a failed run: spawn error, else stderr, else the exit code.
    pub fn error_string(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        if let Some(err) = &self.spawn_error {
            return Some(err.clone());
        }
        let stderr = self.stderr_str().trim().to_string();
        if !stderr.is_empty() {
            return Some(stderr);
        }
        Some(match self.code {
            Some(code) => format!("exited with code {}", code),
            None => "terminated by signal".to_string(),
        })
    }

    pub fn into_result(self, command: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        if let Some(err) = self.spawn_error {
            return Err(PkgError::Spawn {
                program: command.to_string(),
                source: std::io::Error::other(err),
            });
        }
        Err(PkgError::CommandFailed {
            command: command.to_string(),
            code: self.code,
            stderr: self.stderr_str().trim().to_string(),
        })
    }
}

fn shell(command: &str, lang: Language) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).envs(lang.env().iter().copied());
    cmd
}

/// Run a shell command line synchronously and capture everything it prints.
///
/// Never fails: a spawn error or a non-zero exit is reported through
/// [`CommandOutput::error_string`] next to whatever output was produced.
pub fn run_command(command: &str) -> CommandOutput {
    run_command_with(command, Language::English)
}

pub fn run_command_with(command: &str, lang: Language) -> CommandOutput {
    debug!(command, "running");
    let out = match shell(command, lang).stdin(Stdio::null()).output() {
        Ok(out) => CommandOutput::from_std(out),
        Err(e) => CommandOutput::spawn_failed(&e),
    };
    if let Some(err) = out.error_string() {
        debug!(command, error = %err, "command failed");
    }
    out
}

/// Stdout of `command`, empty when it cannot be run.
pub fn get_command_output(command: &str) -> Vec<u8> {
    run_command(command).stdout
}

/// Run a command attached to our own terminal and wait for it.
pub fn exec_command(command: &str) -> Result<i32> {
    debug!(command, "exec");
    let status = shell(command, Language::UserDefined)
        .status()
        .map_err(|source| PkgError::Spawn {
            program: command.to_string(),
            source,
        })?;
    Ok(status.code().unwrap_or(-1))
}

/// Like [`exec_command`], but drops back to the invoking user when elevated.
pub fn exec_command_as_normal_user(command: &str) -> Result<i32> {
    exec_command(&crate::privilege::as_normal_user(command))
}

/// Executes a program with arguments and returns the captured output.
///
/// Query code goes through this trait so tests can feed canned tool output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], lang: Language) -> CommandOutput;
}

/// Runner backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String], lang: Language) -> CommandOutput {
        debug!(program, ?args, "query");
        let out = tokio::process::Command::new(program)
            .args(args)
            .envs(lang.env().iter().copied())
            .stdin(Stdio::null())
            .output()
            .await;
        match out {
            Ok(out) => CommandOutput::from_std(out),
            Err(e) => CommandOutput::spawn_failed(&e),
        }
    }
}

/// How a session's child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Normal,
    Crashed,
}

/// Notifications emitted by a [`CommandSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Started,
    /// New stdout bytes are available through `read_all_standard_output`.
    StandardOutput,
    /// New stderr bytes are available through `read_all_standard_error`.
    StandardError,
    Finished { code: Option<i32>, status: ExitStatus },
}

#[derive(Default)]
struct Buffers {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    error: String,
}

/// One asynchronously running command with incremental output capture.
///
/// Output chunks land in internal buffers and a [`ProcessEvent`] is sent for
/// each one; reading drains the buffer.
pub struct CommandSession {
    buffers: Arc<Mutex<Buffers>>,
    pid: Arc<Mutex<Option<u32>>>,
    events: UnboundedSender<ProcessEvent>,
}

impl CommandSession {
    pub fn new() -> (Self, UnboundedReceiver<ProcessEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                buffers: Arc::new(Mutex::new(Buffers::default())),
                pid: Arc::new(Mutex::new(None)),
                events: tx,
            },
            rx,
        )
    }

    /// Start `command`; returns once the child is spawned.
    ///
    /// Fails with [`PkgError::Busy`] while the previous child is still alive.
    pub fn execute_command(&self, command: &str, lang: Language) -> Result<()> {
        let mut running = lock(&self.pid);
        if running.is_some() {
            return Err(PkgError::Busy);
        }
        *lock(&self.buffers) = Buffers::default();
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .envs(lang.env().iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|source| {
                lock(&self.buffers).error = source.to_string();
                PkgError::Spawn {
                    program: command.to_string(),
                    source,
                }
            })?;
        debug!(command, pid = ?child.id(), "session started");
        *running = child.id();
        drop(running);
        let _ = self.events.send(ProcessEvent::Started);

        let out_task = child.stdout.take().map(|out| {
            tokio::spawn(pump(
                out,
                self.buffers.clone(),
                self.events.clone(),
                Stream::Stdout,
            ))
        });
        let err_task = child.stderr.take().map(|err| {
            tokio::spawn(pump(
                err,
                self.buffers.clone(),
                self.events.clone(),
                Stream::Stderr,
            ))
        });

        let buffers = self.buffers.clone();
        let pid = self.pid.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            for task in [out_task, err_task].into_iter().flatten() {
                let _ = task.await;
            }
            let finished = match child.wait().await {
                Ok(status) => ProcessEvent::Finished {
                    code: status.code(),
                    status: if status.signal().is_some() {
                        ExitStatus::Crashed
                    } else {
                        ExitStatus::Normal
                    },
                },
                Err(e) => {
                    lock(&buffers).error = e.to_string();
                    ProcessEvent::Finished {
                        code: None,
                        status: ExitStatus::Crashed,
                    }
                }
            };
            *lock(&pid) = None;
            let _ = events.send(finished);
        });
        Ok(())
    }

    pub fn execute_command_as_normal_user(&self, command: &str) -> Result<()> {
        self.execute_command(
            &crate::privilege::as_normal_user(command),
            Language::English,
        )
    }

    /// Stdout received since the previous call.
    pub fn read_all_standard_output(&self) -> String {
        let bytes = std::mem::take(&mut lock(&self.buffers).stdout);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Stderr received since the previous call.
    pub fn read_all_standard_error(&self) -> String {
        let bytes = std::mem::take(&mut lock(&self.buffers).stderr);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn error_string(&self) -> String {
        lock(&self.buffers).error.clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.pid).is_some()
    }

    /// Kill the running child and everything it spawned. A no-op when
    /// nothing is running.
    pub fn kill(&self) -> Result<()> {
        let Some(pid) = *lock(&self.pid) else {
            return Ok(());
        };
        warn!(pid, "killing child process group");
        // the child leads its own process group
        signal::killpg(Pid::from_raw(pid as i32), Signal::SIGKILL)
            .map_err(|e| PkgError::Io(std::io::Error::from(e)))
    }
}

/// Wait for the `Finished` event, forwarding everything else to `on_event`.
pub async fn wait_finished<F>(
    rx: &mut UnboundedReceiver<ProcessEvent>,
    mut on_event: F,
) -> Option<(Option<i32>, ExitStatus)>
where
    F: FnMut(&ProcessEvent),
{
    while let Some(ev) = rx.recv().await {
        on_event(&ev);
        if let ProcessEvent::Finished { code, status } = ev {
            return Some((code, status));
        }
    }
    None
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn pump<R>(
    mut reader: R,
    buffers: Arc<Mutex<Buffers>>,
    events: UnboundedSender<ProcessEvent>,
    stream: Stream,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                {
                    let mut buf = lock(&buffers);
                    match stream {
                        Stream::Stdout => buf.stdout.extend_from_slice(&chunk[..n]),
                        Stream::Stderr => buf.stderr.extend_from_slice(&chunk[..n]),
                    }
                }
                let _ = events.send(match stream {
                    Stream::Stdout => ProcessEvent::StandardOutput,
                    Stream::Stderr => ProcessEvent::StandardError,
                });
            }
            Err(e) => {
                debug!(error = %e, "pipe read failed");
                break;
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
