use thiserror::Error;

/// Error type for pkgfront.
///
/// Tool failures are carried as the raw text the tool printed; nothing here
/// tries to interpret what pacman or pkg meant.
#[derive(Debug, Error)]
pub enum PkgError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("no supported terminal emulator found")]
    NoTerminal,
    #[error("no privilege escalation tool found (tried sudo, doas, pkexec)")]
    NoPrivilegeTool,
    #[error("`{0}` is not installed")]
    MissingTool(String),
    #[error("a command is already running in this session")]
    Busy,
    #[error("{0} is not supported by the {1} backend")]
    Unsupported(String, &'static str),
}

pub type Result<T> = std::result::Result<T, PkgError>;
