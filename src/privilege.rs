// Privilege detection and escalation helpers
use crate::error::{PkgError, Result};
use nix::unistd::geteuid;
use serde::{Deserialize, Serialize};

/// Returns true if we are running with an effective UID of root.
pub fn is_root_running() -> bool {
    geteuid().is_root()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeTool {
    Sudo,
    Doas,
    Pkexec,
}

impl PrivilegeTool {
    pub const ALL: [PrivilegeTool; 3] = [Self::Sudo, Self::Doas, Self::Pkexec];

    pub fn binary(&self) -> &'static str {
        match self {
            PrivilegeTool::Sudo => "sudo",
            PrivilegeTool::Doas => "doas",
            PrivilegeTool::Pkexec => "pkexec",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.binary().eq_ignore_ascii_case(name.trim()))
    }

    /// First installed tool, honoring `preferred` when it is installed.
    pub fn detect(preferred: Option<PrivilegeTool>) -> Result<Self> {
        if let Some(tool) = preferred {
            if crate::system::has_executable(tool.binary()) {
                return Ok(tool);
            }
            tracing::warn!(tool = tool.binary(), "configured privilege tool not installed");
        }
        Self::ALL
            .into_iter()
            .find(|t| crate::system::has_executable(t.binary()))
            .ok_or(PkgError::NoPrivilegeTool)
    }

    /// `command` prefixed so it runs as root through this tool.
    pub fn wrap(&self, command: &str) -> String {
        format!("{} sh -c {}", self.binary(), shell_quote(command))
    }
}

/// Prefix `command` with the privilege tool unless we already are root.
pub fn wrap(command: &str, preferred: Option<PrivilegeTool>) -> Result<String> {
    if is_root_running() {
        return Ok(command.to_string());
    }
    Ok(PrivilegeTool::detect(preferred)?.wrap(command))
}

/// The user who elevated us through sudo or doas, if any.
pub fn invoking_user() -> Option<String> {
    ["SUDO_USER", "DOAS_USER"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty() && v != "root")
}

/// Rewrite `command` so it runs as the invoking user when we are root.
pub fn as_normal_user(command: &str) -> String {
    if !is_root_running() {
        return command.to_string();
    }
    match invoking_user() {
        Some(user) => format!("su {} -c {}", user, shell_quote(command)),
        None => command.to_string(),
    }
}

/// Single-quote `s` for POSIX sh.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// `s` as one shell word: left bare when it only holds characters sh never
/// interprets, single-quoted otherwise.
pub fn shell_word(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "@._+:/=-".contains(c));
    if plain { s.to_string() } else { shell_quote(s) }
}
