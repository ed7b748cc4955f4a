use crate::privilege::PrivilegeTool;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, value};

/// Which package tool family to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Pacman,
    Pkg,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrontConfig {
    /// Force a backend instead of probing for pacman/pkg
    pub backend: Option<BackendKind>,
    /// Preferred terminal emulator binary
    pub terminal: Option<String>,
    /// Preferred AUR helper binary
    pub aur_helper: Option<String>,
    pub privilege_tool: Option<PrivilegeTool>,
    pub pacman_conf: Option<PathBuf>,
    /// Keep the user's locale for output shown to humans
    pub user_language: bool,
    /// Package versions kept by `clean`
    pub clean_keep: u32,
    pub log_verbose: bool,
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            backend: None,
            terminal: None,
            aur_helper: None,
            privilege_tool: None,
            pacman_conf: None,
            user_language: false,
            clean_keep: 3,
            log_verbose: false,
        }
    }
}

impl FrontConfig {
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            tracing::debug!(path = %path.display(), "found config");
            match fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<FrontConfig>(&contents) {
                    Ok(cfg) => return cfg,
                    Err(e) => tracing::warn!("[config] Failed to parse {}: {e}", path.display()),
                },
                Err(e) => tracing::warn!("[config] Failed to read {}: {e}", path.display()),
            }
        }
        FrontConfig::default()
    }

    pub fn language(&self) -> crate::process::Language {
        if self.user_language {
            crate::process::Language::UserDefined
        } else {
            crate::process::Language::English
        }
    }
}

pub fn set_config_key(key: &str, value_str: &str) -> crate::error::Result<()> {
    set_config_key_at(&config_path(), key, value_str)
}

/// Set `key` in the TOML file at `path`, keeping comments and other keys.
///
/// Booleans and integers are stored typed, everything else as a string.
/// Values that would not load back are rejected and nothing is written.
pub fn set_config_key_at(path: &Path, key: &str, value_str: &str) -> crate::error::Result<()> {
    let mut doc = if path.exists() {
        fs::read_to_string(path)?
            .parse::<DocumentMut>()
            .map_err(|e| crate::error::PkgError::Config(e.to_string()))?
    } else {
        DocumentMut::new()
    };
    doc[key] = if let Ok(b) = value_str.parse::<bool>() {
        value(b)
    } else if let Ok(n) = value_str.parse::<i64>() {
        value(n)
    } else {
        value(value_str)
    };
    let text = doc.to_string();
    // reject values the loader would otherwise silently drop
    toml::from_str::<FrontConfig>(&text)
        .map_err(|e| crate::error::PkgError::Config(format!("{} = {}: {}", key, value_str, e)))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

pub fn get_config_key(key: &str) -> Option<String> {
    get_config_key_at(&config_path(), key)
}

pub fn get_config_key_at(path: &Path, key: &str) -> Option<String> {
    let doc = fs::read_to_string(path).ok()?.parse::<DocumentMut>().ok()?;
    doc.get(key).map(|v| v.to_string().trim().to_string())
}

pub fn reset_config() -> crate::error::Result<()> {
    reset_config_at(&config_path())
}

pub fn reset_config_at(path: &Path) -> crate::error::Result<()> {
    let body = toml::to_string(&FrontConfig::default())
        .map_err(|e| crate::error::PkgError::Config(e.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}

pub fn show_config() -> String {
    let path = config_path();
    match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(_) => format!("No config file found at {}", path.display()),
    }
}

/// `PKGFRONT_CONFIG` overrides the default location.
pub fn config_path() -> PathBuf {
    if let Some(p) = std::env::var_os("PKGFRONT_CONFIG") {
        return PathBuf::from(p);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pkgfront/pkgfront.toml")
}

// Config precedence: CLI flag > ~/.config/pkgfront/pkgfront.toml > default
