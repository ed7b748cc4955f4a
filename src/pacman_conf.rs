//! Best-effort scraping of `/etc/pacman.conf`.
//!
//! There is no grammar here: lines are matched by prefix and split on `=`.
//! Malformed input just yields fewer values.
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PATH: &str = "/etc/pacman.conf";

/// Returns the path to the pacman config
pub fn path() -> PathBuf {
    crate::config::FrontConfig::load()
        .pacman_conf
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH))
}

fn read(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "pacman.conf not readable");
            String::new()
        }
    }
}

/// Values of every `field = a b c` line in `contents`, in file order.
pub fn field_values(contents: &str, field: &str) -> Vec<String> {
    let mut values = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('#') || !line.starts_with(field) {
            continue;
        }
        let Some((key, rest)) = line.split_once('=') else {
            continue;
        };
        if key.trim() != field {
            continue;
        }
        // trailing comments are not part of the value
        let rest = rest.split('#').next().unwrap_or("");
        values.extend(rest.split_whitespace().map(str::to_string));
    }
    values
}

/// `field` strings from the pacman config at `path`.
pub fn get_field(path: &Path, field: &str) -> Vec<String> {
    field_values(&read(path), field)
}

/// Returns the list of ignored packages in pacman.conf
pub fn ignore_pkgs() -> Vec<String> {
    get_field(&path(), "IgnorePkg")
}

pub fn ignore_groups() -> Vec<String> {
    get_field(&path(), "IgnoreGroup")
}

/// True when a bare `ILoveCandy` option is present and not commented out.
pub fn has_option(contents: &str, option: &str) -> bool {
    contents.lines().any(|l| {
        let l = l.trim();
        !l.starts_with('#') && l.split('#').next().map(str::trim) == Some(option)
    })
}

pub fn is_i_love_candy_enabled() -> bool {
    has_option(&read(&path()), "ILoveCandy")
}

/// Repository section names, `[options]` excluded.
pub fn repositories_in(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|l| l.trim().strip_prefix('[').and_then(|l| l.strip_suffix(']')))
        .filter(|name| *name != "options")
        .map(str::to_string)
        .collect()
}

pub fn repositories() -> Vec<String> {
    repositories_in(&read(&path()))
}
