use crate::process::{get_command_output, run_command};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Host operating system flavour, as far as pkgfront cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Distro {
    Arch,
    Manjaro,
    Void,
    FreeBsd,
    Unknown,
}

impl Distro {
    pub fn label(&self) -> &'static str {
        match self {
            Distro::Arch => "Arch Linux",
            Distro::Manjaro => "Manjaro",
            Distro::Void => "Void Linux",
            Distro::FreeBsd => "FreeBSD",
            Distro::Unknown => "Unknown",
        }
    }

    /// Detect from the contents of an os-release file.
    pub fn from_os_release(contents: &str) -> Self {
        let mut id = String::new();
        let mut id_like = String::new();
        for line in contents.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').to_lowercase();
                match key.trim() {
                    "ID" => id = value,
                    "ID_LIKE" => id_like = value,
                    _ => {}
                }
            }
        }
        match id.as_str() {
            "arch" | "archarm" | "endeavouros" | "garuda" => Distro::Arch,
            "manjaro" | "manjaro-arm" => Distro::Manjaro,
            "void" => Distro::Void,
            "freebsd" | "ghostbsd" => Distro::FreeBsd,
            _ if id_like.split_whitespace().any(|l| l == "arch") => Distro::Arch,
            _ => Distro::Unknown,
        }
    }
}

static DISTRO: Lazy<Distro> = Lazy::new(|| {
    if cfg!(target_os = "freebsd") {
        return Distro::FreeBsd;
    }
    ["/etc/os-release", "/usr/lib/os-release"]
        .iter()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| Distro::from_os_release(&s))
        .unwrap_or(Distro::Unknown)
});

/// The distro we are running on (detected once).
pub fn distro() -> Distro {
    *DISTRO
}

static ARCH: Lazy<String> = Lazy::new(|| {
    let out = String::from_utf8_lossy(&get_command_output("uname -m"))
        .trim()
        .to_string();
    if out.is_empty() {
        std::env::consts::ARCH.to_string()
    } else {
        out
    }
});

pub fn system_architecture() -> String {
    ARCH.clone()
}

pub fn has_executable(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Full path of `name` in PATH, if installed.
pub fn discover_binary_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Whether a process called `app_name` is running.
///
/// With `just_one_instance` set, it only counts as running when more than one
/// instance exists; that is how a second copy of ourselves is detected.
pub fn is_app_running(app_name: &str, just_one_instance: bool) -> bool {
    let out = get_command_output("ps -e -o comm=");
    count_instances(&String::from_utf8_lossy(&out), app_name) > usize::from(just_one_instance)
}

pub fn count_instances(ps_output: &str, app_name: &str) -> usize {
    // comm is truncated to 15 chars by the kernel
    let needle: String = app_name.chars().take(15).collect();
    ps_output
        .lines()
        .filter(|l| l.trim() == needle)
        .count()
}

/// Ping test, falling back to an HTTP HEAD request when ping is missing.
pub fn has_internet_connection() -> bool {
    if has_executable("ping") && do_internet_ping_test() {
        return true;
    }
    has_executable("curl")
        && run_command("curl -sI --max-time 5 https://archlinux.org").success()
}

pub fn do_internet_ping_test() -> bool {
    let flag = if cfg!(target_os = "freebsd") { "-t" } else { "-W" };
    run_command(&format!("ping -c 1 {} 3 www.google.com", flag)).success()
}

/// Uses `file -bi` to tell whether `path` holds text.
pub fn is_text_file(path: &Path) -> bool {
    let out = run_command(&format!(
        "file -bi {}",
        crate::privilege::shell_quote(&path.to_string_lossy())
    ));
    out.success() && out.stdout_str().trim_start().starts_with("text/")
}

static VERSIONS: Lazy<Mutex<HashMap<String, String>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// First non-empty line of `<tool> --version`, cached per tool.
pub fn tool_version(tool: &str) -> Option<String> {
    if let Some(v) = VERSIONS
        .lock()
        .ok()
        .and_then(|cache| cache.get(tool).cloned())
    {
        return Some(v);
    }
    let out = run_command(&format!("{} --version", tool));
    if !out.success() {
        return None;
    }
    let line = out
        .stdout_str()
        .lines()
        .map(|l| l.trim().trim_start_matches(|c: char| c == '.' || c == '-' || c == ' '))
        .find(|l| !l.is_empty())?
        .to_string();
    if let Ok(mut cache) = VERSIONS.lock() {
        cache.insert(tool.to_string(), line.clone());
    }
    Some(line)
}
