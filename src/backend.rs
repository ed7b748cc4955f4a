use crate::config::{BackendKind, FrontConfig};
use crate::error::{PkgError, Result};
use crate::system::has_executable;
use std::sync::Arc;

/// Command surface of one package tool family.
///
/// Every method returns the argument vector for `program()`; nothing here
/// runs anything. Query and transaction code decide how to run it.
///
/// - PacmanBackend: pacman(8) on Arch-family systems.
/// - PkgBackend: pkg(8), the pkgng tool on FreeBSD-family systems.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;
    fn program(&self) -> &'static str;
    fn is_available(&self) -> bool {
        has_executable(self.program())
    }

    fn sync_database(&self) -> Vec<String>;
    fn system_upgrade(&self) -> Vec<String>;
    fn install(&self, pkgs: &[String]) -> Vec<String>;
    fn remove(&self, pkgs: &[String]) -> Vec<String>;
    fn install_local(&self, paths: &[String]) -> Vec<String>;
    /// Full shell command line that trims the package cache.
    fn clean_cache(&self, keep: u32) -> String;

    /// With `use_comment_search` false the whole remote list is returned and
    /// callers filter by name.
    fn search(&self, term: &str, use_comment_search: bool) -> Vec<String>;
    fn unrequired(&self) -> Vec<String>;
    fn outdated(&self) -> Vec<String>;
    fn foreign(&self) -> Result<Vec<String>> {
        Err(PkgError::Unsupported("foreign packages".into(), self.name()))
    }
    fn dependencies(&self, pkg: &str) -> Vec<String>;
    fn package_list(&self, repo: Option<&str>) -> Vec<String>;
    /// Local info for installed/foreign packages, repository info otherwise.
    fn info(&self, pkg: &str, local: bool) -> Vec<String>;
    fn contents(&self, pkg: &str) -> Vec<String>;
    fn owner(&self, path: &str) -> Vec<String>;
    fn groups(&self) -> Result<Vec<String>> {
        Err(PkgError::Unsupported("package groups".into(), self.name()))
    }
    fn group_members(&self, _group: &str) -> Result<Vec<String>> {
        Err(PkgError::Unsupported("package groups".into(), self.name()))
    }
    fn installed(&self) -> Vec<String>;
    fn target_upgrade(&self, pkg: Option<&str>) -> Vec<String>;
    fn target_removal(&self, pkg: &str) -> Vec<String>;
}

fn args<const N: usize>(fixed: [&str; N], rest: &[String]) -> Vec<String> {
    fixed
        .iter()
        .map(|s| s.to_string())
        .chain(rest.iter().cloned())
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PacmanBackend;

impl Backend for PacmanBackend {
    fn name(&self) -> &'static str {
        "pacman"
    }
    fn program(&self) -> &'static str {
        "pacman"
    }
    fn sync_database(&self) -> Vec<String> {
        args(["-Sy"], &[])
    }
    fn system_upgrade(&self) -> Vec<String> {
        args(["-Su", "--noconfirm"], &[])
    }
    fn install(&self, pkgs: &[String]) -> Vec<String> {
        args(["-S", "--noconfirm"], pkgs)
    }
    fn remove(&self, pkgs: &[String]) -> Vec<String> {
        args(["-R", "--noconfirm"], pkgs)
    }
    fn install_local(&self, paths: &[String]) -> Vec<String> {
        args(["-U", "--noconfirm"], paths)
    }
    fn clean_cache(&self, keep: u32) -> String {
        if has_executable("paccache") {
            format!("paccache -rk{}", keep)
        } else {
            "pacman -Sc --noconfirm".to_string()
        }
    }
    fn search(&self, term: &str, use_comment_search: bool) -> Vec<String> {
        if use_comment_search {
            args(["-Ss", term], &[])
        } else {
            args(["-Sl"], &[])
        }
    }
    fn unrequired(&self) -> Vec<String> {
        args(["-Qt"], &[])
    }
    fn outdated(&self) -> Vec<String> {
        args(["-Qu"], &[])
    }
    fn foreign(&self) -> Result<Vec<String>> {
        Ok(args(["-Qm"], &[]))
    }
    fn dependencies(&self, pkg: &str) -> Vec<String> {
        args(["-Sp", "--print-format", "%n", pkg], &[])
    }
    fn package_list(&self, repo: Option<&str>) -> Vec<String> {
        match repo {
            Some(repo) => args(["-Sl", repo], &[]),
            None => args(["-Sl"], &[]),
        }
    }
    fn info(&self, pkg: &str, local: bool) -> Vec<String> {
        args([if local { "-Qi" } else { "-Si" }, pkg], &[])
    }
    fn contents(&self, pkg: &str) -> Vec<String> {
        args(["-Ql", pkg], &[])
    }
    fn owner(&self, path: &str) -> Vec<String> {
        args(["-Qo", path], &[])
    }
    fn groups(&self) -> Result<Vec<String>> {
        Ok(args(["-Sg"], &[]))
    }
    fn group_members(&self, group: &str) -> Result<Vec<String>> {
        Ok(args(["-Sgq", group], &[]))
    }
    fn installed(&self) -> Vec<String> {
        args(["-Q"], &[])
    }
    fn target_upgrade(&self, pkg: Option<&str>) -> Vec<String> {
        match pkg {
            Some(pkg) => args(["-Sp", "--print-format", "%n %v %s", pkg], &[]),
            None => args(["-Spu", "--print-format", "%n %v %s"], &[]),
        }
    }
    fn target_removal(&self, pkg: &str) -> Vec<String> {
        args(["-Rpc", "--print-format", "%n %v", pkg], &[])
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PkgBackend;

impl Backend for PkgBackend {
    fn name(&self) -> &'static str {
        "pkg"
    }
    fn program(&self) -> &'static str {
        "pkg"
    }
    fn sync_database(&self) -> Vec<String> {
        args(["update"], &[])
    }
    fn system_upgrade(&self) -> Vec<String> {
        args(["upgrade", "-y"], &[])
    }
    fn install(&self, pkgs: &[String]) -> Vec<String> {
        args(["install", "-y"], pkgs)
    }
    fn remove(&self, pkgs: &[String]) -> Vec<String> {
        args(["remove", "-y"], pkgs)
    }
    fn install_local(&self, paths: &[String]) -> Vec<String> {
        args(["add"], paths)
    }
    fn clean_cache(&self, _keep: u32) -> String {
        "pkg clean -y".to_string()
    }
    fn search(&self, term: &str, use_comment_search: bool) -> Vec<String> {
        if use_comment_search {
            args(["search", "-S", "comment", term], &[])
        } else {
            args(["rquery", "-a", "%n %v"], &[])
        }
    }
    fn unrequired(&self) -> Vec<String> {
        args(["query", "-e", "%#r == 0", "%n %v"], &[])
    }
    fn outdated(&self) -> Vec<String> {
        args(["version", "-vRL", "="], &[])
    }
    fn dependencies(&self, pkg: &str) -> Vec<String> {
        args(["rquery", "%dn", pkg], &[])
    }
    fn package_list(&self, repo: Option<&str>) -> Vec<String> {
        match repo {
            Some(repo) => args(["rquery", "-r", repo, "-a", "%n %v"], &[]),
            None => args(["rquery", "-a", "%n %v"], &[]),
        }
    }
    fn info(&self, pkg: &str, local: bool) -> Vec<String> {
        if local {
            args(["info", pkg], &[])
        } else {
            args(["search", "-f", pkg], &[])
        }
    }
    fn contents(&self, pkg: &str) -> Vec<String> {
        args(["info", "-l", pkg], &[])
    }
    fn owner(&self, path: &str) -> Vec<String> {
        args(["which", "-q", path], &[])
    }
    fn installed(&self) -> Vec<String> {
        args(["query", "%n %v"], &[])
    }
    fn target_upgrade(&self, pkg: Option<&str>) -> Vec<String> {
        match pkg {
            Some(pkg) => args(["install", "-n", pkg], &[]),
            None => args(["upgrade", "-n"], &[]),
        }
    }
    fn target_removal(&self, pkg: &str) -> Vec<String> {
        args(["remove", "-n", pkg], &[])
    }
}

/// Pick the backend: config override first, then whichever tool is installed.
pub fn select(config: &FrontConfig) -> Result<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match config.backend {
        Some(BackendKind::Pacman) => Arc::new(PacmanBackend),
        Some(BackendKind::Pkg) => Arc::new(PkgBackend),
        None if PacmanBackend.is_available() => Arc::new(PacmanBackend),
        None if PkgBackend.is_available() => Arc::new(PkgBackend),
        None => {
            return Err(PkgError::Config(
                "neither pacman nor pkg found in PATH".to_string(),
            ));
        }
    };
    tracing::debug!(backend = backend.name(), "selected backend");
    Ok(backend)
}

pub const AUR_HELPERS: [&str; 5] = ["yay", "paru", "pacaur", "pikaur", "trizen"];

/// An installed AUR helper; only meaningful next to pacman.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AurHelper {
    pub binary: String,
}

impl AurHelper {
    pub fn detect(preferred: Option<&str>) -> Option<Self> {
        preferred
            .into_iter()
            .chain(AUR_HELPERS)
            .find(|b| has_executable(b))
            .map(|b| AurHelper {
                binary: b.to_string(),
            })
    }

    pub fn search(&self, term: &str) -> Vec<String> {
        args(["-Ss", "--aur", term], &[])
    }
    pub fn outdated(&self) -> Vec<String> {
        args(["-Qu", "--aur"], &[])
    }
    pub fn info(&self, pkg: &str) -> Vec<String> {
        args(["-Si", "--aur", pkg], &[])
    }
    pub fn install(&self, pkgs: &[String]) -> Vec<String> {
        args(["-S", "--aur"], pkgs)
    }
}
