//! Read-only package queries.
//!
//! Each call runs one tool invocation and hands back its stdout, sometimes
//! with a light parse on top. Output formats belong to the tools; nothing is
//! validated beyond splitting lines and fields.
use crate::backend::{AurHelper, Backend};
use crate::error::{PkgError, Result};
use crate::process::{CommandOutput, CommandRunner, Language, SystemRunner};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

pub struct Query {
    backend: Arc<dyn Backend>,
    runner: Arc<dyn CommandRunner>,
    aur: Option<AurHelper>,
    lang: Language,
}

impl Query {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_runner(backend, Arc::new(SystemRunner))
    }

    pub fn with_runner(backend: Arc<dyn Backend>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            backend,
            runner,
            aur: None,
            lang: Language::English,
        }
    }

    pub fn with_aur_helper(mut self, aur: Option<AurHelper>) -> Self {
        self.aur = aur;
        self
    }

    /// Locale for queries whose output is printed verbatim.
    pub fn with_language(mut self, lang: Language) -> Self {
        self.lang = lang;
        self
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn aur_helper(&self) -> Option<&AurHelper> {
        self.aur.as_ref()
    }

    async fn run(&self, program: &str, args: &[String]) -> CommandOutput {
        self.runner.run(program, args, self.lang).await
    }

    /// Run the backend tool with `args`; stdout, or empty on failure.
    pub async fn perform_query(&self, args: &[String]) -> Vec<u8> {
        let out = self.run(self.backend.program(), args).await;
        if let Some(err) = out.error_string() {
            debug!(program = self.backend.program(), ?args, error = %err, "query failed");
        }
        out.stdout
    }

    /// Like [`Query::perform_query`] but reports the tool's error text.
    pub async fn try_query(&self, args: &[String]) -> Result<Vec<u8>> {
        let out = self.run(self.backend.program(), args).await;
        let line = format!("{} {}", self.backend.program(), args.join(" "));
        Ok(out.into_result(&line)?.stdout)
    }

    pub async fn perform_aur_command(&self, args: &[String]) -> Result<Vec<u8>> {
        let helper = self
            .aur
            .as_ref()
            .ok_or_else(|| PkgError::Unsupported("AUR queries".into(), self.backend.name()))?;
        Ok(self.run(&helper.binary, args).await.stdout)
    }

    /// Remote packages matching `search`; without comment search the whole
    /// remote list is fetched and filtered on package name.
    pub async fn remote_package_list(&self, search: &str, use_comment_search: bool) -> Vec<u8> {
        let out = self
            .perform_query(&self.backend.search(search, use_comment_search))
            .await;
        if use_comment_search {
            return out;
        }
        let needle = search.to_lowercase();
        let mut filtered = Vec::new();
        for line in String::from_utf8_lossy(&out).lines() {
            // "-Sl" lines are "repo name version", rquery lines are "name version"
            let name = match self.backend.name() {
                "pacman" => line.split_whitespace().nth(1),
                _ => line.split_whitespace().next(),
            };
            if name.is_some_and(|n| n.to_lowercase().contains(&needle)) {
                filtered.extend_from_slice(line.as_bytes());
                filtered.push(b'\n');
            }
        }
        filtered
    }

    pub async fn aur_search(&self, search: &str) -> Result<Vec<u8>> {
        let args = self.require_aur()?.search(search);
        self.perform_aur_command(&args).await
    }

    pub async fn unrequired_package_list(&self) -> Vec<u8> {
        self.perform_query(&self.backend.unrequired()).await
    }

    pub async fn outdated_package_list(&self) -> Vec<u8> {
        self.perform_query(&self.backend.outdated()).await
    }

    pub async fn outdated_aur_package_list(&self) -> Result<Vec<u8>> {
        let args = self.require_aur()?.outdated();
        self.perform_aur_command(&args).await
    }

    /// `(name, installed, available)` for every outdated AUR package.
    pub async fn aur_package_version_information(&self) -> Result<Vec<(String, String, String)>> {
        Ok(outdated_versions(&self.outdated_aur_package_list().await?))
    }

    pub async fn aur_package_information(&self, pkg: &str) -> Result<Vec<u8>> {
        let args = self.require_aur()?.info(pkg);
        self.perform_aur_command(&args).await
    }

    pub async fn foreign_package_list(&self) -> Result<Vec<u8>> {
        Ok(self.perform_query(&self.backend.foreign()?).await)
    }

    /// Package names `pkg` would pull in, one per line.
    pub async fn dependencies_list(&self, pkg: &str) -> Vec<u8> {
        self.perform_query(&self.backend.dependencies(pkg)).await
    }

    pub async fn package_list(&self, repo: Option<&str>) -> Vec<u8> {
        self.perform_query(&self.backend.package_list(repo)).await
    }

    /// Info block for `pkg`; `foreign` packages only exist locally.
    pub async fn package_information(&self, pkg: &str, foreign: bool) -> Vec<u8> {
        self.perform_query(&self.backend.info(pkg, foreign)).await
    }

    pub async fn package_contents(&self, pkg: &str) -> Vec<u8> {
        self.perform_query(&self.backend.contents(pkg)).await
    }

    pub fn is_pkgfile_installed(&self) -> bool {
        crate::system::has_executable("pkgfile")
    }

    /// File list of a package that need not be installed (pkgfile database).
    pub async fn package_contents_pkgfile(&self, pkg: &str) -> Result<Vec<u8>> {
        if !self.is_pkgfile_installed() {
            return Err(PkgError::Unsupported("pkgfile lookups".into(), self.backend.name()));
        }
        let args = vec!["-l".to_string(), pkg.to_string()];
        let out = self.run("pkgfile", &args).await;
        Ok(out.into_result(&format!("pkgfile -l {}", pkg))?.stdout)
    }

    /// Name of the installed package owning `file_path`, if any.
    pub async fn package_by_file_path(&self, file_path: &str) -> Option<String> {
        let out = self.perform_query(&self.backend.owner(file_path)).await;
        parse_owner(&String::from_utf8_lossy(&out))
    }

    /// Repository paths whose file name matches `file` (pkgfile search).
    pub async fn file_path_suggestions(&self, file: &str) -> Vec<String> {
        if !self.is_pkgfile_installed() {
            return Vec::new();
        }
        let args = vec!["-s".to_string(), file.to_string()];
        let out = self.run("pkgfile", &args).await;
        lines(&out.stdout)
    }

    pub async fn package_groups(&self) -> Result<Vec<u8>> {
        Ok(self.perform_query(&self.backend.groups()?).await)
    }

    pub async fn packages_from_group(&self, group: &str) -> Result<Vec<u8>> {
        Ok(self.perform_query(&self.backend.group_members(group)?).await)
    }

    pub async fn installed_packages(&self) -> Vec<u8> {
        self.perform_query(&self.backend.installed()).await
    }

    /// Targets an upgrade (of everything, or of `pkg`) would touch.
    pub async fn target_upgrade_list(&self, pkg: Option<&str>) -> Vec<u8> {
        self.perform_query(&self.backend.target_upgrade(pkg)).await
    }

    pub async fn target_removal_list(&self, pkg: &str) -> Vec<u8> {
        self.perform_query(&self.backend.target_removal(pkg)).await
    }

    pub async fn field_from_local_package(&self, field: &str, pkg: &str) -> Option<String> {
        let out = self.perform_query(&self.backend.info(pkg, true)).await;
        extract_field(&String::from_utf8_lossy(&out), field)
    }

    pub async fn field_from_remote_package(&self, field: &str, pkg: &str) -> Option<String> {
        let out = self.perform_query(&self.backend.info(pkg, false)).await;
        extract_field(&String::from_utf8_lossy(&out), field)
    }

    /// `IgnorePkg` entries; only pacman has such a list.
    pub fn ignored_packages(&self) -> Vec<String> {
        match self.backend.name() {
            "pacman" => crate::pacman_conf::ignore_pkgs(),
            _ => Vec::new(),
        }
    }

    fn require_aur(&self) -> Result<&AurHelper> {
        self.aur
            .as_ref()
            .ok_or_else(|| PkgError::Unsupported("AUR queries".into(), self.backend.name()))
    }
}

/// Non-empty trimmed lines of raw tool output.
pub fn lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Value of the first `Field : value` line; continuation lines are joined.
pub fn extract_field(info: &str, field: &str) -> Option<String> {
    let re = Regex::new(&format!(r"^{}\s*:\s*(.*)$", regex::escape(field))).ok()?;
    let mut found: Option<String> = None;
    for line in info.lines() {
        match found.as_mut() {
            None => {
                if let Some(caps) = re.captures(line) {
                    found = Some(caps[1].trim().to_string());
                }
            }
            Some(value) => {
                // pacman indents wrapped values; a new "Key :" line ends the field
                if line.starts_with(char::is_whitespace) && !line.trim().is_empty() {
                    value.push(' ');
                    value.push_str(line.trim());
                } else {
                    break;
                }
            }
        }
    }
    found.filter(|v| !v.is_empty() && v != "None")
}

/// Owner package from `pacman -Qo` ("... is owned by name version") or
/// `pkg which -q` ("name-version") output.
pub fn parse_owner(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    if let Some((_, rest)) = line.split_once(" is owned by ") {
        return rest.split_whitespace().next().map(str::to_string);
    }
    if line.contains(' ') {
        return None;
    }
    // pkg prints name-version; strip the version suffix
    match line.rsplit_once('-') {
        Some((name, ver)) if ver.starts_with(|c: char| c.is_ascii_digit()) => Some(name.to_string()),
        _ => Some(line.to_string()),
    }
}

/// `name version` pairs from `-Qu`/`-Q` style listings, ignoring anything
/// after the version (e.g. "-> newversion" or "[ignored]").
pub fn name_version_pairs(raw: &[u8]) -> Vec<(String, String)> {
    lines(raw)
        .into_iter()
        .filter_map(|l| {
            let mut it = l.split_whitespace();
            Some((it.next()?.to_string(), it.next()?.to_string()))
        })
        .collect()
}

/// `(name, installed, available)` from `name old -> new` upgrade listings.
/// Lines without an arrow are skipped.
pub fn outdated_versions(raw: &[u8]) -> Vec<(String, String, String)> {
    lines(raw)
        .into_iter()
        .filter_map(|l| {
            let mut it = l.split_whitespace();
            let name = it.next()?;
            let old = it.next()?;
            if it.next()? != "->" {
                return None;
            }
            let new = it.next()?;
            Some((name.to_string(), old.to_string(), new.to_string()))
        })
        .collect()
}
