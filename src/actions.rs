use crate::error::Result;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Prefix shared by every actions file; used to sweep leftovers.
pub const PREFIX: &str = ".pkgfront-actions-";

/// Transient shell script holding the pending commands of one operation.
///
/// The file is removed when this value is dropped.
pub struct ActionsFile {
    file: NamedTempFile,
}

impl ActionsFile {
    /// New, randomly named, empty actions file in the temp directory.
    pub fn create() -> Result<Self> {
        Self::create_in(&std::env::temp_dir())
    }

    pub fn create_in(dir: &Path) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(PREFIX)
            .rand_bytes(10)
            .tempfile_in(dir)?;
        // stop at the first failing command
        writeln!(file, "#!/bin/sh\nset -e")?;
        tracing::debug!(path = %file.path().display(), "created actions file");
        Ok(Self { file })
    }

    /// Stage one command line.
    pub fn push(&mut self, command: &str) -> Result<()> {
        writeln!(self.file, "{}", command)?;
        Ok(())
    }

    /// Flush and make the file owner read+execute only.
    pub fn finalize(&mut self) -> Result<()> {
        self.file.flush()?;
        fs::set_permissions(self.file.path(), fs::Permissions::from_mode(0o500))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn remove(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }
}

/// Write `commands` into a fresh, finalized actions file.
pub fn stage(commands: &[String]) -> Result<ActionsFile> {
    let mut file = ActionsFile::create()?;
    for cmd in commands {
        file.push(cmd)?;
    }
    file.finalize()?;
    Ok(file)
}

/// Delete actions files left in `dir` by runs that never cleaned up.
pub fn remove_stale_in(dir: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return removed;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(PREFIX));
        if is_ours && path.is_file() && fs::remove_file(&path).is_ok() {
            removed.push(path);
        }
    }
    if !removed.is_empty() {
        tracing::info!(count = removed.len(), "removed stale actions files");
    }
    removed
}

pub fn remove_stale() -> Vec<PathBuf> {
    remove_stale_in(&std::env::temp_dir())
}
