//! Run-scoped working state.
//!
//! A [`RunContext`] owns the temporary directory for one run: cloned
//! repositories, extracted archives, rendered HTML, and partial PDFs all live
//! under it. It is created at run start, passed by reference to the components
//! that need scratch space, and torn down when dropped.
//!
//! Cleanup is forced: cloned repositories routinely contain read-only files
//! (git object files are mode 0444), so permission bits are cleared bottom-up
//! before the directory is removed. A cleanup that still fails is logged and
//! swallowed, never an error.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct RunContext {
    temp: Option<TempDir>,
}

impl RunContext {
    /// Create the run context with a fresh temporary directory.
    pub fn new() -> Result<RunContext> {
        let temp = tempfile::Builder::new()
            .prefix("repo2pdf-")
            .tempdir()
            .with_context(|| "Failed to create temporary working directory")?;
        log::debug!("working directory: {}", temp.path().display());
        Ok(RunContext { temp: Some(temp) })
    }

    /// The root of the temporary working directory.
    pub fn temp_path(&self) -> &Path {
        self.temp
            .as_ref()
            .map(TempDir::path)
            .expect("run context used after cleanup")
    }

    /// Create (if needed) and return a named subdirectory of the working
    /// directory.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.temp_path().join(name);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create working subdirectory {}", path.display()))?;
        Ok(path)
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };

        // clear read-only bits first so removal can't trip over them
        if let Err(e) = clear_readonly(temp.path()) {
            log::warn!(
                "failed to clear permissions under {}: {e}",
                temp.path().display()
            );
        }

        let path = temp.path().to_path_buf();
        if let Err(e) = temp.close() {
            log::warn!("failed to remove working directory {}: {e}", path.display());
        }
    }
}

/// Recursively make `path` and everything under it writable by the owner.
///
/// Directories are fixed before recursing so that read-only directories can be
/// listed at all.
fn clear_readonly(path: &Path) -> std::io::Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;
    let mut perms = metadata.permissions();
    if perms.readonly() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            perms.set_mode(perms.mode() | 0o700);
        }
        #[cfg(not(unix))]
        perms.set_readonly(false);
        std::fs::set_permissions(path, perms)?;
    }

    if metadata.is_dir() {
        for entry in std::fs::read_dir(path)? {
            clear_readonly(&entry?.path())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn subdirs_are_created_under_the_temp_root() {
        let ctx = RunContext::new().expect("can create context");
        let dir = ctx.subdir("render").expect("can create subdir");
        assert!(dir.is_dir());
        assert!(dir.starts_with(ctx.temp_path()));
    }

    #[test]
    fn cleanup_removes_read_only_files() {
        let ctx = RunContext::new().expect("can create context");
        let root = ctx.temp_path().to_path_buf();

        // simulate a cloned .git objects directory: read-only file inside a
        // read-only directory
        let objects = root.join("repo/.git/objects");
        std::fs::create_dir_all(&objects).expect("can create dirs");
        let blob = objects.join("ab12cd");
        std::fs::write(&blob, b"loose object").expect("can write");

        let mut perms = std::fs::metadata(&blob).expect("metadata").permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&blob, perms).expect("can set perms");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&objects, std::fs::Permissions::from_mode(0o555))
                .expect("can set dir perms");
        }

        drop(ctx);
        assert!(!root.exists());
    }
}
