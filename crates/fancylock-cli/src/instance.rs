//! Single-instance guard
//!
//! An exclusive advisory lock on a file in the runtime directory. The lock is
//! held for as long as the returned [`InstanceLock`] lives and is dropped by
//! the kernel if the process dies.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fs2::FileExt;

const LOCK_FILE: &str = "fancylock.lock";

/// Held exclusive lock
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Default lock file: `$XDG_RUNTIME_DIR/fancylock.lock`, else `/tmp`
    pub fn default_path() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(LOCK_FILE)
    }

    /// Take the lock or fail if another fancylock holds it
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for lock file: {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {:?}", path))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                bail!("fancylock is already running (lock held on {:?})", path);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to lock {:?}", path));
            }
        }

        tracing::debug!("Instance lock taken on {:?}", path);
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_instance_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join(LOCK_FILE);

        let first = InstanceLock::acquire(&path).unwrap();
        assert_eq!(first.path(), path);

        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("already running"));

        drop(first);
        assert!(InstanceLock::acquire(&path).is_ok());
    }
}
