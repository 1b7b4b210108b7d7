//! Advisory run lock

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, TrendError};

/// Exclusive lock held for the duration of a run; released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting; fails if another run holds it
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|e| TrendError::Config(format!("another run holds {:?}: {}", path, e)))?;

        tracing::debug!("Acquired run lock {:?}", path);
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release run lock {:?}: {}", self.path, e);
        }
    }
}
