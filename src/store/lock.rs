//! Cross-process single-writer lock for the workspace state file.
//!
//! Acquisition creates the marker file exclusively and writes the holder's
//! pid; an existing marker means another `bset` process is mid-operation and
//! acquisition fails immediately, without waiting or retrying. A process that dies
//! between create and release leaves a stale marker that has to be removed
//! by hand; the contention error names the file for exactly that case.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const LOCK_FILE: &str = "branchsets.lock";

/// A held lock on one workspace's feature state. Released on drop.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
}

impl WorkspaceLock {
    /// Acquire the lock inside `metadata_dir`, failing fast with
    /// [`Error::Contention`] if another process holds it.
    pub fn acquire(metadata_dir: &Path) -> Result<Self> {
        let path = metadata_dir.join(LOCK_FILE);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                file.sync_all()?;
                tracing::debug!(lock = %path.display(), "acquired workspace lock");
                Ok(Self { path })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let holder_pid = std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                Err(Error::Contention {
                    holder_pid,
                    lock_path: path.display().to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), %err, "failed to remove lock marker");
        }
    }
}
