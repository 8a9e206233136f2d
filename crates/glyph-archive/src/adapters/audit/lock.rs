//! # Audit Append Locking
//!
//! Serializes appends from concurrent processes sharing one audit log.
//!
//! The lock is taken on the log file itself and held for the whole
//! read-last-digest / write-record sequence, so two writers can never link
//! to the same predecessor.
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on Windows).

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Exclusive lock on an audit log, released on drop (RAII).
///
/// ```ignore
/// let mut guard = AppendLock::acquire(Path::new("logs/audit.jsonl"))?;
/// // read tail, append record through guard.file_mut()
/// ```
pub struct AppendLock {
    /// Handle opened read + append; kept open to maintain the lock.
    file: File,
    path: PathBuf,
}

impl AppendLock {
    /// Open (creating if needed) and lock `path`, blocking until the lock is
    /// available.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        file.lock_exclusive()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Non-blocking variant. Returns `Ok(None)` when another holder exists.
    #[cfg(test)]
    fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AppendLock {
    fn drop(&mut self) {
        // The log file itself stays; only the flock is released.
        let _ = self.file.unlock();
    }
}
