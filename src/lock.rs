//! Per-path advisory locks under `<ticket_dir>/.locks/`.
//!
//! Every ticket mutation runs as lock → read → pure transform → atomic
//! write → unlock, so the critical section is auditable and bounded. The
//! directory-wide lock serializes cache rebuilds and reconciliation against
//! concurrent writers. Locks are OS advisory file locks: they coordinate
//! cooperating processes and evaporate on process exit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::fs::{FileLockGuard, FileSystem};

/// Hidden subdirectory holding lock files; invisible to listing logic.
pub const LOCKS_DIR: &str = ".locks";

/// Bounded wait before lock acquisition fails with DeadlineExceeded.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Lock file used for directory-scope operations.
const DIR_LOCK_NAME: &str = "dir.lock";

pub struct LockManager {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    timeout: Duration,
}

impl LockManager {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        LockManager {
            fs,
            dir: dir.into(),
            timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn locks_dir(&self) -> PathBuf {
        self.dir.join(LOCKS_DIR)
    }

    /// Lock file path for a target: `<dir>/.locks/<sanitized-name>.lock`.
    fn lock_path(&self, target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        let sanitized: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.locks_dir().join(format!("{sanitized}.lock"))
    }

    /// Acquire the exclusive lock for one ticket file.
    pub fn acquire_ticket(&self, target: &Path) -> Result<FileLockGuard> {
        self.fs.mkdir_all(&self.locks_dir())?;
        let lock_path = self.lock_path(target);
        debug!(target = %target.display(), lock = %lock_path.display(), "acquiring ticket lock");
        Ok(self.fs.lock_exclusive(&lock_path, self.timeout)?)
    }

    /// Acquire the directory-wide exclusive lock.
    pub fn acquire_directory(&self) -> Result<FileLockGuard> {
        self.fs.mkdir_all(&self.locks_dir())?;
        let lock_path = self.locks_dir().join(DIR_LOCK_NAME);
        debug!(dir = %self.dir.display(), "acquiring directory lock");
        Ok(self.fs.lock_exclusive(&lock_path, self.timeout)?)
    }

    /// Lock `path`, read its bytes, apply the pure transform, and write the
    /// result atomically if it differs. The lock is released on every exit
    /// path; a transform error means nothing is written.
    pub fn with_ticket_lock(
        &self,
        path: &Path,
        transform: impl FnOnce(&[u8]) -> Result<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let guard = self.acquire_ticket(path)?;
        let bytes = self.fs.read_file(path)?;
        let new_bytes = transform(&bytes)?;
        if new_bytes != bytes {
            self.fs.write_file_atomic(path, &new_bytes)?;
        }
        drop(guard);
        Ok(new_bytes)
    }

    /// Run `f` while holding the directory-wide lock.
    pub fn with_directory_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let guard = self.acquire_directory()?;
        let out = f();
        drop(guard);
        out
    }
}
