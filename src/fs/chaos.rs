//! Deterministic fault injection for tests.
//!
//! [`ChaosFileSystem`] wraps any [`FileSystem`] and injects failures drawn
//! from a seeded RNG, so a failing sequence can be replayed from its seed.
//! Injected errors carry the same op/path context and classify exactly like
//! real errors (`is_not_found` / `is_permission` / `is_timeout`), plus an
//! `injected` marker so tests can tell them apart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FileInfo, FileLockGuard, FileSystem, FsError, FsErrorKind, FsResult};

/// Injection probabilities, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy)]
pub struct FaultPlan {
    /// Chance that any operation fails outright.
    pub fail: f64,
    /// Chance that a successful read returns a truncated prefix.
    pub truncate_read: f64,
    /// Chance that a lock acquisition fails with DeadlineExceeded.
    pub lock_fail: f64,
}

impl FaultPlan {
    pub fn uniform(p: f64) -> Self {
        FaultPlan {
            fail: p,
            truncate_read: p,
            lock_fail: p,
        }
    }
}

pub struct ChaosFileSystem {
    inner: Arc<dyn FileSystem>,
    plan: FaultPlan,
    // The only in-process lock in the codebase: it guards the chaos RNG, not
    // any filesystem state.
    rng: Mutex<StdRng>,
}

impl ChaosFileSystem {
    pub fn new(inner: Arc<dyn FileSystem>, seed: u64, plan: FaultPlan) -> Self {
        ChaosFileSystem {
            inner,
            plan,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn roll(&self) -> f64 {
        self.rng.lock().random::<f64>()
    }

    /// Fail `op` with probability `plan.fail`, cycling deterministically
    /// through the environment-class error kinds.
    fn maybe_fail(&self, op: &'static str, path: &Path) -> FsResult<()> {
        let mut rng = self.rng.lock();
        if rng.random::<f64>() >= self.plan.fail {
            return Ok(());
        }
        let kind = match rng.random_range(0..4u8) {
            0 => FsErrorKind::Io,
            1 => FsErrorKind::NoSpace,
            2 => FsErrorKind::Permission,
            _ => FsErrorKind::Interrupted,
        };
        Err(FsError::injected(op, path.to_path_buf(), kind))
    }
}

impl FileSystem for ChaosFileSystem {
    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        self.maybe_fail("read", path)?;
        let mut bytes = self.inner.read_file(path)?;
        if !bytes.is_empty() && self.roll() < self.plan.truncate_read {
            let keep = self.rng.lock().random_range(0..bytes.len());
            bytes.truncate(keep);
        }
        Ok(bytes)
    }

    fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> FsResult<()> {
        // A failed or truncated write surfaces as an error without touching
        // the target: the real write is temp + rename, so a fault can only
        // lose the whole write, never persist part of it.
        self.maybe_fail("write", path)?;
        self.inner.write_file_atomic(path, bytes)
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        self.maybe_fail("list", path)?;
        self.inner.read_dir(path)
    }

    fn mkdir_all(&self, path: &Path) -> FsResult<()> {
        self.maybe_fail("create directory", path)?;
        self.inner.mkdir_all(path)
    }

    fn stat(&self, path: &Path) -> FsResult<FileInfo> {
        self.maybe_fail("stat", path)?;
        self.inner.stat(path)
    }

    fn exists(&self, path: &Path) -> FsResult<bool> {
        self.maybe_fail("stat", path)?;
        self.inner.exists(path)
    }

    fn remove(&self, path: &Path) -> FsResult<()> {
        self.maybe_fail("remove", path)?;
        self.inner.remove(path)
    }

    fn remove_all(&self, path: &Path) -> FsResult<()> {
        self.maybe_fail("remove", path)?;
        self.inner.remove_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        self.maybe_fail("rename", from)?;
        self.inner.rename(from, to)
    }

    fn lock_exclusive(&self, path: &Path, timeout: Duration) -> FsResult<FileLockGuard> {
        if self.roll() < self.plan.lock_fail {
            return Err(FsError::injected(
                "lock",
                path.to_path_buf(),
                FsErrorKind::DeadlineExceeded,
            ));
        }
        self.inner.lock_exclusive(path, timeout)
    }
}
