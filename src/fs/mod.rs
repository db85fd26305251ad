//! Filesystem abstraction used by every component that touches disk.
//!
//! All I/O goes through the [`FileSystem`] trait so tests can substitute the
//! fault-injecting [`chaos::ChaosFileSystem`] wrapper. Errors are classified
//! into a small taxonomy ([`FsErrorKind`]) because higher layers branch on
//! not-found / permission / timeout rather than raw errno values.

pub mod chaos;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    NotFound,
    Permission,
    Io,
    NoSpace,
    ReadOnly,
    Interrupted,
    DeadlineExceeded,
    Exists,
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsErrorKind::NotFound => "not found",
            FsErrorKind::Permission => "permission denied",
            FsErrorKind::Io => "I/O error",
            FsErrorKind::NoSpace => "no space left on device",
            FsErrorKind::ReadOnly => "read-only filesystem",
            FsErrorKind::Interrupted => "interrupted",
            FsErrorKind::DeadlineExceeded => "deadline exceeded",
            FsErrorKind::Exists => "already exists",
        };
        f.write_str(s)
    }
}

/// A filesystem operation failure with op/path context.
///
/// `injected` marks errors produced by the chaos wrapper so tests can tell
/// them apart from real failures; the classification predicates answer
/// identically either way.
#[derive(Debug)]
pub struct FsError {
    pub op: &'static str,
    pub path: PathBuf,
    pub kind: FsErrorKind,
    pub injected: bool,
    pub source: Option<io::Error>,
}

impl FsError {
    pub fn new(op: &'static str, path: impl Into<PathBuf>, kind: FsErrorKind) -> Self {
        FsError {
            op,
            path: path.into(),
            kind,
            injected: false,
            source: None,
        }
    }

    pub fn injected(op: &'static str, path: impl Into<PathBuf>, kind: FsErrorKind) -> Self {
        FsError {
            injected: true,
            ..FsError::new(op, path, kind)
        }
    }

    pub fn from_io(op: &'static str, path: impl Into<PathBuf>, err: io::Error) -> Self {
        FsError {
            op,
            path: path.into(),
            kind: classify(&err),
            injected: false,
            source: Some(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FsErrorKind::NotFound
    }

    pub fn is_permission(&self) -> bool {
        self.kind == FsErrorKind::Permission
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FsErrorKind::DeadlineExceeded
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to {} '{}': {}",
            self.op,
            self.path.display(),
            self.kind
        )
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as _)
    }
}

/// Map an `io::Error` into the taxonomy.
fn classify(err: &io::Error) -> FsErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => FsErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => FsErrorKind::Permission,
        io::ErrorKind::AlreadyExists => FsErrorKind::Exists,
        io::ErrorKind::Interrupted => FsErrorKind::Interrupted,
        io::ErrorKind::TimedOut => FsErrorKind::DeadlineExceeded,
        _ => {
            #[cfg(unix)]
            if let Some(code) = err.raw_os_error() {
                if code == libc::ENOSPC {
                    return FsErrorKind::NoSpace;
                }
                if code == libc::EROFS {
                    return FsErrorKind::ReadOnly;
                }
            }
            FsErrorKind::Io
        }
    }
}

pub type FsResult<T> = std::result::Result<T, FsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub mtime_ns: i64,
    pub size: u64,
    pub is_dir: bool,
}

/// RAII guard holding an advisory exclusive file lock.
///
/// The lock is released when the guard is dropped (the file handle closes);
/// the OS releases it on process exit, so no stale locked state survives.
#[derive(Debug)]
pub struct FileLockGuard {
    _file: Option<File>,
}

pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>>;

    /// Write to a temp sibling in the same directory, fsync, and rename into
    /// place. Readers never observe a partial write; the temp file is removed
    /// on failure.
    fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> FsResult<()>;

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>>;

    fn mkdir_all(&self, path: &Path) -> FsResult<()>;

    fn stat(&self, path: &Path) -> FsResult<FileInfo>;

    /// Returns false on not-found; propagates every other error.
    fn exists(&self, path: &Path) -> FsResult<bool>;

    fn remove(&self, path: &Path) -> FsResult<()>;

    fn remove_all(&self, path: &Path) -> FsResult<()>;

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()>;

    /// Acquire an advisory exclusive lock on `path`, creating the lock file
    /// if needed. Waits up to `timeout`, then fails with DeadlineExceeded.
    fn lock_exclusive(&self, path: &Path, timeout: Duration) -> FsResult<FileLockGuard>;
}

/// Poll interval for bounded-wait lock acquisition.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Check whether an I/O error represents lock contention on this platform.
fn is_lock_contention(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    #[cfg(unix)]
    {
        // EAGAIN and EWOULDBLOCK are the same value on Linux but may differ
        // on other POSIX systems, so check both.
        let code = e.raw_os_error();
        code == Some(libc::EAGAIN) || code == Some(libc::EWOULDBLOCK)
    }
    #[cfg(windows)]
    {
        // ERROR_LOCK_VIOLATION = 33
        e.raw_os_error() == Some(33)
    }
    #[cfg(not(any(unix, windows)))]
    {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| FsError::from_io("read", path, e))
    }

    fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> FsResult<()> {
        let parent = path.parent().unwrap_or(Path::new("."));

        let mut temp = NamedTempFile::new_in(parent)
            .map_err(|e| FsError::from_io("create temp file for", path, e))?;

        temp.write_all(bytes)
            .map_err(|e| FsError::from_io("write", path, e))?;

        temp.as_file()
            .sync_data()
            .map_err(|e| FsError::from_io("sync", path, e))?;

        // NamedTempFile removes the temp on drop if persist is never reached.
        temp.persist(path)
            .map_err(|e| FsError::from_io("rename", path, e.error))?;

        Ok(())
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path).map_err(|e| FsError::from_io("list", path, e))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FsError::from_io("list", path, e))?;
            out.push(entry.path());
        }
        Ok(out)
    }

    fn mkdir_all(&self, path: &Path) -> FsResult<()> {
        std::fs::create_dir_all(path).map_err(|e| FsError::from_io("create directory", path, e))
    }

    fn stat(&self, path: &Path) -> FsResult<FileInfo> {
        let meta = std::fs::metadata(path).map_err(|e| FsError::from_io("stat", path, e))?;
        let mtime = meta
            .modified()
            .map_err(|e| FsError::from_io("stat", path, e))?;
        Ok(FileInfo {
            mtime_ns: system_time_to_ns(mtime),
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn exists(&self, path: &Path) -> FsResult<bool> {
        match std::fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FsError::from_io("stat", path, e)),
        }
    }

    fn remove(&self, path: &Path) -> FsResult<()> {
        std::fs::remove_file(path).map_err(|e| FsError::from_io("remove", path, e))
    }

    fn remove_all(&self, path: &Path) -> FsResult<()> {
        std::fs::remove_dir_all(path).map_err(|e| FsError::from_io("remove", path, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        std::fs::rename(from, to).map_err(|e| FsError::from_io("rename", from, e))
    }

    fn lock_exclusive(&self, path: &Path, timeout: Duration) -> FsResult<FileLockGuard> {
        // The lock file must be opened in write mode; append mode is not
        // good enough on Windows.
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| FsError::from_io("open lock file", path, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(FileLockGuard { _file: Some(file) }),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_lock_contention(&e) => {
                    if Instant::now() >= deadline {
                        return Err(FsError::new(
                            "lock",
                            path,
                            FsErrorKind::DeadlineExceeded,
                        ));
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(FsError::from_io("lock", path, e)),
            }
        }
    }
}

fn system_time_to_ns(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i64,
        Err(e) => -(e.duration().as_nanos() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let fs = OsFileSystem;

        fs.write_file_atomic(&path, b"hello world").unwrap();
        assert_eq!(fs.read_file(&path).unwrap(), b"hello world");
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let fs = OsFileSystem;

        fs.write_file_atomic(&path, b"data").unwrap();

        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], path);
    }

    #[test]
    fn atomic_write_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let fs = OsFileSystem;

        fs.write_file_atomic(&path, b"first").unwrap();
        fs.write_file_atomic(&path, b"second").unwrap();
        assert_eq!(fs.read_file(&path).unwrap(), b"second");
    }

    #[test]
    fn exists_distinguishes_not_found() {
        let dir = TempDir::new().unwrap();
        let fs = OsFileSystem;
        assert!(!fs.exists(&dir.path().join("missing")).unwrap());
        fs.write_file_atomic(&dir.path().join("present"), b"x").unwrap();
        assert!(fs.exists(&dir.path().join("present")).unwrap());
    }

    #[test]
    fn read_missing_file_classifies_not_found() {
        let dir = TempDir::new().unwrap();
        let fs = OsFileSystem;
        let err = fs.read_file(&dir.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.injected);
        assert_eq!(err.op, "read");
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("x.lock");
        let fs = OsFileSystem;

        let guard = fs
            .lock_exclusive(&lock_path, Duration::from_secs(1))
            .unwrap();

        // A second acquisition from this process would succeed on platforms
        // where flock is per-open-file, so contention is exercised with a
        // short timeout from a helper thread holding its own handle in the
        // integration suite. Here we only verify release-on-drop.
        drop(guard);
        let again = fs.lock_exclusive(&lock_path, Duration::from_secs(1));
        assert!(again.is_ok());
    }

    #[test]
    fn stat_reports_size_and_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        let fs = OsFileSystem;
        fs.write_file_atomic(&path, b"12345").unwrap();

        let info = fs.stat(&path).unwrap();
        assert_eq!(info.size, 5);
        assert!(info.mtime_ns > 0);
        assert!(!info.is_dir);
        assert!(fs.stat(dir.path()).unwrap().is_dir);
    }
}
