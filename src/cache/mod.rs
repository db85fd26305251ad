//! Binary summary cache.
//!
//! One file per ticket directory holding a compact snapshot of every
//! ticket's summary fields, so queries scan without parsing every Markdown
//! file. The format is little-endian, versioned, and CRC-terminated; any
//! mismatch or truncation demotes the cache to "absent", which triggers a
//! full rebuild on the next read that needs it.
//!
//! Consistency model: mutations write the updated entry through after the
//! ticket file write; queries reconcile against directory mtime under the
//! directory lock before trusting the snapshot. Entries are serialized
//! sorted by id so repeated rebuilds produce byte-identical files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{Result, TickError};
use crate::fs::{FileSystem, FsResult};
use crate::frontmatter;
use crate::lock::LockManager;
use crate::types::{Priority, Status, Summary, TicketType};

pub const CACHE_FILE_NAME: &str = ".cache.bin";

const MAGIC: u32 = u32::from_le_bytes(*b"tkcc");
const VERSION: u32 = 1;

/// One cached ticket: file identity plus its [`Summary`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub filename: String,
    pub mtime_ns: i64,
    pub size: u64,
    pub summary: Summary,
}

/// List the `.md` ticket files in a directory, ignoring the cache file, the
/// `.locks` subdirectory, and anything else that is not a ticket.
pub fn list_ticket_files(fs: &dyn FileSystem, dir: &Path) -> FsResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs
        .read_dir(dir)?
        .into_iter()
        .filter(|p| {
            p.extension().is_some_and(|e| e == "md")
                && p.file_name()
                    .is_some_and(|n| !n.to_string_lossy().starts_with('.'))
        })
        .collect();
    files.sort();
    Ok(files)
}

pub struct SummaryCache {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl SummaryCache {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        SummaryCache {
            fs,
            dir: dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }

    /// Load the cache, treating any corruption as absence.
    pub fn load(&self) -> Option<Vec<CacheEntry>> {
        let bytes = self.fs.read_file(&self.path()).ok()?;
        decode(&bytes)
    }

    /// Serialize and atomically replace the cache file.
    pub fn write(&self, entries: &mut Vec<CacheEntry>) -> Result<()> {
        entries.sort_by(|a, b| a.summary.id.cmp(&b.summary.id));
        let bytes = encode(entries);
        self.fs.write_file_atomic(&self.path(), &bytes)?;
        Ok(())
    }

    /// Write-through after a single-ticket mutation: replace that entry by
    /// filename. An unreadable cache is rebuilt instead, so the entry is
    /// guaranteed present afterwards either way.
    pub fn update_entry(&self, locks: &LockManager, entry: CacheEntry) -> Result<()> {
        match self.load() {
            Some(mut entries) => {
                entries.retain(|e| e.filename != entry.filename);
                entries.push(entry);
                self.write(&mut entries)
            }
            None => {
                debug!("cache absent during write-through; rebuilding");
                self.rebuild(locks).map(|_| ())
            }
        }
    }

    /// Full rebuild under the directory lock: parse every ticket file with a
    /// parallel worker pool. Per-file failures become warnings and never
    /// abort the rebuild.
    pub fn rebuild(&self, locks: &LockManager) -> Result<(Vec<CacheEntry>, Vec<String>)> {
        locks.with_directory_lock(|| self.rebuild_locked())
    }

    fn rebuild_locked(&self) -> Result<(Vec<CacheEntry>, Vec<String>)> {
        let files = list_ticket_files(self.fs.as_ref(), &self.dir)?;
        debug!(count = files.len(), "rebuilding summary cache");

        let results: Vec<std::result::Result<CacheEntry, String>> = files
            .par_iter()
            .map(|path| self.parse_entry(path))
            .collect();

        let mut entries = Vec::new();
        let mut warnings = Vec::new();
        for result in results {
            match result {
                Ok(entry) => entries.push(entry),
                Err(w) => warnings.push(w),
            }
        }

        if let Err(e) = self.write(&mut entries) {
            warn!(error = %e, "cache write failed after rebuild");
            warnings.push(format!("failed to write cache: {e}"));
        }
        Ok((entries, warnings))
    }

    /// Bring the cache in sync with the directory and return the snapshot.
    ///
    /// Holds the directory lock throughout. If the directory mtime is newer
    /// than the cache file's, the file listing is diffed: entries whose file
    /// vanished are dropped, new files are parsed, and entries whose mtime or
    /// size changed are re-parsed. Unchanged entries are served as-is.
    pub fn reconcile(&self, locks: &LockManager) -> Result<(Vec<CacheEntry>, Vec<String>)> {
        locks.with_directory_lock(|| {
            let Some(entries) = self.load() else {
                return self.rebuild_locked();
            };

            let cache_stat = match self.fs.stat(&self.path()) {
                Ok(s) => s,
                Err(_) => return self.rebuild_locked(),
            };
            let dir_stat = self.fs.stat(&self.dir)?;
            if dir_stat.mtime_ns <= cache_stat.mtime_ns {
                return Ok((entries, Vec::new()));
            }

            debug!("directory newer than cache; reconciling");
            self.reconcile_locked(entries)
        })
    }

    fn reconcile_locked(
        &self,
        entries: Vec<CacheEntry>,
    ) -> Result<(Vec<CacheEntry>, Vec<String>)> {
        let files = list_ticket_files(self.fs.as_ref(), &self.dir)?;
        let mut warnings = Vec::new();
        let mut fresh = Vec::with_capacity(files.len());
        let mut changed = false;

        for path in &files {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let cached = entries.iter().find(|e| e.filename == filename);

            let unchanged = cached.is_some_and(|e| {
                self.fs
                    .stat(path)
                    .is_ok_and(|info| info.mtime_ns == e.mtime_ns && info.size == e.size)
            });

            if unchanged {
                fresh.push(cached.unwrap().clone());
                continue;
            }

            changed = true;
            match self.parse_entry(path) {
                Ok(entry) => fresh.push(entry),
                Err(w) => warnings.push(w),
            }
        }

        // Dropped files: anything cached that is no longer listed.
        if fresh.len() != entries.len() {
            changed = true;
        }

        if changed {
            if let Err(e) = self.write(&mut fresh) {
                warn!(error = %e, "cache write failed after reconciliation");
                warnings.push(format!("failed to write cache: {e}"));
            }
        }
        Ok((fresh, warnings))
    }

    /// Read and parse one ticket file into a cache entry. The error side is
    /// a per-path warning message.
    pub fn parse_entry(&self, path: &Path) -> std::result::Result<CacheEntry, String> {
        let against = |e: TickError| format!("{}: {e}", path.display());

        let bytes = self.fs.read_file(path).map_err(|e| against(e.into()))?;
        let info = self.fs.stat(path).map_err(|e| against(e.into()))?;
        let content =
            std::str::from_utf8(&bytes).map_err(|_| against(TickError::MalformedFrontmatter(
                "ticket file is not valid UTF-8".to_string(),
            )))?;
        let summary = frontmatter::parse_summary(content).map_err(against)?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = filename.strip_suffix(".md").unwrap_or(&filename);
        if summary.id != stem {
            return Err(against(TickError::Other(format!(
                "ticket id '{}' does not match filename",
                summary.id
            ))));
        }

        Ok(CacheEntry {
            filename,
            mtime_ns: info.mtime_ns,
            size: info.size,
            summary,
        })
    }
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u16(buf, s.len() as u16);
    buf.extend_from_slice(s.as_bytes());
}

fn encode(entries: &[CacheEntry]) -> Vec<u8> {
    let mut buf = Vec::new();
    put_u32(&mut buf, MAGIC);
    put_u32(&mut buf, VERSION);
    put_u32(&mut buf, entries.len() as u32);

    for entry in entries {
        let s = &entry.summary;
        put_str(&mut buf, &s.id);
        put_str(&mut buf, &entry.filename);
        put_i64(&mut buf, entry.mtime_ns);
        put_u64(&mut buf, entry.size);
        buf.push(s.status.code());
        buf.push(s.ticket_type.code());
        buf.push(s.priority.as_num());
        put_str(&mut buf, &s.title);
        put_str(&mut buf, &s.assignee);
        put_str(&mut buf, &s.closed);
        put_str(&mut buf, s.parent.as_deref().unwrap_or(""));
        put_u16(&mut buf, s.blocked_by.len() as u16);
        for blocker in &s.blocked_by {
            put_str(&mut buf, blocker);
        }
    }

    let crc = crc32fast::hash(&buf);
    put_u32(&mut buf, crc);
    buf
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes(b.try_into().unwrap()))
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|b| u32::from_le_bytes(b.try_into().unwrap()))
    }

    fn u64(&mut self) -> Option<u64> {
        self.take(8).map(|b| u64::from_le_bytes(b.try_into().unwrap()))
    }

    fn i64(&mut self) -> Option<i64> {
        self.take(8).map(|b| i64::from_le_bytes(b.try_into().unwrap()))
    }

    fn string(&mut self) -> Option<String> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).ok()
    }
}

/// Decode a cache file. Any mismatch — magic, version, CRC, truncation,
/// trailing garbage, invalid field codes — yields `None` (cache absent).
fn decode(bytes: &[u8]) -> Option<Vec<CacheEntry>> {
    if bytes.len() < 16 {
        return None;
    }
    let (payload, crc_bytes) = bytes.split_at(bytes.len() - 4);
    let stored_crc = u32::from_le_bytes(crc_bytes.try_into().unwrap());
    if crc32fast::hash(payload) != stored_crc {
        return None;
    }

    let mut r = Reader {
        buf: payload,
        pos: 0,
    };
    if r.u32()? != MAGIC || r.u32()? != VERSION {
        return None;
    }
    let count = r.u32()? as usize;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let id = r.string()?;
        let filename = r.string()?;
        let mtime_ns = r.i64()?;
        let size = r.u64()?;
        let status = Status::from_code(r.u8()?)?;
        let ticket_type = TicketType::from_code(r.u8()?)?;
        let priority = Priority::from_num(r.u8()?)?;
        let title = r.string()?;
        let assignee = r.string()?;
        let closed = r.string()?;
        let parent = r.string()?;
        let blocker_count = r.u16()? as usize;
        let mut blocked_by = Vec::with_capacity(blocker_count);
        for _ in 0..blocker_count {
            blocked_by.push(r.string()?);
        }

        entries.push(CacheEntry {
            filename,
            mtime_ns,
            size,
            summary: Summary {
                id,
                status,
                ticket_type,
                priority,
                title,
                assignee,
                closed,
                parent: (!parent.is_empty()).then_some(parent),
                blocked_by,
            },
        });
    }

    if r.pos != payload.len() {
        return None;
    }
    Some(entries)
}
