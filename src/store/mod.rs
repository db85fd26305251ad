//! Ticket store: create, read, and mutate ticket files.
//!
//! Every mutation follows the same protocol: acquire the ticket's advisory
//! lock, read the full bytes, apply a pure transformation, write atomically,
//! release, then write the updated summary through to the cache. The cache
//! step runs outside the ticket lock but before returning; its failure is a
//! warning, never a rollback (the cache is recoverable by rebuild, the file
//! mutation is not).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cache::{self, SummaryCache};
use crate::error::{Result, TickError};
use crate::frontmatter;
use crate::fs::{FileSystem, OsFileSystem};
use crate::id;
use crate::lock::LockManager;
use crate::state::{self, SummaryMap};
use crate::types::{NewTicket, Status, Summary, now_utc};

pub struct TicketStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    locks: LockManager,
    cache: SummaryCache,
}

/// Result of repairing one ticket's blocker list.
#[derive(Debug, Default)]
pub struct RepairOutcome {
    /// Blocker ids removed (or that would be removed under dry-run).
    pub removed: Vec<String>,
    pub warnings: Vec<String>,
}

impl TicketStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        TicketStore {
            locks: LockManager::new(Arc::clone(&fs), &dir),
            cache: SummaryCache::new(Arc::clone(&fs), &dir),
            fs,
            dir,
        }
    }

    /// Store over the real filesystem.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        TicketStore::new(Arc::new(OsFileSystem), dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache(&self) -> &SummaryCache {
        &self.cache
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn path(&self, ticket_id: &str) -> PathBuf {
        self.dir.join(format!("{ticket_id}.md"))
    }

    pub fn exists(&self, ticket_id: &str) -> Result<bool> {
        Ok(self.fs.exists(&self.path(ticket_id))?)
    }

    /// Full file contents, verbatim.
    pub fn read_ticket(&self, ticket_id: &str) -> Result<String> {
        let path = self.path(ticket_id);
        let bytes = self.fs.read_file(&path).map_err(|e| {
            if e.is_not_found() {
                TickError::TicketNotFound(ticket_id.to_string())
            } else {
                e.into()
            }
        })?;
        String::from_utf8(bytes).map_err(|_| {
            TickError::MalformedFrontmatter("ticket file is not valid UTF-8".to_string())
        })
    }

    pub fn parse_summary(&self, ticket_id: &str) -> Result<Summary> {
        frontmatter::parse_summary(&self.read_ticket(ticket_id)?)
    }

    /// Reconciled snapshot of every ticket, as a map keyed by id, plus any
    /// per-file warnings accumulated along the way.
    pub fn snapshot(&self) -> Result<(SummaryMap, Vec<String>)> {
        let (entries, warnings) = self.cache.reconcile(&self.locks)?;
        let map = state::to_map(entries.into_iter().map(|e| e.summary));
        Ok((map, warnings))
    }

    /// Create a ticket: allocate an id, render, and write under the ticket
    /// lock with an exists-check so racing allocators converge on distinct
    /// suffixes. Returns the id, the file path, and cache warnings.
    pub fn create(&self, ticket: &NewTicket) -> Result<(String, PathBuf, Vec<String>)> {
        if ticket.title.trim().is_empty() {
            return Err(TickError::EmptyTitle);
        }
        if let Some(parent) = &ticket.parent {
            id::validate_id(parent)?;
            if !self.exists(parent)? {
                return Err(TickError::ParentNotFound(parent.clone()));
            }
            // A new open ticket under a closed parent would break the
            // closed-parent invariant on arrival.
            if self.parse_summary(parent)?.status == Status::Closed {
                return Err(TickError::ParentClosed {
                    id: ticket.title.clone(),
                    parent: parent.clone(),
                });
            }
        }
        let mut blockers = Vec::new();
        let mut seen = HashSet::new();
        for blocker in &ticket.blocked_by {
            id::validate_id(blocker)?;
            if !self.exists(blocker)? {
                return Err(TickError::BlockerNotFound(blocker.clone()));
            }
            if seen.insert(blocker.clone()) {
                blockers.push(blocker.clone());
            }
        }

        self.fs.mkdir_all(&self.dir)?;

        let created = now_utc();
        let base = id::base_id_for_title(&ticket.title);

        for candidate in id::candidates(&base) {
            let path = self.path(&candidate);
            let guard = self.locks.acquire_ticket(&path)?;
            if self.fs.exists(&path)? {
                drop(guard);
                continue;
            }
            let content = render_ticket(ticket, &blockers, &candidate, &created);
            self.fs.write_file_atomic(&path, content.as_bytes())?;
            drop(guard);

            debug!(id = %candidate, "created ticket");
            let warnings = self.finish_mutation(&path);
            return Ok((candidate, path, warnings));
        }

        Err(TickError::IdExhausted(base))
    }

    /// open → in_progress.
    pub fn start(&self, ticket_id: &str) -> Result<Vec<String>> {
        id::validate_id(ticket_id)?;
        let (map, mut warnings) = self.snapshot()?;
        let ticket = self.require(ticket_id, &map)?;
        state::check_start(ticket, &map)?;

        let path = self.path(ticket_id);
        self.locks.with_ticket_lock(&path, |bytes| {
            let content = as_utf8(bytes)?;
            let current = frontmatter::parse_summary(content)?;
            if current.status != Status::Open {
                return Err(wrong_state(&current, "open"));
            }
            frontmatter::set_field(content, "status", "in_progress").map(String::into_bytes)
        })?;

        warnings.extend(self.finish_mutation(&path));
        Ok(warnings)
    }

    /// in_progress → closed; stamps the `closed` timestamp next to `status`.
    pub fn close(&self, ticket_id: &str) -> Result<Vec<String>> {
        id::validate_id(ticket_id)?;
        let (map, mut warnings) = self.snapshot()?;
        let ticket = self.require(ticket_id, &map)?;
        state::check_close(ticket, &map)?;

        let closed_at = now_utc();
        let path = self.path(ticket_id);
        self.locks.with_ticket_lock(&path, |bytes| {
            let content = as_utf8(bytes)?;
            let current = frontmatter::parse_summary(content)?;
            if current.status != Status::InProgress {
                return Err(wrong_state(&current, "in_progress"));
            }
            let updated = frontmatter::set_field(content, "status", "closed")?;
            frontmatter::add_field_after_status(&updated, "closed", &closed_at)
                .map(String::into_bytes)
        })?;

        warnings.extend(self.finish_mutation(&path));
        Ok(warnings)
    }

    /// closed → open; removes the `closed` timestamp.
    pub fn reopen(&self, ticket_id: &str) -> Result<Vec<String>> {
        id::validate_id(ticket_id)?;
        let (map, mut warnings) = self.snapshot()?;
        let ticket = self.require(ticket_id, &map)?;
        state::check_reopen(ticket, &map)?;

        let path = self.path(ticket_id);
        self.locks.with_ticket_lock(&path, |bytes| {
            let content = as_utf8(bytes)?;
            let current = frontmatter::parse_summary(content)?;
            if current.status != Status::Closed {
                return Err(wrong_state(&current, "closed"));
            }
            let updated = frontmatter::set_field(content, "status", "open")?;
            frontmatter::remove_field(&updated, "closed").map(String::into_bytes)
        })?;

        warnings.extend(self.finish_mutation(&path));
        Ok(warnings)
    }

    /// Append a blocker to the ticket's list.
    pub fn block(&self, ticket_id: &str, blocker_id: &str) -> Result<Vec<String>> {
        id::validate_id(ticket_id)?;
        id::validate_id(blocker_id)?;
        let (map, mut warnings) = self.snapshot()?;
        let ticket = self.require(ticket_id, &map)?;
        state::check_block(ticket, blocker_id, &map)?;

        let path = self.path(ticket_id);
        self.locks.with_ticket_lock(&path, |bytes| {
            let content = as_utf8(bytes)?;
            let current = frontmatter::parse_summary(content)?;
            if current.blocked_by.iter().any(|b| b == blocker_id) {
                return Err(TickError::AlreadyBlocked {
                    id: current.id,
                    blocker: blocker_id.to_string(),
                });
            }
            let mut blockers = current.blocked_by;
            blockers.push(blocker_id.to_string());
            frontmatter::update_blocked_by(content, &blockers).map(String::into_bytes)
        })?;

        warnings.extend(self.finish_mutation(&path));
        Ok(warnings)
    }

    /// Remove a blocker from the ticket's list.
    pub fn unblock(&self, ticket_id: &str, blocker_id: &str) -> Result<Vec<String>> {
        id::validate_id(ticket_id)?;
        id::validate_id(blocker_id)?;
        let (map, mut warnings) = self.snapshot()?;
        let ticket = self.require(ticket_id, &map)?;
        state::check_unblock(ticket, blocker_id)?;

        let path = self.path(ticket_id);
        self.locks.with_ticket_lock(&path, |bytes| {
            let content = as_utf8(bytes)?;
            let current = frontmatter::parse_summary(content)?;
            if !current.blocked_by.iter().any(|b| b == blocker_id) {
                return Err(TickError::NotBlocked {
                    id: current.id,
                    blocker: blocker_id.to_string(),
                });
            }
            let blockers: Vec<String> = current
                .blocked_by
                .into_iter()
                .filter(|b| b != blocker_id)
                .collect();
            frontmatter::update_blocked_by(content, &blockers).map(String::into_bytes)
        })?;

        warnings.extend(self.finish_mutation(&path));
        Ok(warnings)
    }

    /// Remove stale, duplicate, and self-referential blockers from one
    /// ticket. `dry_run` reports without writing.
    pub fn repair_ticket(&self, ticket_id: &str, dry_run: bool) -> Result<RepairOutcome> {
        id::validate_id(ticket_id)?;
        if !self.exists(ticket_id)? {
            return Err(TickError::TicketNotFound(ticket_id.to_string()));
        }
        let summary = self.parse_summary(ticket_id)?;

        let mut seen = HashSet::new();
        let mut removed = Vec::new();
        for blocker in &summary.blocked_by {
            let stale = blocker == ticket_id
                || !seen.insert(blocker.clone())
                || !self.exists(blocker)?;
            if stale {
                removed.push(blocker.clone());
            }
        }

        let mut outcome = RepairOutcome {
            removed,
            warnings: Vec::new(),
        };
        if outcome.removed.is_empty() || dry_run {
            return Ok(outcome);
        }

        // The stale set was computed outside the lock; the transform stays
        // pure by filtering whatever list the locked read observes.
        let stale: HashSet<String> = outcome.removed.iter().cloned().collect();
        let path = self.path(ticket_id);
        self.locks.with_ticket_lock(&path, |bytes| {
            let content = as_utf8(bytes)?;
            let current = frontmatter::parse_summary(content)?;
            let mut kept = Vec::new();
            let mut seen = HashSet::new();
            for blocker in current.blocked_by {
                if blocker != ticket_id && !stale.contains(&blocker) && seen.insert(blocker.clone())
                {
                    kept.push(blocker);
                }
            }
            frontmatter::update_blocked_by(content, &kept).map(String::into_bytes)
        })?;

        outcome.warnings.extend(self.finish_mutation(&path));
        Ok(outcome)
    }

    /// Ids of every ticket file currently in the directory, sorted.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let files = cache::list_ticket_files(self.fs.as_ref(), &self.dir)?;
        Ok(files
            .iter()
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect())
    }

    fn require<'m>(&self, ticket_id: &str, map: &'m SummaryMap) -> Result<&'m Summary> {
        match map.get(ticket_id) {
            Some(s) => Ok(s),
            // Present on disk but absent from the snapshot means the file
            // failed to parse; surface that instead of "not found".
            None if self.exists(ticket_id)? => {
                Err(self.parse_summary(ticket_id).err().unwrap_or_else(|| {
                    TickError::TicketNotFound(ticket_id.to_string())
                }))
            }
            None => Err(TickError::TicketNotFound(ticket_id.to_string())),
        }
    }

    /// Write-through step after a successful file mutation. Runs outside the
    /// ticket lock; concurrent writers race and the last one wins, which
    /// directory-mtime reconciliation repairs before any query trusts the
    /// cache. Failures are warnings because the file write already happened.
    fn finish_mutation(&self, path: &Path) -> Vec<String> {
        let mut warnings = Vec::new();
        match self.cache.parse_entry(path) {
            Ok(entry) => {
                if let Err(e) = self.cache.update_entry(&self.locks, entry) {
                    warnings.push(format!("cache update failed: {e}"));
                }
            }
            Err(w) => warnings.push(w),
        }
        warnings
    }
}

fn as_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|_| TickError::MalformedFrontmatter("ticket file is not valid UTF-8".to_string()))
}

fn wrong_state(current: &Summary, expected: &'static str) -> TickError {
    TickError::WrongState {
        id: current.id.clone(),
        actual: current.status.to_string(),
        expected,
    }
}

/// Render a new ticket file. Field order matches the documented layout:
/// schema_version, id, status, created, type, priority, then the optional
/// assignee/parent, then blocked-by.
fn render_ticket(ticket: &NewTicket, blockers: &[String], ticket_id: &str, created: &str) -> String {
    let mut lines = vec![
        "---".to_string(),
        format!("schema_version: {}", crate::types::SCHEMA_VERSION),
        format!("id: {ticket_id}"),
        "status: open".to_string(),
        format!("created: {created}"),
        format!("type: {}", ticket.ticket_type),
        format!("priority: {}", ticket.priority),
    ];
    if let Some(assignee) = &ticket.assignee {
        lines.push(format!("assignee: {assignee}"));
    }
    if let Some(parent) = &ticket.parent {
        lines.push(format!("parent: {parent}"));
    }
    lines.push(format!(
        "blocked-by: {}",
        frontmatter::format_id_list(blockers)
    ));
    lines.push("---".to_string());
    let header = lines.join("\n");

    let mut sections = vec![format!("# {}", ticket.title.trim())];
    if let Some(description) = &ticket.description {
        sections.push(format!("\n{description}"));
    }
    if let Some(design) = &ticket.design {
        sections.push(format!("\n## Design\n\n{design}"));
    }
    if let Some(acceptance) = &ticket.acceptance {
        sections.push(format!("\n## Acceptance Criteria\n\n{acceptance}"));
    }
    let body = sections.join("\n");

    format!("{header}\n{body}\n")
}
