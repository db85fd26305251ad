//! Query engine: `list`, `ready`, and `show` over the reconciled cache.
//!
//! Queries never mutate tickets; they reconcile the cache against the
//! directory first and then work on the in-memory snapshot. A single
//! corrupt ticket degrades to a per-entry warning, never an aborted query.

use crate::error::Result;
use crate::state;
use crate::store::TicketStore;
use crate::types::{Priority, Status, Summary, TicketType};

#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub ticket_type: Option<TicketType>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListFilter {
    fn matches(&self, summary: &Summary) -> bool {
        self.status.is_none_or(|s| summary.status == s)
            && self.priority.is_none_or(|p| summary.priority == p)
            && self.ticket_type.is_none_or(|t| summary.ticket_type == t)
    }
}

/// Filtered listing, sorted by id ascending, paginated.
pub fn list(store: &TicketStore, filter: &ListFilter) -> Result<(Vec<Summary>, Vec<String>)> {
    let (entries, warnings) = store.cache().reconcile(store.locks())?;

    let mut summaries: Vec<Summary> = entries
        .into_iter()
        .map(|e| e.summary)
        .filter(|s| filter.matches(s))
        .collect();
    summaries.sort_by(|a, b| a.id.cmp(&b.id));

    let page: Vec<Summary> = summaries
        .into_iter()
        .skip(filter.offset)
        .take(filter.limit.unwrap_or(usize::MAX))
        .collect();
    Ok((page, warnings))
}

/// Ready tickets: open, unblocked, parent started or absent. Sorted by
/// priority ascending (most urgent first), then id.
pub fn ready(store: &TicketStore) -> Result<(Vec<Summary>, Vec<String>)> {
    let (entries, warnings) = store.cache().reconcile(store.locks())?;
    let map = state::to_map(entries.into_iter().map(|e| e.summary));

    let mut out: Vec<Summary> = map
        .values()
        .filter(|s| state::is_ready(s, &map))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
    Ok((out, warnings))
}

/// Full file contents, verbatim.
pub fn show(store: &TicketStore, ticket_id: &str) -> Result<String> {
    crate::id::validate_id(ticket_id)?;
    store.read_ticket(ticket_id)
}
