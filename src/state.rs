//! Ticket state machine and graph rules.
//!
//! Transitions are validated against a snapshot map of every ticket's
//! summary; no object graph crosses ticket boundaries. Cycle detection
//! walks blocker and parent chains with a local visited set.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, TickError};
use crate::types::{Status, Summary};

pub type SummaryMap = HashMap<String, Summary>;

pub fn to_map(summaries: impl IntoIterator<Item = Summary>) -> SummaryMap {
    summaries.into_iter().map(|s| (s.id.clone(), s)).collect()
}

fn wrong_state(t: &Summary, expected: &'static str) -> TickError {
    TickError::WrongState {
        id: t.id.clone(),
        actual: t.status.to_string(),
        expected,
    }
}

/// start: open → in_progress.
///
/// The parent (if any) must itself be started or closed, every direct
/// blocker must be closed, and no blocker of any ancestor may still be open.
pub fn check_start(t: &Summary, map: &SummaryMap) -> Result<()> {
    if t.status != Status::Open {
        return Err(wrong_state(t, "open"));
    }

    if let Some(parent_id) = &t.parent {
        let parent = map
            .get(parent_id)
            .ok_or_else(|| TickError::ParentNotFound(parent_id.clone()))?;
        if parent.status == Status::Open {
            return Err(TickError::ParentNotStarted {
                id: t.id.clone(),
                parent: parent_id.clone(),
            });
        }
    }

    for blocker_id in &t.blocked_by {
        let blocker = map
            .get(blocker_id)
            .ok_or_else(|| TickError::BlockerNotFound(blocker_id.clone()))?;
        if blocker.status != Status::Closed {
            return Err(TickError::BlockerOpen {
                id: t.id.clone(),
                blocker: blocker_id.clone(),
            });
        }
    }

    // Ancestor blockers: walk the parent chain; an open blocker anywhere
    // above keeps the whole subtree from starting.
    let mut visited: HashSet<&str> = HashSet::from([t.id.as_str()]);
    let mut current = t.parent.as_deref();
    while let Some(ancestor_id) = current {
        if !visited.insert(ancestor_id) {
            return Err(TickError::CycleDetected(format!(
                "parent chain of '{}' revisits '{ancestor_id}'",
                t.id
            )));
        }
        let ancestor = map
            .get(ancestor_id)
            .ok_or_else(|| TickError::ParentNotFound(ancestor_id.to_string()))?;
        for blocker_id in &ancestor.blocked_by {
            if map.get(blocker_id).is_some_and(|b| b.status == Status::Open) {
                return Err(TickError::BlockerOpen {
                    id: t.id.clone(),
                    blocker: blocker_id.clone(),
                });
            }
        }
        current = ancestor.parent.as_deref();
    }

    Ok(())
}

/// close: in_progress → closed. Fails while any child is open/in_progress.
pub fn check_close(t: &Summary, map: &SummaryMap) -> Result<()> {
    if t.status != Status::InProgress {
        return Err(wrong_state(t, "in_progress"));
    }

    let mut open_children: Vec<&str> = map
        .values()
        .filter(|c| c.parent.as_deref() == Some(t.id.as_str()) && c.status != Status::Closed)
        .map(|c| c.id.as_str())
        .collect();
    if !open_children.is_empty() {
        open_children.sort_unstable();
        return Err(TickError::OpenChildren {
            id: t.id.clone(),
            children: open_children.join(", "),
        });
    }

    Ok(())
}

/// reopen: closed → open, unless the parent is itself closed.
pub fn check_reopen(t: &Summary, map: &SummaryMap) -> Result<()> {
    if t.status != Status::Closed {
        return Err(wrong_state(t, "closed"));
    }

    if let Some(parent_id) = &t.parent
        && map.get(parent_id).is_some_and(|p| p.status == Status::Closed)
    {
        return Err(TickError::ParentClosed {
            id: t.id.clone(),
            parent: parent_id.clone(),
        });
    }

    Ok(())
}

/// block: append a blocker. The only persistent write that could introduce a
/// blocker cycle, so reverse reachability is verified here: if the blocker
/// can already reach this ticket through its own blockers, refuse.
pub fn check_block(t: &Summary, blocker_id: &str, map: &SummaryMap) -> Result<()> {
    if t.id == blocker_id {
        return Err(TickError::SelfBlock(t.id.clone()));
    }
    if !map.contains_key(blocker_id) {
        return Err(TickError::BlockerNotFound(blocker_id.to_string()));
    }
    if t.blocked_by.iter().any(|b| b == blocker_id) {
        return Err(TickError::AlreadyBlocked {
            id: t.id.clone(),
            blocker: blocker_id.to_string(),
        });
    }

    let mut visited = HashSet::new();
    let mut path = Vec::new();
    if let Some(cycle) = blocker_path_to(blocker_id, &t.id, map, &mut visited, &mut path) {
        return Err(TickError::CycleDetected(format!(
            "{} -> {}",
            t.id,
            cycle.join(" -> ")
        )));
    }

    Ok(())
}

/// DFS from `current` along blocker edges looking for `target`; returns the
/// path when found.
fn blocker_path_to(
    current: &str,
    target: &str,
    map: &SummaryMap,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    if current == target {
        path.push(current.to_string());
        return Some(path.clone());
    }
    if !visited.insert(current.to_string()) {
        return None;
    }
    path.push(current.to_string());

    if let Some(ticket) = map.get(current) {
        for dep in &ticket.blocked_by {
            if let Some(found) = blocker_path_to(dep, target, map, visited, path) {
                return Some(found);
            }
        }
    }

    path.pop();
    None
}

/// unblock: remove a blocker that is currently listed.
pub fn check_unblock(t: &Summary, blocker_id: &str) -> Result<()> {
    if !t.blocked_by.iter().any(|b| b == blocker_id) {
        return Err(TickError::NotBlocked {
            id: t.id.clone(),
            blocker: blocker_id.to_string(),
        });
    }
    Ok(())
}

/// Ready: open, parent closed/in_progress/absent, every blocker closed.
/// A blocker missing from the map counts as not closed.
pub fn is_ready(t: &Summary, map: &SummaryMap) -> bool {
    if t.status != Status::Open {
        return false;
    }
    if let Some(parent_id) = &t.parent {
        match map.get(parent_id) {
            Some(p) if p.status != Status::Open => {}
            _ => return false,
        }
    }
    t.blocked_by
        .iter()
        .all(|b| map.get(b).is_some_and(|s| s.status == Status::Closed))
}
