//! Shared helpers for the integration suites.

// Not every suite uses every helper.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tick::frontmatter;
use tick::types::{Status, Summary};
use tick::{NewTicket, TicketStore};

/// A store over a fresh temp directory.
pub fn fresh_store() -> (tempfile::TempDir, TicketStore) {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = TicketStore::open(tmp.path());
    (tmp, store)
}

pub fn create(store: &TicketStore, title: &str) -> String {
    store.create(&NewTicket::new(title)).unwrap().0
}

pub fn create_child(store: &TicketStore, title: &str, parent: &str) -> String {
    let mut ticket = NewTicket::new(title);
    ticket.parent = Some(parent.to_string());
    store.create(&ticket).unwrap().0
}

/// Parse every ticket file in the directory directly from disk.
pub fn summaries_on_disk(dir: &Path) -> HashMap<String, Summary> {
    let mut out = HashMap::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|e| e == "md") {
            let content = std::fs::read_to_string(&path).unwrap();
            let summary = frontmatter::parse_summary(&content)
                .unwrap_or_else(|e| panic!("{} failed to parse: {e}", path.display()));
            out.insert(summary.id.clone(), summary);
        }
    }
    out
}

/// Assert every on-disk invariant from the data model.
pub fn assert_invariants(dir: &Path) {
    let summaries = summaries_on_disk(dir);

    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        // Directory contains only ticket files, the cache, and .locks.
        if path.is_dir() {
            assert_eq!(name, ".locks", "unexpected directory {name}");
            continue;
        }
        if name == ".cache.bin" {
            continue;
        }
        assert!(name.ends_with(".md"), "unexpected file {name}");

        // id equals basename.
        let stem = name.strip_suffix(".md").unwrap();
        assert!(summaries.contains_key(stem), "{name} did not parse to its id");
    }

    for (ticket_id, summary) in &summaries {
        // closed present iff status closed.
        assert_eq!(
            summary.status == Status::Closed,
            !summary.closed.is_empty(),
            "{ticket_id}: closed field out of sync with status"
        );

        // No duplicate or self-referential blockers.
        let mut seen = HashSet::new();
        for blocker in &summary.blocked_by {
            assert_ne!(blocker, ticket_id, "{ticket_id} blocks itself");
            assert!(seen.insert(blocker), "{ticket_id} lists {blocker} twice");
        }

        if let Some(parent_id) = &summary.parent {
            let parent = summaries
                .get(parent_id)
                .unwrap_or_else(|| panic!("{ticket_id}: parent {parent_id} missing"));
            // Closed parent forces closed child.
            if parent.status == Status::Closed {
                assert_eq!(
                    summary.status,
                    Status::Closed,
                    "{ticket_id} open under closed parent {parent_id}"
                );
            }
        }
    }

    assert_acyclic(&summaries, |s| s.parent.clone().into_iter().collect(), "parent");
    assert_acyclic(&summaries, |s| s.blocked_by.clone(), "blocker");
}

fn assert_acyclic(
    summaries: &HashMap<String, Summary>,
    edges: impl Fn(&Summary) -> Vec<String>,
    graph: &str,
) {
    for start in summaries.keys() {
        let mut visited = HashSet::new();
        let mut stack = vec![start.clone()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(summary) = summaries.get(&current) {
                for next in edges(summary) {
                    assert_ne!(&next, start, "{graph} cycle through {start}");
                    stack.push(next);
                }
            }
        }
    }
}
