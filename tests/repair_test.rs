mod common;

use common::{assert_invariants, create, fresh_store};
use tick::commands::{RepairTarget, cmd_repair};
use tick::frontmatter;

/// Hand-edit a ticket's blocker list, the way a human with an editor would.
fn write_blockers(store: &tick::TicketStore, ticket_id: &str, blockers: &[&str]) {
    let content = store.read_ticket(ticket_id).unwrap();
    let blockers: Vec<String> = blockers.iter().map(|s| s.to_string()).collect();
    let content = frontmatter::update_blocked_by(&content, &blockers).unwrap();
    std::fs::write(store.path(ticket_id), content).unwrap();
}

#[test]
fn repair_removes_stale_blocker_then_reports_nothing() {
    let (tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");
    write_blockers(&store, &a, &["nonexistent"]);

    let out = cmd_repair(&store, RepairTarget::One(a.clone()), false).unwrap();
    assert_eq!(out.stdout, "Removed stale blocker: nonexistent\n");
    assert!(store.parse_summary(&a).unwrap().blocked_by.is_empty());
    assert!(
        store.read_ticket(&a).unwrap().contains("blocked-by: []"),
        "list should render empty"
    );

    let out = cmd_repair(&store, RepairTarget::One(a), false).unwrap();
    assert_eq!(out.stdout, "Nothing to repair\n");

    assert_invariants(tmp.path());
}

#[test]
fn repair_keeps_live_blockers() {
    let (tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");
    let b = create(&store, "Ticket B");
    write_blockers(&store, &a, &[b.as_str(), "gone gone", b.as_str()]);

    let out = cmd_repair(&store, RepairTarget::One(a.clone()), false).unwrap();
    // The stale entry and the duplicate go; the live blocker stays.
    assert!(out.stdout.contains("Removed stale blocker: gone gone"));
    assert!(out.stdout.contains(&format!("Removed stale blocker: {b}")));
    assert_eq!(store.parse_summary(&a).unwrap().blocked_by, vec![b]);

    assert_invariants(tmp.path());
}

#[test]
fn repair_dry_run_is_read_only() {
    let (_tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");
    write_blockers(&store, &a, &["nonexistent"]);
    let before = store.read_ticket(&a).unwrap();

    let out = cmd_repair(&store, RepairTarget::One(a.clone()), true).unwrap();
    assert_eq!(out.stdout, "Would remove stale blocker: nonexistent\n");
    assert_eq!(store.read_ticket(&a).unwrap(), before);
}

#[test]
fn repair_all_sweeps_every_ticket() {
    let (tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");
    let b = create(&store, "Ticket B");
    write_blockers(&store, &a, &["missing"]);
    write_blockers(&store, &b, &[b.as_str()]);

    let out = cmd_repair(&store, RepairTarget::All, false).unwrap();
    assert!(out.stdout.contains(&format!("{a}: Removed stale blocker: missing")));
    assert!(out.stdout.contains(&format!("{b}: Removed stale blocker: {b}")));

    let out = cmd_repair(&store, RepairTarget::All, false).unwrap();
    assert_eq!(out.stdout, "Nothing to repair\n");

    assert_invariants(tmp.path());
}

#[test]
fn repair_all_survives_a_corrupt_ticket() {
    let (_tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");
    write_blockers(&store, &a, &["missing"]);
    std::fs::write(store.dir().join("broken0.md"), "not a ticket").unwrap();

    let out = cmd_repair(&store, RepairTarget::All, false).unwrap();
    assert!(out.stdout.contains("Removed stale blocker: missing"));
    assert!(out.has_warnings());
    assert!(out.warnings.iter().any(|w| w.contains("broken0")));
}

#[test]
fn rebuild_cache_round_trip() {
    let (_tmp, store) = fresh_store();
    create(&store, "Ticket A");
    create(&store, "Ticket B");
    std::fs::remove_file(store.cache().path()).unwrap();

    let out = cmd_repair(&store, RepairTarget::RebuildCache, false).unwrap();
    assert_eq!(out.stdout, "Rebuilt cache with 2 entries\n");

    // Rebuilding again produces a byte-identical cache file.
    let first = std::fs::read(store.cache().path()).unwrap();
    cmd_repair(&store, RepairTarget::RebuildCache, false).unwrap();
    let second = std::fs::read(store.cache().path()).unwrap();
    assert_eq!(first, second);
}
