//! Universal invariants over scripted command sequences.

mod common;

use common::{assert_invariants, create, create_child, fresh_store};
use tick::commands::{LsOptions, RepairTarget, cmd_ls, cmd_ready, cmd_repair};

#[test]
fn invariants_hold_through_a_working_session() {
    let (tmp, store) = fresh_store();

    // Build a small project: an epic with two children, one blocked.
    let epic = create(&store, "Ship the feature");
    let api = create_child(&store, "API surface", &epic);
    let docs = create_child(&store, "Write docs", &epic);
    store.block(&docs, &api).unwrap();
    assert_invariants(tmp.path());

    store.start(&epic).unwrap();
    store.start(&api).unwrap();
    assert_invariants(tmp.path());

    // Work through it in dependency order.
    store.close(&api).unwrap();
    store.start(&docs).unwrap();
    store.close(&docs).unwrap();
    store.close(&epic).unwrap();
    assert_invariants(tmp.path());

    // Reopen part of the tree and converge again.
    store.reopen(&epic).unwrap();
    store.reopen(&docs).unwrap();
    store.start(&docs).unwrap();
    store.close(&docs).unwrap();
    store.close(&epic).unwrap();
    assert_invariants(tmp.path());
}

#[test]
fn directory_contains_only_known_artifacts() {
    let (tmp, store) = fresh_store();
    let a = create(&store, "Only artifact");
    store.start(&a).unwrap();
    cmd_ls(&store, LsOptions::default()).unwrap();
    cmd_ready(&store).unwrap();
    cmd_repair(&store, RepairTarget::All, false).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![".cache.bin".to_string(), ".locks".to_string(), format!("{a}.md")]
    );
}

#[test]
fn failed_commands_produce_no_stdout() {
    let (tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");

    // Every failing command returns an error without any buffered stdout
    // having escaped: the CommandOutput is never constructed on failure.
    assert!(tick::commands::cmd_show(&store, "zzzzzz9").is_err());
    assert!(tick::commands::cmd_close(&store, &a).is_err());
    assert!(tick::commands::cmd_block(&store, &a, &a).is_err());
    assert!(
        tick::commands::cmd_repair(&store, RepairTarget::One("zzzzzz9".to_string()), false)
            .is_err()
    );

    // And the failures left the directory untouched.
    assert_invariants(tmp.path());
}

#[test]
fn ls_and_ready_agree_with_disk_after_mixed_operations() {
    let (tmp, store) = fresh_store();
    let a = create(&store, "Open one");
    let b = create(&store, "Worked one");
    let c = create(&store, "Finished one");
    store.start(&b).unwrap();
    store.start(&c).unwrap();
    store.close(&c).unwrap();

    let out = cmd_ls(&store, LsOptions::default()).unwrap();
    assert_eq!(out.stdout.lines().count(), 3);

    let ready = cmd_ready(&store).unwrap();
    let ready_lines: Vec<&str> = ready.stdout.lines().collect();
    assert_eq!(ready_lines.len(), 1);
    assert!(ready_lines[0].starts_with(&a));

    let disk = common::summaries_on_disk(tmp.path());
    assert_eq!(disk.len(), 3);
    assert_eq!(disk[&b].status, tick::Status::InProgress);
    assert_invariants(tmp.path());
}
