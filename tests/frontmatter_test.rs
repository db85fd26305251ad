mod common;

use common::{create, fresh_store};

/// Unknown frontmatter fields must survive every mutation untouched.
#[test]
fn unknown_fields_survive_mutations() {
    let (_tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");
    let b = create(&store, "Ticket B");

    // Plant unknown fields the way an external tool might.
    let content = store.read_ticket(&a).unwrap();
    let content = content.replace(
        "blocked-by: []",
        "x-external-ref: JIRA-123\nblocked-by: []\nx-notes:   spaced   value ",
    );
    std::fs::write(store.path(&a), &content).unwrap();

    store.start(&a).unwrap();
    store.block(&a, &b).unwrap();
    store.unblock(&a, &b).unwrap();
    store.start(&b).unwrap();
    store.close(&b).unwrap();
    store.block(&a, &b).unwrap();
    store.close(&a).unwrap();
    store.reopen(&a).unwrap();

    let survived = store.read_ticket(&a).unwrap();
    assert!(survived.contains("x-external-ref: JIRA-123\n"));
    assert!(survived.contains("x-notes:   spaced   value \n"));

    // Field order is intact: the unknown key still sits above blocked-by.
    let external = survived.find("x-external-ref").unwrap();
    let blocked = survived.find("blocked-by").unwrap();
    assert!(external < blocked);
}

#[test]
fn mutation_only_rewrites_the_target_line() {
    let (_tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");

    let before = store.read_ticket(&a).unwrap();
    store.start(&a).unwrap();
    let after = store.read_ticket(&a).unwrap();

    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();
    assert_eq!(before_lines.len(), after_lines.len());

    let diffs: Vec<(usize, &&str, &&str)> = before_lines
        .iter()
        .zip(after_lines.iter())
        .enumerate()
        .filter_map(|(i, (b, a))| (b != a).then_some((i, b, a)))
        .collect();
    assert_eq!(diffs.len(), 1, "exactly one line should change");
    assert_eq!(*diffs[0].1, "status: open");
    assert_eq!(*diffs[0].2, "status: in_progress");
}

#[test]
fn crlf_free_lf_output() {
    let (_tmp, store) = fresh_store();
    let a = create(&store, "Ticket A");
    let content = store.read_ticket(&a).unwrap();
    assert!(!content.contains('\r'));
    assert!(content.ends_with('\n'));
}
