//! Reference-model oracle: an in-memory model performs the same operations
//! as the store; after every operation the on-disk state must match the
//! model exactly, and the global invariants must hold.

mod common;

use std::collections::HashMap;

use common::{assert_invariants, summaries_on_disk};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tick::types::{Priority, Status, TicketType};
use tick::{NewTicket, TicketStore};

#[derive(Debug, Clone, PartialEq)]
struct ModelTicket {
    status: Status,
    priority: Priority,
    ticket_type: TicketType,
    blocked_by: Vec<String>,
    assignee: String,
    title: String,
    closed_present: bool,
    parent: Option<String>,
}

#[derive(Debug, Default)]
struct Model {
    tickets: HashMap<String, ModelTicket>,
}

impl Model {
    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tickets.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn assert_matches_disk(&self, dir: &std::path::Path) {
        let disk = summaries_on_disk(dir);
        let mut disk_ids: Vec<&String> = disk.keys().collect();
        disk_ids.sort();
        let model_ids = self.ids();
        assert_eq!(
            disk_ids,
            model_ids.iter().collect::<Vec<_>>(),
            "id sets diverged"
        );

        for (ticket_id, expected) in &self.tickets {
            let actual = &disk[ticket_id];
            assert_eq!(actual.status, expected.status, "{ticket_id}: status");
            assert_eq!(actual.priority, expected.priority, "{ticket_id}: priority");
            assert_eq!(
                actual.ticket_type, expected.ticket_type,
                "{ticket_id}: type"
            );
            assert_eq!(actual.assignee, expected.assignee, "{ticket_id}: assignee");
            assert_eq!(actual.title, expected.title, "{ticket_id}: title");
            assert_eq!(
                !actual.closed.is_empty(),
                expected.closed_present,
                "{ticket_id}: closed"
            );
            assert_eq!(actual.parent, expected.parent, "{ticket_id}: parent");

            let mut actual_blockers = actual.blocked_by.clone();
            actual_blockers.sort();
            let mut expected_blockers = expected.blocked_by.clone();
            expected_blockers.sort();
            assert_eq!(
                actual_blockers, expected_blockers,
                "{ticket_id}: blocked_by"
            );
        }
    }
}

fn pick(rng: &mut StdRng, ids: &[String]) -> Option<String> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[rng.random_range(0..ids.len())].clone())
    }
}

fn run_oracle(seed: u64, operations: usize) {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = TicketStore::open(tmp.path());
    let mut model = Model::default();
    let mut rng = StdRng::seed_from_u64(seed);

    for step in 0..operations {
        let ids = model.ids();
        match rng.random_range(0..6u8) {
            // create
            0 => {
                let mut ticket = NewTicket::new(format!("Fuzz ticket {seed}-{step}"));
                ticket.priority = Priority::from_num(rng.random_range(1..=4)).unwrap();
                if rng.random_range(0..3u8) == 0
                    && let Some(parent) = pick(&mut rng, &ids)
                {
                    ticket.parent = Some(parent);
                }
                match store.create(&ticket) {
                    Ok((ticket_id, _, _)) => {
                        model.tickets.insert(
                            ticket_id,
                            ModelTicket {
                                status: Status::Open,
                                priority: ticket.priority,
                                ticket_type: ticket.ticket_type,
                                blocked_by: vec![],
                                assignee: String::new(),
                                title: ticket.title.clone(),
                                closed_present: false,
                                parent: ticket.parent.clone(),
                            },
                        );
                    }
                    Err(_) => { /* model unchanged */ }
                }
            }
            // start
            1 => {
                if let Some(ticket_id) = pick(&mut rng, &ids)
                    && store.start(&ticket_id).is_ok()
                {
                    model.tickets.get_mut(&ticket_id).unwrap().status = Status::InProgress;
                }
            }
            // close
            2 => {
                if let Some(ticket_id) = pick(&mut rng, &ids)
                    && store.close(&ticket_id).is_ok()
                {
                    let ticket = model.tickets.get_mut(&ticket_id).unwrap();
                    ticket.status = Status::Closed;
                    ticket.closed_present = true;
                }
            }
            // reopen
            3 => {
                if let Some(ticket_id) = pick(&mut rng, &ids)
                    && store.reopen(&ticket_id).is_ok()
                {
                    let ticket = model.tickets.get_mut(&ticket_id).unwrap();
                    ticket.status = Status::Open;
                    ticket.closed_present = false;
                }
            }
            // block
            4 => {
                if let (Some(ticket_id), Some(blocker)) =
                    (pick(&mut rng, &ids), pick(&mut rng, &ids))
                    && store.block(&ticket_id, &blocker).is_ok()
                {
                    model
                        .tickets
                        .get_mut(&ticket_id)
                        .unwrap()
                        .blocked_by
                        .push(blocker);
                }
            }
            // unblock
            _ => {
                if let (Some(ticket_id), Some(blocker)) =
                    (pick(&mut rng, &ids), pick(&mut rng, &ids))
                    && store.unblock(&ticket_id, &blocker).is_ok()
                {
                    model
                        .tickets
                        .get_mut(&ticket_id)
                        .unwrap()
                        .blocked_by
                        .retain(|b| b != &blocker);
                }
            }
        }

        model.assert_matches_disk(tmp.path());
        assert_invariants(tmp.path());
    }
}

#[test]
fn oracle_seed_1() {
    run_oracle(1, 60);
}

#[test]
fn oracle_seed_2() {
    run_oracle(2, 60);
}

#[test]
fn oracle_seed_3() {
    run_oracle(3, 60);
}
