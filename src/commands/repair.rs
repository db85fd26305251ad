use super::CommandOutput;
use crate::error::Result;
use crate::store::TicketStore;

/// What `repair` operates on.
#[derive(Debug, Clone)]
pub enum RepairTarget {
    /// One ticket's blocker list.
    One(String),
    /// Every ticket in the directory.
    All,
    /// Throw away and rebuild the summary cache.
    RebuildCache,
}

/// Remove stale blockers and/or rebuild the cache.
pub fn cmd_repair(store: &TicketStore, target: RepairTarget, dry_run: bool) -> Result<CommandOutput> {
    let mut out = CommandOutput::new();
    let verb = if dry_run { "Would remove" } else { "Removed" };

    match target {
        RepairTarget::One(ticket_id) => {
            let outcome = store.repair_ticket(&ticket_id, dry_run)?;
            out.warnings.extend(outcome.warnings);
            for blocker in &outcome.removed {
                out.push_line(format!("{verb} stale blocker: {blocker}"));
            }
            if outcome.removed.is_empty() {
                out.push_line("Nothing to repair");
            }
        }
        RepairTarget::All => {
            let mut repaired_any = false;
            for ticket_id in store.list_ids()? {
                match store.repair_ticket(&ticket_id, dry_run) {
                    Ok(outcome) => {
                        out.warnings.extend(outcome.warnings);
                        for blocker in &outcome.removed {
                            repaired_any = true;
                            out.push_line(format!("{ticket_id}: {verb} stale blocker: {blocker}"));
                        }
                    }
                    // A broken file must not stop the sweep.
                    Err(e) => out.warnings.push(format!("{ticket_id}: {e}")),
                }
            }
            if !repaired_any {
                out.push_line("Nothing to repair");
            }
        }
        RepairTarget::RebuildCache => {
            if dry_run {
                out.push_line("Would rebuild cache");
            } else {
                let (entries, warnings) = store.cache().rebuild(store.locks())?;
                out.warnings.extend(warnings);
                out.push_line(format!("Rebuilt cache with {} entries", entries.len()));
            }
        }
    }

    Ok(out)
}
