use super::CommandOutput;
use crate::error::Result;
use crate::store::TicketStore;

/// Append a blocker to a ticket.
pub fn cmd_block(store: &TicketStore, ticket_id: &str, blocker_id: &str) -> Result<CommandOutput> {
    let warnings = store.block(ticket_id, blocker_id)?;
    let mut out = CommandOutput::new().with_warnings(warnings);
    out.push_line(format!("Blocked {ticket_id} by {blocker_id}"));
    Ok(out)
}

/// Remove a blocker from a ticket.
pub fn cmd_unblock(
    store: &TicketStore,
    ticket_id: &str,
    blocker_id: &str,
) -> Result<CommandOutput> {
    let warnings = store.unblock(ticket_id, blocker_id)?;
    let mut out = CommandOutput::new().with_warnings(warnings);
    out.push_line(format!("Unblocked {ticket_id} from {blocker_id}"));
    Ok(out)
}
