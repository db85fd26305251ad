use super::CommandOutput;
use crate::error::Result;
use crate::store::TicketStore;

fn transition(
    warnings: Vec<String>,
    ticket_id: &str,
    verb: &str,
) -> CommandOutput {
    let mut out = CommandOutput::new().with_warnings(warnings);
    out.push_line(format!("{verb} {ticket_id}"));
    out
}

/// open → in_progress.
pub fn cmd_start(store: &TicketStore, ticket_id: &str) -> Result<CommandOutput> {
    let warnings = store.start(ticket_id)?;
    Ok(transition(warnings, ticket_id, "Started"))
}

/// in_progress → closed.
pub fn cmd_close(store: &TicketStore, ticket_id: &str) -> Result<CommandOutput> {
    let warnings = store.close(ticket_id)?;
    Ok(transition(warnings, ticket_id, "Closed"))
}

/// closed → open.
pub fn cmd_reopen(store: &TicketStore, ticket_id: &str) -> Result<CommandOutput> {
    let warnings = store.reopen(ticket_id)?;
    Ok(transition(warnings, ticket_id, "Reopened"))
}
