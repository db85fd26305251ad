use super::CommandOutput;
use crate::error::Result;
use crate::query;
use crate::store::TicketStore;

/// Print a ticket file verbatim.
pub fn cmd_show(store: &TicketStore, ticket_id: &str) -> Result<CommandOutput> {
    let content = query::show(store, ticket_id)?;
    Ok(CommandOutput {
        stdout: content,
        warnings: Vec::new(),
    })
}
