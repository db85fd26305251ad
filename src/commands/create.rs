use super::{CommandOutput, require_non_empty};
use crate::error::Result;
use crate::store::TicketStore;
use crate::types::{NewTicket, Priority, TicketType};

/// Options for the `create` command, bundling all flags.
#[derive(Debug, Default)]
pub struct CreateOptions {
    pub title: String,
    pub description: Option<String>,
    pub design: Option<String>,
    pub acceptance: Option<String>,
    pub ticket_type: TicketType,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub parent: Option<String>,
    pub blocked_by: Vec<String>,
}

/// Create a ticket and print its id.
pub fn cmd_create(store: &TicketStore, opts: CreateOptions) -> Result<CommandOutput> {
    require_non_empty("--description", &opts.description)?;
    require_non_empty("--design", &opts.design)?;
    require_non_empty("--acceptance", &opts.acceptance)?;
    require_non_empty("--assignee", &opts.assignee)?;

    let ticket = NewTicket {
        title: opts.title,
        description: opts.description,
        design: opts.design,
        acceptance: opts.acceptance,
        ticket_type: opts.ticket_type,
        priority: opts.priority,
        assignee: opts.assignee,
        parent: opts.parent,
        blocked_by: opts.blocked_by,
    };

    let (ticket_id, _path, warnings) = store.create(&ticket)?;

    let mut out = CommandOutput::new().with_warnings(warnings);
    out.push_line(ticket_id);
    Ok(out)
}
