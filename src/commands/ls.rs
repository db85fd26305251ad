use super::{CommandOutput, format_summary_line};
use crate::error::Result;
use crate::query::{self, ListFilter};
use crate::store::TicketStore;
use crate::types::{Priority, Status, TicketType};

#[derive(Debug, Default, Clone, Copy)]
pub struct LsOptions {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub ticket_type: Option<TicketType>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// List tickets, filtered and sorted by id.
pub fn cmd_ls(store: &TicketStore, opts: LsOptions) -> Result<CommandOutput> {
    let filter = ListFilter {
        status: opts.status,
        priority: opts.priority,
        ticket_type: opts.ticket_type,
        limit: opts.limit,
        offset: opts.offset,
    };
    let (summaries, warnings) = query::list(store, &filter)?;

    let mut out = CommandOutput::new().with_warnings(warnings);
    for summary in &summaries {
        out.push_line(format_summary_line(summary));
    }
    Ok(out)
}
