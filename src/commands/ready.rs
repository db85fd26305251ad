use super::{CommandOutput, format_summary_line};
use crate::error::Result;
use crate::query;
use crate::store::TicketStore;

/// List ready tickets: open, unblocked, parent started or absent.
pub fn cmd_ready(store: &TicketStore) -> Result<CommandOutput> {
    let (summaries, warnings) = query::ready(store)?;

    let mut out = CommandOutput::new().with_warnings(warnings);
    for summary in &summaries {
        out.push_line(format_summary_line(summary));
    }
    Ok(out)
}
