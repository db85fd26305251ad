//! Command implementations.
//!
//! Each `cmd_*` function performs one command against a [`TicketStore`] and
//! returns a [`CommandOutput`]: the stdout text to print on success plus any
//! warnings collected along the way. Stdout is held in memory until the
//! command succeeds so an error never leaves partial results on stdout;
//! warnings are the caller's to print on stderr (and they force exit 1).

mod block;
mod config;
mod create;
mod ls;
mod ready;
mod repair;
mod show;
mod status;

pub use block::{cmd_block, cmd_unblock};
pub use config::cmd_print_config;
pub use create::{CreateOptions, cmd_create};
pub use ls::{LsOptions, cmd_ls};
pub use ready::cmd_ready;
pub use repair::{RepairTarget, cmd_repair};
pub use show::cmd_show;
pub use status::{cmd_close, cmd_reopen, cmd_start};

use std::fmt::Write as _;

use crate::error::{Result, TickError};
use crate::types::Summary;

/// Buffered command result: stdout text plus warnings.
#[derive(Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub warnings: Vec<String>,
}

impl CommandOutput {
    pub fn new() -> Self {
        CommandOutput::default()
    }

    pub fn push_line(&mut self, line: impl std::fmt::Display) {
        // Writing to a String cannot fail.
        let _ = writeln!(self.stdout, "{line}");
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// True when the command should exit non-zero despite succeeding.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// One listing line: id, status, type, priority, title.
pub fn format_summary_line(summary: &Summary) -> String {
    format!(
        "{:<10}  {:<11}  {:<7}  p{}  {}",
        summary.id,
        summary.status.to_string(),
        summary.ticket_type.to_string(),
        summary.priority,
        summary.title
    )
}

/// Reject explicitly-passed-but-empty flag values.
pub(crate) fn require_non_empty(flag: &'static str, value: &Option<String>) -> Result<()> {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        return Err(TickError::EmptyFlag(flag));
    }
    Ok(())
}
