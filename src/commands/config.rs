use super::CommandOutput;
use crate::config::Config;
use crate::error::Result;

/// Print the resolved configuration.
pub fn cmd_print_config(config: &Config) -> Result<CommandOutput> {
    let mut out = CommandOutput::new();
    out.push_line(config.render());
    Ok(out)
}
