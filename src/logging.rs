//! Tracing subscriber setup.
//!
//! Diagnostics go to stderr and are filtered by the `TICK_LOG` environment
//! variable (`TICK_LOG=debug tick ls`). User-facing warnings do not go
//! through here; they use the `warning:` stderr channel so they survive
//! redirection of the log.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "TICK_LOG";

pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    // try_init so tests calling init twice stay quiet.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
