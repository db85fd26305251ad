use std::path::PathBuf;
use std::str::FromStr;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::commands::{
    CommandOutput, CreateOptions, LsOptions, RepairTarget, cmd_block, cmd_close, cmd_create,
    cmd_ls, cmd_print_config, cmd_ready, cmd_reopen, cmd_repair, cmd_show, cmd_start, cmd_unblock,
};
use crate::config::Config;
use crate::error::Result;
use crate::id;
use crate::store::TicketStore;
use crate::types::{DEFAULT_PRIORITY_STR, Priority, Status, TicketType};

#[derive(Parser)]
#[command(name = "tick")]
#[command(about = "File-backed ticket tracking")]
#[command(version)]
pub struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long = "cwd", global = true, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Explicit config file
    #[arg(short = 'c', long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ticket directory (overrides config)
    #[arg(long = "ticket-dir", global = true, value_name = "DIR")]
    pub ticket_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new ticket
    Create {
        /// Ticket title
        title: String,

        /// Description text
        #[arg(short = 'd', long)]
        description: Option<String>,

        /// Design notes
        #[arg(long)]
        design: Option<String>,

        /// Acceptance criteria
        #[arg(long)]
        acceptance: Option<String>,

        /// Type: bug, feature, task, epic, chore (default: task)
        #[arg(short = 't', long = "type", default_value = "task", value_parser = parse_type)]
        ticket_type: TicketType,

        /// Priority (1-4, 1 most urgent, default: 2)
        #[arg(short = 'p', long, default_value = DEFAULT_PRIORITY_STR, value_parser = parse_priority)]
        priority: Priority,

        /// Assignee
        #[arg(short = 'a', long)]
        assignee: Option<String>,

        /// Parent ticket id
        #[arg(long, value_parser = parse_id)]
        parent: Option<String>,

        /// Blocker ticket id (repeatable)
        #[arg(long = "blocked-by", value_parser = parse_id)]
        blocked_by: Vec<String>,
    },

    /// Print a ticket file verbatim
    Show {
        /// Ticket id
        #[arg(value_parser = parse_id)]
        id: String,
    },

    /// List tickets
    Ls {
        /// Filter by status: open, in_progress, closed
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,

        /// Filter by priority (1-4)
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,

        /// Filter by type
        #[arg(long = "type", value_parser = parse_type)]
        ticket_type: Option<TicketType>,

        /// Maximum number of rows
        #[arg(long)]
        limit: Option<usize>,

        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// List tickets that are ready to start
    Ready,

    /// Mark a ticket in_progress
    Start {
        #[arg(value_parser = parse_id)]
        id: String,
    },

    /// Close an in_progress ticket
    Close {
        #[arg(value_parser = parse_id)]
        id: String,
    },

    /// Reopen a closed ticket
    Reopen {
        #[arg(value_parser = parse_id)]
        id: String,
    },

    /// Add a blocker to a ticket
    Block {
        #[arg(value_parser = parse_id)]
        id: String,

        #[arg(value_parser = parse_id)]
        blocker: String,
    },

    /// Remove a blocker from a ticket
    Unblock {
        #[arg(value_parser = parse_id)]
        id: String,

        #[arg(value_parser = parse_id)]
        blocker: String,
    },

    /// Remove stale blockers; rebuild the cache
    Repair {
        /// Ticket id to repair
        #[arg(value_parser = parse_id, required_unless_present_any = ["all", "rebuild_cache"])]
        id: Option<String>,

        /// Repair every ticket
        #[arg(long, conflicts_with = "id")]
        all: bool,

        /// Rebuild the summary cache
        #[arg(long, conflicts_with_all = ["id", "all"])]
        rebuild_cache: bool,

        /// Report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the resolved configuration
    PrintConfig,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_status(s: &str) -> std::result::Result<Status, String> {
    Status::from_str(s).map_err(|e| e.to_string())
}

fn parse_type(s: &str) -> std::result::Result<TicketType, String> {
    TicketType::from_str(s).map_err(|e| e.to_string())
}

fn parse_priority(s: &str) -> std::result::Result<Priority, String> {
    Priority::from_str(s).map_err(|e| e.to_string())
}

fn parse_id(s: &str) -> std::result::Result<String, String> {
    id::validate_id(s)
        .map(|()| s.to_string())
        .map_err(|e| e.to_string())
}

impl Cli {
    /// Resolve configuration, build the store, and dispatch the command.
    pub fn run(self) -> Result<CommandOutput> {
        let config = Config::resolve(
            self.cwd.as_deref(),
            self.config.as_deref(),
            self.ticket_dir.as_deref(),
        )?;

        match self.command {
            Commands::PrintConfig => cmd_print_config(&config),
            Commands::Completions { shell } => {
                let mut buf = Vec::new();
                clap_complete::generate(shell, &mut Cli::command(), "tick", &mut buf);
                Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&buf).into_owned(),
                    warnings: Vec::new(),
                })
            }
            command => {
                let store = TicketStore::open(&config.ticket_dir);
                dispatch(&store, command)
            }
        }
    }
}

fn dispatch(store: &TicketStore, command: Commands) -> Result<CommandOutput> {
    match command {
        Commands::Create {
            title,
            description,
            design,
            acceptance,
            ticket_type,
            priority,
            assignee,
            parent,
            blocked_by,
        } => cmd_create(
            store,
            CreateOptions {
                title,
                description,
                design,
                acceptance,
                ticket_type,
                priority,
                assignee,
                parent,
                blocked_by,
            },
        ),
        Commands::Show { id } => cmd_show(store, &id),
        Commands::Ls {
            status,
            priority,
            ticket_type,
            limit,
            offset,
        } => cmd_ls(
            store,
            LsOptions {
                status,
                priority,
                ticket_type,
                limit,
                offset,
            },
        ),
        Commands::Ready => cmd_ready(store),
        Commands::Start { id } => cmd_start(store, &id),
        Commands::Close { id } => cmd_close(store, &id),
        Commands::Reopen { id } => cmd_reopen(store, &id),
        Commands::Block { id, blocker } => cmd_block(store, &id, &blocker),
        Commands::Unblock { id, blocker } => cmd_unblock(store, &id, &blocker),
        Commands::Repair {
            id,
            all,
            rebuild_cache,
            dry_run,
        } => {
            let target = if rebuild_cache {
                RepairTarget::RebuildCache
            } else if all {
                RepairTarget::All
            } else {
                // clap enforces that `id` is present when neither flag is.
                RepairTarget::One(id.expect("repair target"))
            };
            cmd_repair(store, target, dry_run)
        }
        Commands::PrintConfig | Commands::Completions { .. } => unreachable!("handled in run"),
    }
}
