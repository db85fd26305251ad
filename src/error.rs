use std::path::PathBuf;

use thiserror::Error;

use crate::fs::FsError;

#[derive(Error, Debug)]
pub enum TickError {
    // Input validation
    #[error("ticket title cannot be empty")]
    EmptyTitle,

    #[error("invalid ticket id '{0}'")]
    InvalidId(String),

    #[error("invalid status '{0}'")]
    InvalidStatus(String),

    #[error("invalid type '{0}'")]
    InvalidType(String),

    #[error("invalid priority '{0}'")]
    InvalidPriority(String),

    #[error("flag '{0}' cannot be empty")]
    EmptyFlag(&'static str),

    // Missing entities
    #[error("ticket '{0}' not found")]
    TicketNotFound(String),

    #[error("blocker '{0}' not found")]
    BlockerNotFound(String),

    #[error("parent '{0}' not found")]
    ParentNotFound(String),

    #[error("config file '{0}' not found")]
    ConfigNotFound(PathBuf),

    // State conflicts
    #[error("ticket '{id}' is {actual}, expected {expected}")]
    WrongState {
        id: String,
        actual: String,
        expected: &'static str,
    },

    #[error("ticket '{id}' is already blocked by {blocker}")]
    AlreadyBlocked { id: String, blocker: String },

    #[error("ticket '{id}' is not blocked by {blocker}")]
    NotBlocked { id: String, blocker: String },

    #[error("ticket '{0}' cannot block itself")]
    SelfBlock(String),

    #[error("cannot start '{id}': parent '{parent}' has not been started")]
    ParentNotStarted { id: String, parent: String },

    #[error("parent '{parent}' of '{id}' is closed")]
    ParentClosed { id: String, parent: String },

    #[error("cannot start '{id}': blocker '{blocker}' is not closed")]
    BlockerOpen { id: String, blocker: String },

    #[error("cannot close '{id}': ticket has open children: {children}")]
    OpenChildren { id: String, children: String },

    #[error("cycle detected: {0}")]
    CycleDetected(String),

    // Allocation
    #[error("id space exhausted for '{0}': suffixes 02-99 are all taken")]
    IdExhausted(String),

    // File integrity
    #[error("malformed frontmatter: {0}")]
    MalformedFrontmatter(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value '{value}' for field '{field}'")]
    InvalidValue { field: &'static str, value: String },

    // Environment
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("{0}")]
    Other(String),
}

impl TickError {
    /// Attach a context prefix, preserving the original message.
    pub fn context(self, ctx: impl std::fmt::Display) -> TickError {
        TickError::Other(format!("{ctx}: {self}"))
    }
}

pub type Result<T> = std::result::Result<T, TickError>;
