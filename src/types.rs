use crate::error::{Result, TickError};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Closed,
}

enum_display_fromstr!(Status, TickError::InvalidStatus, {
    Open => "open",
    InProgress => "in_progress",
    Closed => "closed",
});

impl Status {
    /// Single-byte encoding used by the summary cache.
    pub fn code(self) -> u8 {
        match self {
            Status::Open => 0,
            Status::InProgress => 1,
            Status::Closed => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Status> {
        match code {
            0 => Some(Status::Open),
            1 => Some(Status::InProgress),
            2 => Some(Status::Closed),
            _ => None,
        }
    }
}

pub const VALID_STATUSES: &[&str] = &["open", "in_progress", "closed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TicketType {
    Bug,
    Feature,
    #[default]
    Task,
    Epic,
    Chore,
}

enum_display_fromstr!(TicketType, TickError::InvalidType, {
    Bug => "bug",
    Feature => "feature",
    Task => "task",
    Epic => "epic",
    Chore => "chore",
});

impl TicketType {
    pub fn code(self) -> u8 {
        match self {
            TicketType::Bug => 0,
            TicketType::Feature => 1,
            TicketType::Task => 2,
            TicketType::Epic => 3,
            TicketType::Chore => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<TicketType> {
        match code {
            0 => Some(TicketType::Bug),
            1 => Some(TicketType::Feature),
            2 => Some(TicketType::Task),
            3 => Some(TicketType::Epic),
            4 => Some(TicketType::Chore),
            _ => None,
        }
    }
}

pub const VALID_TYPES: &[&str] = &["bug", "feature", "task", "epic", "chore"];

/// Priority 1 is most urgent; 2 is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    P1,
    #[default]
    P2,
    P3,
    P4,
}

impl Priority {
    pub fn as_num(self) -> u8 {
        match self {
            Priority::P1 => 1,
            Priority::P2 => 2,
            Priority::P3 => 3,
            Priority::P4 => 4,
        }
    }

    pub fn from_num(n: u8) -> Option<Priority> {
        match n {
            1 => Some(Priority::P1),
            2 => Some(Priority::P2),
            3 => Some(Priority::P3),
            4 => Some(Priority::P4),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_num())
    }
}

impl std::str::FromStr for Priority {
    type Err = TickError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u8>()
            .ok()
            .and_then(Priority::from_num)
            .ok_or_else(|| TickError::InvalidPriority(s.to_string()))
    }
}

pub const VALID_PRIORITIES: &[&str] = &["1", "2", "3", "4"];

pub const DEFAULT_PRIORITY_STR: &str = "2";

/// The subset of ticket fields the summary cache stores for fast query.
///
/// `closed` is the RFC3339 close timestamp, empty while the ticket is not
/// closed, mirroring the cache encoding directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub id: String,
    pub status: Status,
    pub ticket_type: TicketType,
    pub priority: Priority,
    pub title: String,
    pub assignee: String,
    pub closed: String,
    pub parent: Option<String>,
    pub blocked_by: Vec<String>,
}

impl Summary {
    pub fn is_closed(&self) -> bool {
        self.status == Status::Closed
    }
}

/// Input to ticket creation, before an ID exists.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
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

impl NewTicket {
    pub fn new(title: impl Into<String>) -> Self {
        NewTicket {
            title: title.into(),
            ..NewTicket::default()
        }
    }
}

/// Current time as an RFC3339 UTC timestamp with second precision.
pub fn now_utc() -> String {
    jiff::Timestamp::now()
        .strftime("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Validate an RFC3339 timestamp as stored in `created` / `closed`.
pub fn is_valid_timestamp(s: &str) -> bool {
    s.parse::<jiff::Timestamp>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for s in VALID_STATUSES {
            let parsed: Status = s.parse().unwrap();
            assert_eq!(parsed.to_string(), *s);
        }
        assert!("OPEN".parse::<Status>().is_err());
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn type_round_trips_through_codes() {
        for s in VALID_TYPES {
            let parsed: TicketType = s.parse().unwrap();
            assert_eq!(TicketType::from_code(parsed.code()), Some(parsed));
        }
        assert_eq!(TicketType::from_code(9), None);
    }

    #[test]
    fn priority_bounds() {
        assert_eq!("1".parse::<Priority>().unwrap(), Priority::P1);
        assert_eq!("4".parse::<Priority>().unwrap(), Priority::P4);
        assert!("0".parse::<Priority>().is_err());
        assert!("5".parse::<Priority>().is_err());
        assert!("two".parse::<Priority>().is_err());
    }

    #[test]
    fn priority_orders_most_urgent_first() {
        assert!(Priority::P1 < Priority::P2);
        assert!(Priority::P3 < Priority::P4);
    }

    #[test]
    fn now_utc_is_valid_rfc3339() {
        let ts = now_utc();
        assert!(is_valid_timestamp(&ts));
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn timestamp_validation_rejects_garbage() {
        assert!(is_valid_timestamp("2026-01-04T12:34:56Z"));
        assert!(!is_valid_timestamp("yesterday"));
        assert!(!is_valid_timestamp("2026-13-04T12:34:56Z"));
    }
}
