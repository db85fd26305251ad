//! Frontmatter codec for ticket files.
//!
//! A ticket file is a YAML-like frontmatter block bracketed by `---` lines
//! (the first starting at byte 0), followed by a `# title` heading and free
//! Markdown body. The codec is line-oriented on purpose: single-field
//! updates rewrite only the affected line, preserving unknown keys, line
//! order, and trailing whitespace everywhere else.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TickError};
use crate::types::{Status, Summary, is_valid_timestamp};

/// `key: value` with lenient whitespace around the colon.
static LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_][A-Za-z0-9_-]*)\s*:\s*(.*?)\s*$").unwrap());

/// First-level Markdown heading holding the title.
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s+(.*?)\s*$").unwrap());

/// Frontmatter key for the blocker list (`blocked_by` renders hyphenated).
pub const BLOCKED_BY_KEY: &str = "blocked-by";

/// Split a ticket file into (frontmatter, body).
///
/// The opening `---` must begin at byte 0; the body keeps its bytes
/// verbatim, including trailing newlines.
fn split(content: &str) -> Result<(&str, &str)> {
    let Some(rest) = content.strip_prefix("---\n") else {
        return Err(TickError::MalformedFrontmatter(
            "missing opening '---' delimiter".to_string(),
        ));
    };
    if let Some(body) = rest.strip_prefix("---\n") {
        return Ok(("", body));
    }
    match rest.find("\n---\n") {
        Some(i) => Ok((&rest[..i], &rest[i + 5..])),
        None => Err(TickError::MalformedFrontmatter(
            "missing closing '---' delimiter".to_string(),
        )),
    }
}

/// Line-preserving editor over the frontmatter block.
///
/// Unknown keys pass through untouched; edits replace whole lines only.
pub struct FrontmatterEditor {
    lines: Vec<String>,
    body: String,
}

impl FrontmatterEditor {
    pub fn new(content: &str) -> Result<Self> {
        let (frontmatter, body) = split(content)?;
        Ok(FrontmatterEditor {
            lines: frontmatter.lines().map(String::from).collect(),
            body: body.to_string(),
        })
    }

    fn key_of(line: &str) -> Option<(&str, &str)> {
        LINE_RE
            .captures(line)
            .map(|c| (c.get(1).unwrap().as_str(), c.get(2).unwrap().as_str()))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| Self::key_of(l).is_some_and(|(k, _)| k == key))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lines
            .iter()
            .find_map(|l| Self::key_of(l).filter(|(k, _)| *k == key))
            .map(|(_, v)| v.to_string())
    }

    /// Replace the field's line in place, or append it at the end of the
    /// block when absent.
    pub fn set(&mut self, key: &str, value: &str) {
        let line = format!("{key}: {value}");
        match self.position(key) {
            Some(i) => self.lines[i] = line,
            None => self.lines.push(line),
        }
    }

    /// Insert `key` on the line directly after `anchor`. Falls back to a
    /// plain `set` when the anchor is missing or the key already exists.
    pub fn insert_after(&mut self, anchor: &str, key: &str, value: &str) {
        if self.position(key).is_some() {
            self.set(key, value);
            return;
        }
        match self.position(anchor) {
            Some(i) => self.lines.insert(i + 1, format!("{key}: {value}")),
            None => self.set(key, value),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(i) => {
                self.lines.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn build(self) -> String {
        if self.lines.is_empty() {
            format!("---\n---\n{}", self.body)
        } else {
            format!("---\n{}\n---\n{}", self.lines.join("\n"), self.body)
        }
    }
}

/// Parse an inline id list: `[a, b, c]` or `[]`, lenient on whitespace and
/// tolerant of quoted elements.
fn parse_id_list(field: &'static str, value: &str) -> Result<Vec<String>> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| TickError::InvalidValue {
            field,
            value: value.to_string(),
        })?;
    Ok(inner
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\''))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

/// Render an id list in the on-disk inline form.
pub fn format_id_list(ids: &[String]) -> String {
    format!("[{}]", ids.join(", "))
}

/// Parse a ticket file into its [`Summary`].
///
/// Strict on required fields (`id`, `status`, `created`, the title heading,
/// and `closed` present iff the status is closed); lenient on whitespace.
/// Duplicate or self-referential blockers are preserved here so `repair`
/// can read and fix them.
pub fn parse_summary(content: &str) -> Result<Summary> {
    let (frontmatter, body) = split(content)?;

    let mut id = None;
    let mut status: Option<Status> = None;
    let mut created = None;
    let mut closed = None;
    let mut ticket_type = None;
    let mut priority = None;
    let mut assignee = String::new();
    let mut parent = None;
    let mut blocked_by = Vec::new();

    for line in frontmatter.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = FrontmatterEditor::key_of(line) else {
            return Err(TickError::MalformedFrontmatter(format!(
                "unparseable line '{line}'"
            )));
        };
        match key {
            "schema_version" => {
                value
                    .parse::<u32>()
                    .map_err(|_| TickError::InvalidValue {
                        field: "schema_version",
                        value: value.to_string(),
                    })?;
            }
            "id" => id = Some(value.to_string()),
            "status" => {
                status = Some(value.parse::<Status>().map_err(|_| {
                    TickError::InvalidValue {
                        field: "status",
                        value: value.to_string(),
                    }
                })?);
            }
            "created" => {
                if !is_valid_timestamp(value) {
                    return Err(TickError::InvalidValue {
                        field: "created",
                        value: value.to_string(),
                    });
                }
                created = Some(value.to_string());
            }
            "closed" => {
                if !is_valid_timestamp(value) {
                    return Err(TickError::InvalidValue {
                        field: "closed",
                        value: value.to_string(),
                    });
                }
                closed = Some(value.to_string());
            }
            "type" => {
                ticket_type = Some(value.parse().map_err(|_| TickError::InvalidValue {
                    field: "type",
                    value: value.to_string(),
                })?);
            }
            "priority" => {
                priority = Some(value.parse().map_err(|_| TickError::InvalidValue {
                    field: "priority",
                    value: value.to_string(),
                })?);
            }
            "assignee" => assignee = value.to_string(),
            "parent" => {
                if !value.is_empty() {
                    parent = Some(value.to_string());
                }
            }
            "blocked-by" | "blocked_by" => {
                blocked_by = parse_id_list("blocked-by", value)?;
            }
            // Unknown keys are neither interpreted nor removed.
            _ => {}
        }
    }

    let id = id.ok_or(TickError::MissingField("id"))?;
    let status = status.ok_or(TickError::MissingField("status"))?;
    created.ok_or(TickError::MissingField("created"))?;

    let title = TITLE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(TickError::MissingField("title"))?;

    let closed = match (status, closed) {
        (Status::Closed, Some(ts)) => ts,
        (Status::Closed, None) => return Err(TickError::MissingField("closed")),
        (_, Some(ts)) => {
            return Err(TickError::InvalidValue {
                field: "closed",
                value: ts,
            });
        }
        (_, None) => String::new(),
    };

    Ok(Summary {
        id,
        status,
        ticket_type: ticket_type.unwrap_or_default(),
        priority: priority.unwrap_or_default(),
        title,
        assignee,
        closed,
        parent,
        blocked_by,
    })
}

pub fn get_field(content: &str, key: &str) -> Result<Option<String>> {
    Ok(FrontmatterEditor::new(content)?.get(key))
}

pub fn set_field(content: &str, key: &str, value: &str) -> Result<String> {
    let mut editor = FrontmatterEditor::new(content)?;
    editor.set(key, value);
    Ok(editor.build())
}

/// Insert a field directly after the `status` line; used for `closed` so the
/// close timestamp sits next to the state it documents.
pub fn add_field_after_status(content: &str, key: &str, value: &str) -> Result<String> {
    let mut editor = FrontmatterEditor::new(content)?;
    editor.insert_after("status", key, value);
    Ok(editor.build())
}

pub fn remove_field(content: &str, key: &str) -> Result<String> {
    let mut editor = FrontmatterEditor::new(content)?;
    editor.remove(key);
    Ok(editor.build())
}

pub fn update_blocked_by(content: &str, ids: &[String]) -> Result<String> {
    set_field(content, BLOCKED_BY_KEY, &format_id_list(ids))
}
