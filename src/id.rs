//! Deterministic ticket ID allocation.
//!
//! An ID is seven base-36 characters derived from the normalized title, so
//! identical titles map to identical base IDs on every process and OS.
//! Collisions are resolved with a `-NN` suffix; the locked
//! exists-check-then-create sequence in the store makes racing allocators
//! converge on distinct suffixes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TickError};

/// Shape of every valid ticket ID. Uppercase is rejected, never normalized.
static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-z]{7}(-[0-9]{2})?$").unwrap());

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of title-hash bits kept; 36^7 > 2^35, so seven chars always fit.
const HASH_BITS: u32 = 35;

/// First and last collision suffixes. Exhausting `-99` is a hard failure.
pub const FIRST_SUFFIX: u8 = 2;
pub const LAST_SUFFIX: u8 = 99;

pub fn validate_id(id: &str) -> Result<()> {
    if ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(TickError::InvalidId(id.to_string()))
    }
}

/// Lowercase, strip non-alphanumerics, collapse whitespace.
fn normalize_title(title: &str) -> String {
    let mapped: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the 7-character base ID for a title.
pub fn base_id_for_title(title: &str) -> String {
    let normalized = normalize_title(title);
    let hash = blake3::hash(normalized.as_bytes());
    let mut raw = u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap());
    raw &= (1 << HASH_BITS) - 1;
    encode_base36(raw)
}

fn encode_base36(mut value: u64) -> String {
    let mut out = [b'0'; 7];
    let mut i = out.len();
    while value > 0 {
        i -= 1;
        out[i] = BASE36[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8(out.to_vec()).unwrap()
}

/// All candidate IDs for a base, in allocation order: the bare base, then
/// `-02` through `-99`.
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string())
        .chain((FIRST_SUFFIX..=LAST_SUFFIX).map(move |n| format!("{base}-{n:02}")))
}
