//! Canonical question record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::QuestionKey;

/// Timestamp layouts accepted for ordering, tried in order after RFC 3339.
const TIMESTAMP_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// A question as held in the canonical set.
///
/// Values are rebuilt on every reconciliation; only `votes`, `answered` and
/// `removed` are carried forward from the matching prior record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Slot in the current canonical set. Recomputed on every pass.
    pub id: usize,
    /// Derived identity key.
    pub key: QuestionKey,
    /// Question text.
    pub question: String,
    /// Submission timestamp as received from the source.
    pub timestamp: String,
    /// Author name, when the author column is tracked.
    pub author: Option<String>,
    /// Manual ordering value as received from the source.
    pub display_order: Option<String>,
    /// Upvote counter.
    pub votes: u32,
    /// Marked answered by the moderator.
    pub answered: bool,
    /// Tombstone flag.
    pub removed: bool,
    /// First seen during the latest pass and still inside the display grace.
    pub is_new: bool,
}

impl Question {
    /// Parsed submission time, if the timestamp is in a known layout.
    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Parsed manual ordering value.
    #[must_use]
    pub fn display_rank(&self) -> Option<i64> {
        self.display_order.as_deref().and_then(parse_display_order)
    }
}

/// Parse a sheet timestamp.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parse the leading integer of a display order cell.
///
/// Leading whitespace and a sign are accepted and trailing text is ignored,
/// so `" 3rd"` ranks as 3. Cells without leading digits are unordered.
#[must_use]
pub fn parse_display_order(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
