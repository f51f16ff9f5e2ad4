//! Identity keys for questions.
//!
//! The response sheet has no primary key, so a question is recognised across
//! polls by a key derived from its own fields. Keys compare by exact equality:
//! no trimming, no case folding. Two submissions that differ only in
//! incidental whitespace are two different questions.

use std::fmt;
use std::sync::Arc;

use qaboard_common::{BoardError, BoardResult};
use serde::{Deserialize, Serialize};

/// Separates the fields of a composite key.
///
/// A control character keeps `("a_b", "c")` and `("a", "b_c")` apart.
const KEY_SEPARATOR: char = '\u{1f}';

/// Author used when the author column is configured but the cell is blank.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Logical identity of a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionKey(String);

impl QuestionKey {
    /// Build a key from its ordered parts.
    fn compose(parts: &[&str]) -> Self {
        let mut raw = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                raw.push(KEY_SEPARATOR);
            }
            raw.push_str(part);
        }
        Self(raw)
    }

    /// Returns the raw key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.0.split(KEY_SEPARATOR);
        if let Some(first) = parts.next() {
            f.write_str(first)?;
        }
        for part in parts {
            write!(f, " @ {part}")?;
        }
        Ok(())
    }
}

/// The raw fields a key may be derived from.
#[derive(Debug, Clone, Copy)]
pub struct KeyFields<'a> {
    /// Question text exactly as received.
    pub question: &'a str,
    /// Timestamp text exactly as received (or defaulted).
    pub timestamp: &'a str,
    /// Author name, when the author column is tracked.
    pub author: Option<&'a str>,
}

/// Strategy for deriving a question's identity key.
///
/// Implementations must be pure and deterministic: equal fields always yield
/// equal keys.
pub trait KeyStrategy: Send + Sync + fmt::Debug {
    /// Derive the key for a record.
    fn derive(&self, fields: &KeyFields<'_>) -> QuestionKey;

    /// Configuration name of the strategy.
    fn name(&self) -> &'static str;
}

/// Question text plus submission timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextTimestampKey;

impl KeyStrategy for TextTimestampKey {
    fn derive(&self, fields: &KeyFields<'_>) -> QuestionKey {
        derive_key(fields.question, fields.timestamp)
    }

    fn name(&self) -> &'static str {
        "text_timestamp"
    }
}

/// Question text plus author name.
///
/// A blank or untracked author counts as [`ANONYMOUS_AUTHOR`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAuthorKey;

impl KeyStrategy for TextAuthorKey {
    fn derive(&self, fields: &KeyFields<'_>) -> QuestionKey {
        let author = fields
            .author
            .filter(|a| !a.is_empty())
            .unwrap_or(ANONYMOUS_AUTHOR);
        QuestionKey::compose(&[fields.question, author])
    }

    fn name(&self) -> &'static str {
        "text_author"
    }
}

/// Derive the default identity key from question text and timestamp.
#[must_use]
pub fn derive_key(question: &str, timestamp: &str) -> QuestionKey {
    QuestionKey::compose(&[question, timestamp])
}

/// Look up a key strategy by its configuration name.
pub fn strategy_from_name(name: &str) -> BoardResult<Arc<dyn KeyStrategy>> {
    match name {
        "text_timestamp" => Ok(Arc::new(TextTimestampKey)),
        "text_author" => Ok(Arc::new(TextAuthorKey)),
        other => Err(BoardError::Config(format!("unknown key strategy: {other}"))),
    }
}
