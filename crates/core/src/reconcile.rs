//! Reconciliation of freshly fetched rows against the prior canonical set.
//!
//! The source is re-fetched in full on every poll. Reconciliation rebuilds
//! every record from the fresh rows and copies local state (votes, answered,
//! tombstones) forward by identity key. It is a pure transform: the caller
//! decides whether to install the result.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use qaboard_common::{BoardError, BoardResult, ColumnsConfig};

use crate::identity::{ANONYMOUS_AUTHOR, KeyFields, KeyStrategy, QuestionKey, TextTimestampKey};
use crate::question::Question;

/// A raw grid as returned by the source. Row 0 is the header.
pub type Rows = [Vec<String>];

/// Header names used to pick fields out of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Question text column. Required.
    pub question: String,
    /// Timestamp column. Rows are stamped with the pass time when absent.
    pub timestamp: String,
    /// Manual ordering column. Required when configured.
    pub display_order: Option<String>,
    /// Author column. Ignored when absent from the header.
    pub author: Option<String>,
    /// Skip rows with a blank display order cell.
    pub gate_on_display_order: bool,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::from(&ColumnsConfig::default())
    }
}

impl From<&ColumnsConfig> for ColumnMapping {
    fn from(config: &ColumnsConfig) -> Self {
        Self {
            question: config.question.clone(),
            timestamp: config.timestamp.clone(),
            display_order: config.display_order.clone(),
            author: config.author.clone(),
            gate_on_display_order: config.gate_on_display_order,
        }
    }
}

/// Which rows are admitted before field extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowFilter {
    /// Only rows with empty question text are dropped.
    Lenient,
    /// Rows with any blank cell are dropped as well.
    #[default]
    Strict,
}

impl RowFilter {
    /// Filter for the `strict_rows` configuration flag.
    #[must_use]
    pub const fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Lenient }
    }

    fn admits(self, row: &[String]) -> bool {
        match self {
            Self::Lenient => true,
            // Sheets trims trailing blanks, so only the cells present are checked.
            Self::Strict => row.iter().all(|cell| !cell.trim().is_empty()),
        }
    }
}

/// Canonical state carried between passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Live questions in source order.
    pub questions: Vec<Question>,
    /// Keys removed by the moderator. Never cleared.
    pub tombstones: HashSet<QuestionKey>,
}

impl Snapshot {
    /// Returns whether there are no live questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Find a live question by key.
    #[must_use]
    pub fn get(&self, key: &QuestionKey) -> Option<&Question> {
        self.questions.iter().find(|q| &q.key == key)
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The replacement canonical state.
    pub snapshot: Snapshot,
    /// Records flagged `is_new` in this pass.
    pub newly_arrived: usize,
    /// Rows stamped with the pass time because the timestamp column is missing.
    pub defaulted_timestamps: usize,
}

/// Resolved header positions for one pass.
struct ColumnIndex {
    question: usize,
    timestamp: Option<usize>,
    display_order: Option<usize>,
    author: Option<usize>,
}

impl ColumnIndex {
    fn resolve(header: &[String], mapping: &ColumnMapping) -> BoardResult<Self> {
        let find = |name: &str| header.iter().position(|h| h == name);

        let question = find(&mapping.question)
            .ok_or_else(|| BoardError::ColumnNotFound(mapping.question.clone()))?;
        let display_order = match &mapping.display_order {
            Some(name) => Some(find(name).ok_or_else(|| BoardError::ColumnNotFound(name.clone()))?),
            None => None,
        };

        Ok(Self {
            question,
            timestamp: find(&mapping.timestamp),
            display_order,
            author: mapping.author.as_deref().and_then(find),
        })
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", String::as_str)
}

/// Merges fresh rows into the canonical set.
#[derive(Debug, Clone)]
pub struct Reconciler {
    mapping: ColumnMapping,
    filter: RowFilter,
    keys: Arc<dyn KeyStrategy>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ColumnMapping::default(), RowFilter::default(), Arc::new(TextTimestampKey))
    }
}

impl Reconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(mapping: ColumnMapping, filter: RowFilter, keys: Arc<dyn KeyStrategy>) -> Self {
        Self {
            mapping,
            filter,
            keys,
        }
    }

    /// The key strategy in use.
    #[must_use]
    pub fn key_strategy(&self) -> &Arc<dyn KeyStrategy> {
        &self.keys
    }

    /// The column mapping in use.
    #[must_use]
    pub const fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Reconcile `rows` against `prior`.
    ///
    /// `now` stamps rows that carry no timestamp. On `ColumnNotFound` nothing
    /// is produced and the caller keeps its prior state.
    pub fn reconcile(
        &self,
        prior: &Snapshot,
        rows: &Rows,
        now: DateTime<Utc>,
    ) -> BoardResult<Reconciliation> {
        let mut tombstones = prior.tombstones.clone();
        tombstones.extend(
            prior
                .questions
                .iter()
                .filter(|q| q.removed)
                .map(|q| q.key.clone()),
        );

        let Some((header, data)) = rows.split_first() else {
            return Ok(Reconciliation {
                snapshot: Snapshot {
                    questions: Vec::new(),
                    tombstones,
                },
                newly_arrived: 0,
                defaulted_timestamps: 0,
            });
        };

        let columns = ColumnIndex::resolve(header, &self.mapping)?;

        // First record per key wins; duplicates carry identical local state.
        let mut previous: HashMap<&QuestionKey, &Question> = HashMap::new();
        for q in &prior.questions {
            previous.entry(&q.key).or_insert(q);
        }
        let mark_new = !previous.is_empty();
        let default_timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut questions = Vec::with_capacity(data.len());
        let mut defaulted_timestamps = 0;

        for row in data {
            if !self.filter.admits(row) {
                continue;
            }

            let display_cell = columns.display_order.map(|i| cell(row, i));
            if self.mapping.gate_on_display_order && display_cell.is_none_or(str::is_empty) {
                continue;
            }

            let text = cell(row, columns.question);
            if text.is_empty() {
                continue;
            }

            let timestamp = match columns.timestamp.map(|i| cell(row, i)) {
                Some(ts) if !ts.is_empty() => ts.to_string(),
                _ => {
                    defaulted_timestamps += 1;
                    default_timestamp.clone()
                }
            };
            let author = self.mapping.author.as_ref().map(|_| {
                columns
                    .author
                    .map(|i| cell(row, i))
                    .filter(|a| !a.is_empty())
                    .unwrap_or(ANONYMOUS_AUTHOR)
                    .to_string()
            });

            let key = self.keys.derive(&KeyFields {
                question: text,
                timestamp: &timestamp,
                author: author.as_deref(),
            });
            if tombstones.contains(&key) {
                continue;
            }

            let existing = previous.get(&key);
            questions.push(Question {
                id: questions.len(),
                key,
                question: text.to_string(),
                timestamp,
                author,
                display_order: display_cell.filter(|d| !d.is_empty()).map(str::to_string),
                votes: existing.map_or(0, |q| q.votes),
                answered: existing.is_some_and(|q| q.answered),
                removed: false,
                is_new: existing.is_none() && mark_new,
            });
        }

        let newly_arrived = questions.iter().filter(|q| q.is_new).count();
        Ok(Reconciliation {
            snapshot: Snapshot {
                questions,
                tombstones,
            },
            newly_arrived,
            defaulted_timestamps,
        })
    }
}
