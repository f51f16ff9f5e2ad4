//! User-visible status line.

use std::fmt;

use qaboard_common::BoardError;
use serde::Serialize;

/// Status categories, used by the presentation for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKind {
    /// Nothing has happened yet.
    Idle,
    /// Initial fetch in progress.
    Connecting,
    /// Connected and polling.
    Connected,
    /// The latest pass brought new questions.
    NewEntries,
    /// Connected, but something deserves attention.
    Warning,
    /// The latest pass failed.
    Error,
}

/// A status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Category.
    pub kind: StatusKind,
    /// Message text.
    pub message: String,
}

impl Status {
    fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Initial status.
    #[must_use]
    pub fn idle() -> Self {
        Self::new(StatusKind::Idle, "Not connected")
    }

    /// Initial fetch started.
    #[must_use]
    pub fn connecting() -> Self {
        Self::new(StatusKind::Connecting, "Connecting to Google Sheet...")
    }

    /// Connected and polling.
    #[must_use]
    pub fn connected() -> Self {
        Self::new(
            StatusKind::Connected,
            "Connected to Google Sheet! Questions will refresh automatically.",
        )
    }

    /// Connected to a sheet without rows.
    #[must_use]
    pub fn empty_sheet() -> Self {
        Self::new(
            StatusKind::Warning,
            "Connected, but the sheet appears to be empty.",
        )
    }

    /// New questions arrived.
    #[must_use]
    pub fn new_entries(count: usize) -> Self {
        Self::new(
            StatusKind::NewEntries,
            format!("Connected! {count} new question(s) received."),
        )
    }

    /// A question was removed by the moderator.
    #[must_use]
    pub fn removed() -> Self {
        Self::new(StatusKind::Connected, "Question removed")
    }

    /// A pass failed.
    #[must_use]
    pub fn error(err: &BoardError) -> Self {
        Self::new(StatusKind::Error, err.status_message())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
