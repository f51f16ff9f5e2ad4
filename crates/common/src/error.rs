//! Error types for qaboard.

use thiserror::Error;

/// Board result type.
pub type BoardResult<T> = Result<T, BoardError>;

/// Board error type.
///
/// Every variant degrades to "leave state unchanged, report status"; none of
/// them is allowed to tear down the poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    // === Source Errors ===
    #[error("Column \"{0}\" not found.")]
    ColumnNotFound(String),

    #[error("{0}")]
    FetchFailed(String),

    #[error("{0}")]
    InvalidSource(String),

    // === Local Errors ===
    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoardError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::FetchFailed(_) => "FETCH_FAILED",
            Self::InvalidSource(_) => "INVALID_SOURCE",
            Self::UnknownQuestion(_) => "UNKNOWN_QUESTION",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the message shown in the status line.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self {
            Self::InvalidSource(msg) => msg.clone(),
            other => format!("Error: {other}"),
        }
    }

    /// Returns whether the next scheduled tick is expected to recover.
    ///
    /// Transient fetch failures are retried by the schedule; a missing column
    /// stays missing until someone edits the sheet or the configuration.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::FetchFailed(_))
    }
}

// === From implementations ===

impl From<config::ConfigError> for BoardError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for BoardError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_not_found_status() {
        let err = BoardError::ColumnNotFound("Your question".to_string());
        assert_eq!(err.code(), "COLUMN_NOT_FOUND");
        assert_eq!(
            err.status_message(),
            "Error: Column \"Your question\" not found."
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_fetch_failed_status() {
        let err = BoardError::FetchFailed("API returned status: 404".to_string());
        assert_eq!(err.status_message(), "Error: API returned status: 404");
        assert!(err.is_transient());
    }

    #[test]
    fn test_invalid_source_is_shown_verbatim() {
        let err = BoardError::InvalidSource("Please enter a valid Google Sheet ID".to_string());
        assert_eq!(err.status_message(), "Please enter a valid Google Sheet ID");
    }

    #[test]
    fn test_from_anyhow() {
        let err: BoardError = anyhow::anyhow!("boom").into();
        assert_eq!(err, BoardError::Internal("boom".to_string()));
    }
}
