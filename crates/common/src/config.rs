//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{BoardError, BoardResult};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Remote sheet configuration.
    pub sheet: SheetConfig,
    /// Column name configuration.
    #[serde(default)]
    pub columns: ColumnsConfig,
    /// Polling configuration.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Board presentation configuration.
    #[serde(default)]
    pub board: BoardConfig,
}

/// Remote sheet configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetConfig {
    /// Spreadsheet identifier.
    #[serde(default)]
    pub id: String,
    /// Tab holding the form responses.
    #[serde(default = "default_tab")]
    pub tab: String,
    /// API key appended to every request.
    #[serde(default)]
    pub api_key: String,
    /// Base URL of the values endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Column name configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnsConfig {
    /// Header of the question text column.
    #[serde(default = "default_question_column")]
    pub question: String,
    /// Header of the submission timestamp column.
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    /// Header of the manual display order column.
    #[serde(default)]
    pub display_order: Option<String>,
    /// Header of the author name column.
    #[serde(default)]
    pub author: Option<String>,
    /// Skip rows whose display order cell is blank.
    #[serde(default)]
    pub gate_on_display_order: bool,
}

/// Polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Refresh rate in user-facing units; one unit is half a second.
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: u64,
    /// Floor for the tick interval in milliseconds.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// How long a freshly arrived question stays flagged as new.
    #[serde(default = "default_new_grace_ms")]
    pub new_grace_ms: u64,
}

/// Board presentation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Initial ordering policy name.
    #[serde(default = "default_sort")]
    pub sort: String,
    /// Discard rows with any empty cell.
    #[serde(default = "default_true")]
    pub strict_rows: bool,
    /// Identity key strategy name.
    #[serde(default = "default_key_strategy")]
    pub key_strategy: String,
}

/// Milliseconds per refresh-rate unit.
const REFRESH_UNIT_MS: u64 = 500;

fn default_tab() -> String {
    "Form Responses 1".to_string()
}

fn default_base_url() -> String {
    "https://sheets.googleapis.com/v4/spreadsheets".to_string()
}

fn default_question_column() -> String {
    "Your question".to_string()
}

fn default_timestamp_column() -> String {
    "Timestamp".to_string()
}

const fn default_refresh_rate() -> u64 {
    5
}

const fn default_min_interval_ms() -> u64 {
    500
}

const fn default_new_grace_ms() -> u64 {
    2000
}

fn default_sort() -> String {
    "newest".to_string()
}

fn default_key_strategy() -> String {
    "text_timestamp".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            question: default_question_column(),
            timestamp: default_timestamp_column(),
            display_order: None,
            author: None,
            gate_on_display_order: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            refresh_rate: default_refresh_rate(),
            min_interval_ms: default_min_interval_ms(),
            new_grace_ms: default_new_grace_ms(),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            sort: default_sort(),
            strict_rows: true,
            key_strategy: default_key_strategy(),
        }
    }
}

impl PollingConfig {
    /// Tick interval of the polling driver, never below the floor.
    #[must_use]
    pub fn interval(&self) -> Duration {
        let ms = self.refresh_rate.saturating_mul(REFRESH_UNIT_MS);
        Duration::from_millis(ms.max(self.min_interval_ms))
    }

    /// Display grace for newly arrived questions.
    #[must_use]
    pub const fn new_grace(&self) -> Duration {
        Duration::from_millis(self.new_grace_ms)
    }
}

impl SheetConfig {
    /// Creates a sheet configuration with defaults for everything but the id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tab: default_tab(),
            api_key: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `QABOARD_ENV`)
    /// 3. Environment variables with `QABOARD_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("QABOARD_ENV").unwrap_or_else(|_| "development".to_string());
        debug!(env = %env, "Loading configuration");

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("QABOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        debug!(path = %path.as_ref().display(), "Loading configuration file");
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("QABOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Create a configuration for a sheet id with every other value defaulted.
    #[must_use]
    pub fn for_sheet(id: impl Into<String>) -> Self {
        Self {
            sheet: SheetConfig::with_id(id),
            columns: ColumnsConfig::default(),
            polling: PollingConfig::default(),
            board: BoardConfig::default(),
        }
    }

    /// Check the values that cannot be expressed through serde defaults.
    pub fn validate(&self) -> BoardResult<()> {
        if self.sheet.id.trim().is_empty() {
            return Err(BoardError::InvalidSource(
                "Please enter a valid Google Sheet ID".to_string(),
            ));
        }
        if self.columns.question.trim().is_empty() {
            return Err(BoardError::Config(
                "question column name must not be blank".to_string(),
            ));
        }
        if self.columns.gate_on_display_order && self.columns.display_order.is_none() {
            return Err(BoardError::Config(
                "gate_on_display_order requires a display_order column".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_polling_interval_uses_half_second_units() {
        let polling = PollingConfig::default();
        assert_eq!(polling.interval(), Duration::from_millis(2500));
    }

    #[test]
    fn test_polling_interval_floor() {
        let polling = PollingConfig {
            refresh_rate: 0,
            ..Default::default()
        };
        assert_eq!(polling.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_blank_sheet_id() {
        let config = Config::for_sheet("   ");
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.status_message(),
            "Please enter a valid Google Sheet ID"
        );
    }

    #[test]
    fn test_validate_gate_requires_column() {
        let mut config = Config::for_sheet("abc");
        config.columns.gate_on_display_order = true;
        assert!(matches!(config.validate(), Err(BoardError::Config(_))));

        config.columns.display_order = Some("display?".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[sheet]
id = "sheet-123"

[columns]
display_order = "display?"

[polling]
refresh_rate = 2
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.sheet.id, "sheet-123");
        assert_eq!(config.sheet.tab, "Form Responses 1");
        assert_eq!(config.columns.question, "Your question");
        assert_eq!(config.columns.timestamp, "Timestamp");
        assert_eq!(config.columns.display_order.as_deref(), Some("display?"));
        assert_eq!(config.polling.interval(), Duration::from_millis(1000));
        assert_eq!(config.board.sort, "newest");
        assert!(config.board.strict_rows);
    }
}
