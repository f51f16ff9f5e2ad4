//! Remote row sources.
//!
//! A source returns the whole response grid on every call. Row 0 is the
//! header. Any transport or decoding problem surfaces as
//! [`BoardError::FetchFailed`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use qaboard_common::{BoardError, BoardResult, SheetConfig};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

/// A fetched grid of text cells.
pub type Grid = Vec<Vec<String>>;

/// Source of response rows.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch the full grid, header row first.
    async fn fetch_rows(&self) -> BoardResult<Grid>;

    /// Human readable description for logs. Must not contain secrets.
    fn describe(&self) -> String;
}

/// Google Sheets values endpoint response.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads a tab of a Google Sheet through the values API.
pub struct SheetsSource {
    client: Client,
    url: String,
    sheet_id: String,
    tab: String,
}

impl SheetsSource {
    /// Request timeout.
    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a source for the configured sheet.
    pub fn new(config: &SheetConfig) -> BoardResult<Self> {
        let sheet_id = config.id.trim();
        if sheet_id.is_empty() {
            return Err(BoardError::InvalidSource(
                "Please enter a valid Google Sheet ID".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("qaboard/", env!("CARGO_PKG_VERSION")))
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| BoardError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let url = format!(
            "{}/{}/values/{}?key={}",
            config.base_url.trim_end_matches('/'),
            urlencoding::encode(sheet_id),
            urlencoding::encode(&config.tab),
            urlencoding::encode(&config.api_key),
        );

        Ok(Self {
            client,
            url,
            sheet_id: sheet_id.to_string(),
            tab: config.tab.clone(),
        })
    }
}

#[async_trait]
impl RowSource for SheetsSource {
    async fn fetch_rows(&self) -> BoardResult<Grid> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| BoardError::FetchFailed(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BoardError::FetchFailed(format!(
                "API returned status: {}",
                status.as_u16()
            )));
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| BoardError::FetchFailed(format!("Invalid response body: {e}")))?;

        debug!(rows = body.values.len(), sheet = %self.sheet_id, "Fetched sheet values");

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    fn describe(&self) -> String {
        format!("sheet {} / {}", self.sheet_id, self.tab)
    }
}

/// Scripted in-memory source.
///
/// Queued responses are served first, one per fetch. Once the queue is
/// drained the last successful grid is served again, like a sheet nobody is
/// editing.
#[derive(Debug, Default)]
pub struct MemorySource {
    state: Mutex<MemoryState>,
    delay: Duration,
    fetches: AtomicUsize,
}

#[derive(Debug, Default)]
struct MemoryState {
    queue: VecDeque<BoardResult<Grid>>,
    current: Grid,
}

impl MemorySource {
    /// Create a source that serves `grid` until told otherwise.
    #[must_use]
    pub fn new(grid: Grid) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                queue: VecDeque::new(),
                current: grid,
            }),
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Delay every fetch, to hold a poll in flight.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a response for a future fetch.
    pub async fn push(&self, response: BoardResult<Grid>) {
        self.state.lock().await.queue.push_back(response);
    }

    /// Replace the grid served once the queue is drained.
    pub async fn set_rows(&self, grid: Grid) {
        self.state.lock().await.current = grid;
    }

    /// Number of fetches started so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn fetch_rows(&self) -> BoardResult<Grid> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut state = self.state.lock().await;
        match state.queue.pop_front() {
            Some(Ok(grid)) => {
                state.current.clone_from(&grid);
                Ok(grid)
            }
            Some(Err(e)) => Err(e),
            None => Ok(state.current.clone()),
        }
    }

    fn describe(&self) -> String {
        "in-memory sheet".to_string()
    }
}
