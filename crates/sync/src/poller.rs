//! Poll-and-reconcile step.
//!
//! At most one pass runs at a time. A pass requested while another is in
//! flight is dropped, not queued, so two reconciliations can never install
//! their results out of order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use qaboard_common::{BoardError, BoardResult};
use qaboard_core::{ApplyReport, Board};
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::notify::Notifier;
use crate::source::{Grid, RowSource};
use crate::status::{Status, StatusKind};

/// Board shared between the poller and the moderator surface.
pub type SharedBoard = Arc<Mutex<Board>>;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another pass was in flight.
    Skipped,
    /// The source has no data rows; the board now shows an empty list.
    Empty,
    /// Rows were reconciled into the board.
    Applied(ApplyReport),
    /// The pass failed and the board was left untouched.
    Failed(BoardError),
}

/// Releases the single-flight flag when dropped, including on cancellation.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fetches rows from a source and reconciles them into the board.
pub struct Poller {
    source: Arc<dyn RowSource>,
    board: SharedBoard,
    notifier: Arc<dyn Notifier>,
    status: watch::Sender<Status>,
    in_flight: AtomicBool,
    changed: Notify,
}

impl Poller {
    /// Create a poller.
    pub fn new(
        source: Arc<dyn RowSource>,
        board: SharedBoard,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (status, _) = watch::channel(Status::idle());
        Self {
            source,
            board,
            notifier,
            status,
            in_flight: AtomicBool::new(false),
            changed: Notify::new(),
        }
    }

    /// The board this poller feeds.
    #[must_use]
    pub const fn board(&self) -> &SharedBoard {
        &self.board
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Latest status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Publish a status line.
    pub fn set_status(&self, status: Status) {
        self.status.send_replace(status);
    }

    /// Whether a pass is currently running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolves after the next pass that changed the board.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// First contact with the source.
    ///
    /// A failing source leaves the board disconnected and the error is
    /// returned so the caller does not start polling. An empty sheet counts
    /// as connected.
    pub async fn connect(&self) -> BoardResult<PollOutcome> {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            return Ok(PollOutcome::Skipped);
        };

        self.set_status(Status::connecting());
        info!(source = %self.source.describe(), "Connecting");

        let rows = match self.source.fetch_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Connection failed");
                self.set_status(Status::error(&e));
                return Err(e);
            }
        };

        self.board.lock().await.mark_connected();
        if rows.is_empty() {
            self.set_status(Status::empty_sheet());
        } else {
            self.set_status(Status::connected());
        }

        Ok(self.apply(&rows).await)
    }

    /// Run one pass unless another is in flight.
    pub async fn poll_once(&self) -> PollOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            debug!("Poll already in flight, dropping tick");
            return PollOutcome::Skipped;
        };

        match self.source.fetch_rows().await {
            Ok(rows) => self.apply(&rows).await,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Fetch failed");
                self.set_status(Status::error(&e));
                PollOutcome::Failed(e)
            }
        }
    }

    async fn apply(&self, rows: &Grid) -> PollOutcome {
        let result = {
            let mut board = self.board.lock().await;
            board.apply_rows_at(rows, Utc::now(), Instant::now().into_std())
        };

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Reconciliation rejected");
                self.set_status(Status::error(&e));
                return PollOutcome::Failed(e);
            }
        };
        self.changed.notify_waiters();

        if report.newly_arrived > 0 {
            info!(count = report.newly_arrived, "New questions received");
            self.set_status(Status::new_entries(report.newly_arrived));
            self.notifier.notify_new(report.newly_arrived);
        } else if self.should_restore_connected(report.total) {
            self.set_status(Status::connected());
        }

        if rows.len() <= 1 {
            PollOutcome::Empty
        } else {
            PollOutcome::Applied(report)
        }
    }

    /// A failed pass is over once a pass succeeds, and the empty-sheet
    /// warning is over once the sheet has questions.
    fn should_restore_connected(&self, total: usize) -> bool {
        match self.status.borrow().kind {
            StatusKind::Error => true,
            StatusKind::Warning => total > 0,
            _ => false,
        }
    }

    /// Clear expired `is_new` flags.
    pub async fn expire_new_flags(&self) -> usize {
        let cleared = self
            .board
            .lock()
            .await
            .expire_new_flags(Instant::now().into_std());
        if cleared > 0 {
            self.changed.notify_waiters();
        }
        cleared
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;
    use crate::source::MemorySource;

    #[test]
    fn test_flight_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let guard = FlightGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(FlightGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(FlightGuard::acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn test_failed_connect_stays_disconnected() {
        let source = MemorySource::new(Vec::new());
        source
            .push(Err(BoardError::FetchFailed("API returned status: 403".to_string())))
            .await;
        let board: SharedBoard = Arc::new(Mutex::new(Board::default()));
        let poller = Poller::new(Arc::new(source), board.clone(), Arc::new(NoopNotifier));

        assert!(poller.connect().await.is_err());
        assert!(!board.lock().await.is_connected());
        assert_eq!(poller.status().message, "Error: API returned status: 403");
    }

    #[tokio::test]
    async fn test_empty_sheet_connects() {
        let board: SharedBoard = Arc::new(Mutex::new(Board::default()));
        let poller = Poller::new(
            Arc::new(MemorySource::new(Vec::new())),
            board.clone(),
            Arc::new(NoopNotifier),
        );

        assert_eq!(poller.connect().await.unwrap(), PollOutcome::Empty);
        assert!(board.lock().await.is_connected());
        assert_eq!(poller.status(), Status::empty_sheet());
    }

    #[tokio::test]
    async fn test_empty_sheet_warning_clears_when_rows_arrive() {
        let source = Arc::new(MemorySource::new(Vec::new()));
        let board: SharedBoard = Arc::new(Mutex::new(Board::default()));
        let poller = Poller::new(source.clone(), board.clone(), Arc::new(NoopNotifier));
        poller.connect().await.unwrap();

        // Still empty: the warning stays.
        poller.poll_once().await;
        assert_eq!(poller.status(), Status::empty_sheet());

        source
            .set_rows(vec![
                vec!["Timestamp".to_string(), "Your question".to_string()],
                vec!["3/14/2025 10:00:00".to_string(), "A".to_string()],
            ])
            .await;
        assert!(matches!(poller.poll_once().await, PollOutcome::Applied(_)));
        assert_eq!(poller.status(), Status::connected());
        assert_eq!(board.lock().await.view().len(), 1);
    }
}
