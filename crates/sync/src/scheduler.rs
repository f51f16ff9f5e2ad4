//! Timer-driven polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info};

use crate::poller::{PollOutcome, Poller};

/// Owns the background poll loop.
///
/// Starting a schedule always cancels the previous one, so reconnecting or
/// changing the interval never leaves a second timer behind.
#[derive(Debug, Default)]
pub struct PollScheduler {
    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Start polling every `period`, replacing any running schedule.
    ///
    /// The first tick fires one period from now; callers connect first.
    pub fn start(&mut self, poller: Arc<Poller>, period: Duration) {
        self.stop();
        info!(period_ms = period.as_millis() as u64, "Starting poll schedule");
        self.handle = Some(tokio::spawn(run(poller, period)));
    }

    /// Cancel the running schedule, if any.
    ///
    /// A pass that is mid-fetch is dropped with the task and never reaches
    /// the board.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Poll schedule cancelled");
        }
    }

    /// Whether a schedule is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn wait_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

async fn run(poller: Arc<Poller>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    // A tick that comes due while a pass is running is dropped.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let deadline = poller.board().lock().await.new_flags_deadline();

        tokio::select! {
            _ = ticker.tick() => {
                if let PollOutcome::Applied(report) = poller.poll_once().await {
                    debug!(total = report.total, new = report.newly_arrived, "Poll applied");
                }
            }
            () = wait_until(deadline) => {
                let cleared = poller.expire_new_flags().await;
                debug!(cleared, "New flags expired");
            }
            () = poller.changed() => {}
        }
    }
}
