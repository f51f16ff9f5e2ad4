//! Arrival notifications.
//!
//! Notifications are fire-and-forget: a notifier that cannot play its cue
//! stays silent and never reports failure back to the poller.

use std::io::Write;

use tracing::trace;

/// Cue fired when new questions arrive.
pub trait Notifier: Send + Sync {
    /// Called once per pass with the number of new questions (always > 0).
    fn notify_new(&self, count: usize);
}

/// Rings the terminal bell.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl Notifier for TerminalBell {
    fn notify_new(&self, count: usize) {
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(b"\x07").and_then(|()| stdout.flush()) {
            trace!(error = %e, count, "Terminal bell not available");
        }
    }
}

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify_new(&self, _count: usize) {}
}
