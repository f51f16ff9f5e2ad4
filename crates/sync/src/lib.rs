//! Source polling for qaboard.
//!
//! This crate connects a [`Board`](qaboard_core::Board) to its remote data:
//!
//! - **Sources**: Google Sheets values API and an in-memory script
//! - **Poller**: single-flight fetch-and-reconcile passes
//! - **Scheduler**: cancellable periodic polling
//! - **Status**: the user-visible status line
//! - **Notifier**: best-effort arrival cue

pub mod notify;
pub mod poller;
pub mod scheduler;
pub mod source;
pub mod status;

pub use notify::{NoopNotifier, Notifier, TerminalBell};
pub use poller::{PollOutcome, Poller, SharedBoard};
pub use scheduler::PollScheduler;
pub use source::{Grid, MemorySource, RowSource, SheetsSource};
pub use status::{Status, StatusKind};
