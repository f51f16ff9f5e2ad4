//! Core board logic for qaboard.
//!
//! - **Identity**: derived keys standing in for a primary key ([`identity`])
//! - **Reconciliation**: merging full re-fetches into the canonical set ([`reconcile`])
//! - **View cache**: ordered projections of the canonical set ([`view`])
//! - **Cursor**: the modal navigator over the view cache ([`cursor`])
//! - **Board**: the single owner of all of the above ([`Board`])

pub mod board;
pub mod cursor;
pub mod identity;
pub mod question;
pub mod reconcile;
pub mod view;

pub use board::{ApplyReport, Board, BoardOptions, NO_QUESTIONS_MESSAGE, NOT_CONNECTED_MESSAGE};
pub use cursor::{Cursor, CursorState, ModalAction, ModalView};
pub use identity::{KeyFields, KeyStrategy, QuestionKey, TextAuthorKey, TextTimestampKey, derive_key};
pub use question::Question;
pub use reconcile::{ColumnMapping, Reconciler, Reconciliation, RowFilter, Snapshot};
pub use view::{OrderingPolicy, project};
