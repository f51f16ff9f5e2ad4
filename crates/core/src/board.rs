//! Board controller.
//!
//! [`Board`] owns the canonical snapshot, the view cache and the modal cursor.
//! Every mutation goes through it, and every mutation ends with the view
//! being re-projected and the cursor re-anchored, so callers never observe a
//! stale view or an out-of-range cursor.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use qaboard_common::{BoardError, BoardResult, Config};
use tracing::{debug, info, warn};

use crate::cursor::{Cursor, CursorState, ModalAction, ModalView};
use crate::identity::{QuestionKey, strategy_from_name};
use crate::question::Question;
use crate::reconcile::{ColumnMapping, Reconciler, RowFilter, Rows, Snapshot};
use crate::view::{OrderingPolicy, project};

/// Empty modal message before the first successful connection.
pub const NOT_CONNECTED_MESSAGE: &str =
    "Questions will appear here once connected to your Google Sheet";

/// Empty modal message once connected.
pub const NO_QUESTIONS_MESSAGE: &str =
    "No questions available yet. Questions will appear once they are received.";

/// Default display grace for newly arrived questions.
pub const DEFAULT_NEW_GRACE: Duration = Duration::from_secs(2);

/// Board construction options.
#[derive(Debug, Clone)]
pub struct BoardOptions {
    /// Row merger.
    pub reconciler: Reconciler,
    /// Initial ordering policy.
    pub policy: OrderingPolicy,
    /// How long `is_new` stays set after arrival.
    pub new_grace: Duration,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            reconciler: Reconciler::default(),
            policy: OrderingPolicy::default(),
            new_grace: DEFAULT_NEW_GRACE,
        }
    }
}

impl BoardOptions {
    /// Build options from the application configuration.
    pub fn from_config(config: &Config) -> BoardResult<Self> {
        let keys = strategy_from_name(&config.board.key_strategy)?;
        let reconciler = Reconciler::new(
            ColumnMapping::from(&config.columns),
            RowFilter::from_strict(config.board.strict_rows),
            keys,
        );

        Ok(Self {
            reconciler,
            policy: config.board.sort.parse()?,
            new_grace: config.polling.new_grace(),
        })
    }
}

/// Summary of an applied reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    /// Live questions after the pass.
    pub total: usize,
    /// Questions seen for the first time.
    pub newly_arrived: usize,
}

/// Owned board state.
#[derive(Debug)]
pub struct Board {
    reconciler: Reconciler,
    policy: OrderingPolicy,
    new_grace: Duration,
    snapshot: Snapshot,
    view: Vec<Question>,
    cursor: Cursor,
    connected: bool,
    new_deadline: Option<Instant>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BoardOptions::default())
    }
}

impl Board {
    /// Create an empty board.
    #[must_use]
    pub fn new(options: BoardOptions) -> Self {
        Self {
            reconciler: options.reconciler,
            policy: options.policy,
            new_grace: options.new_grace,
            snapshot: Snapshot::default(),
            view: Vec::new(),
            cursor: Cursor::new(),
            connected: false,
            new_deadline: None,
        }
    }

    // === Read side ===

    /// Canonical questions in source order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.snapshot.questions
    }

    /// Canonical snapshot, tombstones included.
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// View cache in presentation order.
    #[must_use]
    pub fn view(&self) -> &[Question] {
        &self.view
    }

    /// Current ordering policy.
    #[must_use]
    pub const fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    /// Modal navigator state.
    #[must_use]
    pub const fn cursor(&self) -> &CursorState {
        self.cursor.state()
    }

    /// Whether the board has been connected to a source.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Deadline after which `is_new` flags are cleared.
    #[must_use]
    pub const fn new_flags_deadline(&self) -> Option<Instant> {
        self.new_deadline
    }

    /// Modal surface data.
    #[must_use]
    pub fn modal(&self) -> ModalView<'_> {
        let message = if self.connected {
            NO_QUESTIONS_MESSAGE
        } else {
            NOT_CONNECTED_MESSAGE
        };
        self.cursor.render(&self.view, message)
    }

    /// Key of a live question by its slot id.
    #[must_use]
    pub fn key_for_id(&self, id: usize) -> Option<QuestionKey> {
        self.snapshot
            .questions
            .iter()
            .find(|q| q.id == id)
            .map(|q| q.key.clone())
    }

    // === Internal ===

    fn refresh(&mut self) {
        self.view = project(&self.snapshot.questions, self.policy);
        self.cursor.on_data_refresh(&self.view);
    }

    /// Apply `f` to every record sharing `key`.
    ///
    /// Resubmitted duplicates are one logical question, so they always carry
    /// the same local state. Returns what `f` produced for the first record.
    fn update_all<T>(
        &mut self,
        key: &QuestionKey,
        mut f: impl FnMut(&mut Question) -> T,
    ) -> BoardResult<T> {
        let mut first = None;
        for q in self.snapshot.questions.iter_mut().filter(|q| &q.key == key) {
            let value = f(q);
            if first.is_none() {
                first = Some(value);
            }
        }
        first.ok_or_else(|| BoardError::UnknownQuestion(key.to_string()))
    }

    // === Source side ===

    /// Mark the board as connected to a source.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Reconcile fresh rows using the wall clock.
    pub fn apply_rows(&mut self, rows: &Rows) -> BoardResult<ApplyReport> {
        self.apply_rows_at(rows, Utc::now(), Instant::now())
    }

    /// Reconcile fresh rows at an explicit time.
    ///
    /// `now` stamps rows without a timestamp and `at` starts the display
    /// grace. On error the board is left untouched.
    pub fn apply_rows_at(
        &mut self,
        rows: &Rows,
        now: DateTime<Utc>,
        at: Instant,
    ) -> BoardResult<ApplyReport> {
        let result = self.reconciler.reconcile(&self.snapshot, rows, now)?;

        if result.defaulted_timestamps > 0 {
            warn!(
                count = result.defaulted_timestamps,
                column = %self.reconciler.mapping().timestamp,
                "Rows without timestamp stamped with the poll time"
            );
        }

        self.snapshot = result.snapshot;
        self.new_deadline = (result.newly_arrived > 0).then(|| at + self.new_grace);
        self.refresh();

        debug!(
            total = self.snapshot.questions.len(),
            new = result.newly_arrived,
            "Reconciled canonical set"
        );

        Ok(ApplyReport {
            total: self.snapshot.questions.len(),
            newly_arrived: result.newly_arrived,
        })
    }

    /// Clear `is_new` flags once the display grace has passed.
    ///
    /// Returns the number of flags cleared.
    pub fn expire_new_flags(&mut self, at: Instant) -> usize {
        match self.new_deadline {
            Some(deadline) if at >= deadline => {}
            _ => return 0,
        }
        self.new_deadline = None;

        let mut cleared = 0;
        for q in self.snapshot.questions.iter_mut().filter(|q| q.is_new) {
            q.is_new = false;
            cleared += 1;
        }
        self.refresh();
        cleared
    }

    // === Moderator side ===

    /// Change the ordering policy.
    pub fn set_policy(&mut self, policy: OrderingPolicy) {
        if self.policy != policy {
            debug!(from = %self.policy, to = %policy, "Ordering policy changed");
        }
        self.policy = policy;
        self.refresh();
    }

    /// Flip the answered flag. Returns the new value.
    pub fn toggle_answered(&mut self, key: &QuestionKey) -> BoardResult<bool> {
        let answered = !self
            .snapshot
            .get(key)
            .ok_or_else(|| BoardError::UnknownQuestion(key.to_string()))?
            .answered;
        self.update_all(key, |q| q.answered = answered)?;
        self.refresh();

        info!(key = %key, answered, "Toggled answered");
        Ok(answered)
    }

    /// Remove a question for the rest of the session.
    pub fn remove(&mut self, key: &QuestionKey) -> BoardResult<Question> {
        let index = self
            .snapshot
            .questions
            .iter()
            .position(|q| &q.key == key)
            .ok_or_else(|| BoardError::UnknownQuestion(key.to_string()))?;

        // Duplicate submissions share the key and go together.
        let mut removed = self.snapshot.questions.remove(index);
        self.snapshot.questions.retain(|q| &q.key != key);
        removed.removed = true;
        self.snapshot.tombstones.insert(key.clone());
        self.refresh();

        info!(key = %key, "Removed question");
        Ok(removed)
    }

    /// Add one vote. Returns the new count.
    pub fn upvote(&mut self, key: &QuestionKey) -> BoardResult<u32> {
        let votes = self.update_all(key, |q| {
            q.votes = q.votes.saturating_add(1);
            q.votes
        })?;
        self.refresh();
        Ok(votes)
    }

    // === Modal side ===

    /// Open the modal on a question, or on the empty state.
    pub fn open_on(&mut self, key: Option<&QuestionKey>) {
        self.refresh();
        self.cursor.open_on(&self.view, key);
    }

    /// Open the modal on the exact row with slot id `id`.
    ///
    /// Unlike [`Board::open_on`] this tells resubmitted duplicates apart.
    pub fn open_id(&mut self, id: usize) -> BoardResult<()> {
        self.refresh();
        let index = self
            .view
            .iter()
            .position(|q| q.id == id)
            .ok_or_else(|| BoardError::UnknownQuestion(format!("#{id}")))?;
        self.cursor.open_at(&self.view, index);
        Ok(())
    }

    /// Open the modal on the head of the view.
    pub fn open_first(&mut self) {
        self.refresh();
        self.cursor.open_first(&self.view);
    }

    /// Step to the next question.
    pub fn next(&mut self) {
        self.modal_action(ModalAction::Next);
    }

    /// Step to the previous question.
    pub fn prev(&mut self) {
        self.modal_action(ModalAction::Prev);
    }

    /// Close the modal.
    pub fn close(&mut self) {
        self.cursor.close();
    }

    /// Apply a modal action, e.g. from a key press.
    pub fn modal_action(&mut self, action: ModalAction) {
        self.refresh();
        self.cursor.apply(&self.view, action);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::derive_key;
    use chrono::TimeZone;

    fn rows(entries: &[(&str, &str)]) -> Vec<Vec<String>> {
        let mut out = vec![vec!["Timestamp".to_string(), "Your question".to_string()]];
        out.extend(
            entries
                .iter()
                .map(|(ts, q)| vec![(*ts).to_string(), (*q).to_string()]),
        );
        out
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    fn view_texts(board: &Board) -> Vec<&str> {
        board.view().iter().map(|q| q.question.as_str()).collect()
    }

    fn unsorted_board() -> Board {
        Board::new(BoardOptions {
            policy: OrderingPolicy::Unsorted,
            ..Default::default()
        })
    }

    const T1: &str = "3/14/2025 10:00:00";
    const T2: &str = "3/14/2025 11:00:00";
    const T3: &str = "3/14/2025 12:00:00";

    #[test]
    fn test_answered_survives_reconciliation() {
        let mut board = Board::default();
        board.apply_rows(&rows(&[(T1, "A"), (T2, "B")])).unwrap();
        board.toggle_answered(&derive_key("A", T1)).unwrap();
        board.upvote(&derive_key("A", T1)).unwrap();

        board.apply_rows(&rows(&[(T3, "C"), (T1, "A"), (T2, "B")])).unwrap();
        let a = board.snapshot().get(&derive_key("A", T1)).unwrap();
        assert!(a.answered);
        assert_eq!(a.votes, 1);
        assert_eq!(view_texts(&board), ["C", "B", "A"]);
    }

    #[test]
    fn test_toggle_is_immediately_visible() {
        let mut board = Board::default();
        board.apply_rows(&rows(&[(T1, "A"), (T2, "B")])).unwrap();
        assert_eq!(view_texts(&board), ["B", "A"]);

        assert!(board.toggle_answered(&derive_key("B", T2)).unwrap());
        assert_eq!(view_texts(&board), ["A", "B"]);

        assert!(!board.toggle_answered(&derive_key("B", T2)).unwrap());
        assert_eq!(view_texts(&board), ["B", "A"]);
    }

    #[test]
    fn test_removed_question_never_returns() {
        let mut board = Board::default();
        let fresh = rows(&[(T1, "A"), (T2, "B")]);
        board.apply_rows(&fresh).unwrap();

        let removed = board.remove(&derive_key("A", T1)).unwrap();
        assert!(removed.removed);
        assert_eq!(view_texts(&board), ["B"]);

        for _ in 0..3 {
            board.apply_rows(&fresh).unwrap();
            assert!(board.snapshot().get(&derive_key("A", T1)).is_none());
        }
        assert_eq!(board.questions().len(), 1);
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let mut board = Board::default();
        let err = board.toggle_answered(&derive_key("nope", T1)).unwrap_err();
        assert!(matches!(err, BoardError::UnknownQuestion(_)));
        assert!(board.remove(&derive_key("nope", T1)).is_err());
        assert!(board.upvote(&derive_key("nope", T1)).is_err());
    }

    #[test]
    fn test_column_missing_leaves_state_untouched() {
        let mut board = Board::default();
        board
            .apply_rows(&rows(&[(T1, "A"), (T2, "B"), (T3, "C")]))
            .unwrap();
        let before = board.snapshot().clone();

        let bad = vec![
            vec!["Timestamp".to_string(), "Other".to_string()],
            vec![T1.to_string(), "x".to_string()],
        ];
        let err = board.apply_rows(&bad).unwrap_err();
        assert_eq!(err, BoardError::ColumnNotFound("Your question".to_string()));
        assert_eq!(board.snapshot(), &before);
        assert_eq!(board.view().len(), 3);
    }

    #[test]
    fn test_new_flags_expire_after_grace() {
        let mut board = Board::default();
        let start = Instant::now();
        board.apply_rows_at(&rows(&[(T1, "A")]), now(), start).unwrap();
        assert!(board.new_flags_deadline().is_none());

        let report = board
            .apply_rows_at(&rows(&[(T1, "A"), (T2, "B")]), now(), start)
            .unwrap();
        assert_eq!(report.newly_arrived, 1);
        assert!(board.view().iter().any(|q| q.is_new));

        assert_eq!(board.expire_new_flags(start + Duration::from_millis(500)), 0);
        assert_eq!(board.expire_new_flags(start + DEFAULT_NEW_GRACE), 1);
        assert!(board.view().iter().all(|q| !q.is_new));
        assert!(board.new_flags_deadline().is_none());
    }

    #[test]
    fn test_zero_grace_clears_immediately() {
        let mut board = Board::new(BoardOptions {
            new_grace: Duration::ZERO,
            ..Default::default()
        });
        let start = Instant::now();
        board.apply_rows_at(&rows(&[(T1, "A")]), now(), start).unwrap();
        board
            .apply_rows_at(&rows(&[(T1, "A"), (T2, "B")]), now(), start)
            .unwrap();
        assert_eq!(board.expire_new_flags(start), 1);
    }

    #[test]
    fn test_cursor_follows_question_across_polls() {
        let mut board = unsorted_board();
        board.apply_rows(&rows(&[(T1, "A"), (T2, "B"), (T3, "C")])).unwrap();
        board.open_on(Some(&derive_key("B", T2)));

        board
            .apply_rows(&rows(&[("t0", "X"), (T1, "A"), (T2, "B"), (T3, "C")]))
            .unwrap();
        assert_eq!(
            board.cursor(),
            &CursorState::Focused {
                index: 2,
                key: derive_key("B", T2)
            }
        );
    }

    #[test]
    fn test_cursor_falls_back_when_focused_is_removed() {
        let mut board = unsorted_board();
        board.apply_rows(&rows(&[(T1, "A"), (T2, "B"), (T3, "C")])).unwrap();
        board.open_on(Some(&derive_key("B", T2)));

        board.remove(&derive_key("B", T2)).unwrap();
        match board.modal() {
            ModalView::Question { question, position, .. } => {
                assert_eq!(question.question, "A");
                assert_eq!(position, 0);
            }
            other => panic!("Expected question, got {other:?}"),
        }
    }

    #[test]
    fn test_cursor_stays_on_question_when_answered() {
        let mut board = unsorted_board();
        board.apply_rows(&rows(&[(T1, "A"), (T2, "B")])).unwrap();
        board.open_first();
        board.toggle_answered(&derive_key("A", T1)).unwrap();

        assert_eq!(
            board.cursor(),
            &CursorState::Focused {
                index: 1,
                key: derive_key("A", T1)
            }
        );
    }

    #[test]
    fn test_empty_modal_messages() {
        let mut board = Board::default();
        board.open_first();
        assert_eq!(
            board.modal(),
            ModalView::Empty {
                message: NOT_CONNECTED_MESSAGE
            }
        );

        board.mark_connected();
        assert_eq!(
            board.modal(),
            ModalView::Empty {
                message: NO_QUESTIONS_MESSAGE
            }
        );

        board.apply_rows(&rows(&[(T1, "A")])).unwrap();
        assert!(matches!(board.modal(), ModalView::Question { .. }));

        board.close();
        assert_eq!(board.modal(), ModalView::Hidden);
    }

    #[test]
    fn test_set_policy_keeps_focus() {
        let mut board = unsorted_board();
        board.apply_rows(&rows(&[(T1, "A"), (T2, "B"), (T3, "C")])).unwrap();
        board.open_first();

        board.set_policy(OrderingPolicy::Newest);
        assert_eq!(view_texts(&board), ["C", "B", "A"]);
        assert_eq!(board.cursor(), &CursorState::Focused {
            index: 2,
            key: derive_key("A", T1)
        });

        board.prev();
        assert_eq!(board.cursor(), &CursorState::Focused {
            index: 1,
            key: derive_key("B", T2)
        });
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::for_sheet("sheet");
        config.board.sort = "display".to_string();
        config.board.key_strategy = "text_author".to_string();
        config.polling.new_grace_ms = 0;

        let options = BoardOptions::from_config(&config).unwrap();
        assert_eq!(options.policy, OrderingPolicy::DisplayOrder);
        assert_eq!(options.new_grace, Duration::ZERO);
        assert_eq!(options.reconciler.key_strategy().name(), "text_author");

        config.board.sort = "sideways".to_string();
        assert!(BoardOptions::from_config(&config).is_err());
    }

    fn focused_index(board: &Board) -> Option<usize> {
        match board.cursor() {
            CursorState::Focused { index, .. } => Some(*index),
            _ => None,
        }
    }

    #[test]
    fn test_navigation_reaches_past_duplicates() {
        let mut board = unsorted_board();
        board
            .apply_rows(&rows(&[(T1, "A"), (T1, "A"), (T2, "B")]))
            .unwrap();
        board.open_first();

        let mut visited = Vec::new();
        for _ in 0..4 {
            board.next();
            visited.push(focused_index(&board).unwrap());
        }
        assert_eq!(visited, [1, 2, 2, 2]);

        // A poll with unchanged rows keeps focus on the same slot.
        board.prev();
        board
            .apply_rows(&rows(&[(T1, "A"), (T1, "A"), (T2, "B")]))
            .unwrap();
        assert_eq!(focused_index(&board), Some(1));
    }

    #[test]
    fn test_duplicate_state_survives_reconciliation() {
        let mut board = unsorted_board();
        let fresh = rows(&[(T1, "A"), (T1, "A")]);
        board.apply_rows(&fresh).unwrap();

        assert!(board.toggle_answered(&derive_key("A", T1)).unwrap());
        assert_eq!(board.upvote(&derive_key("A", T1)).unwrap(), 1);
        board.apply_rows(&fresh).unwrap();

        let answered: Vec<bool> = board.questions().iter().map(|q| q.answered).collect();
        let votes: Vec<u32> = board.questions().iter().map(|q| q.votes).collect();
        assert_eq!(answered, [true, true]);
        assert_eq!(votes, [1, 1]);

        assert!(!board.toggle_answered(&derive_key("A", T1)).unwrap());
        assert!(board.questions().iter().all(|q| !q.answered));
    }

    #[test]
    fn test_open_id_lands_on_exact_row() {
        let mut board = unsorted_board();
        board
            .apply_rows(&rows(&[(T1, "A"), (T1, "A"), (T2, "B")]))
            .unwrap();

        board.open_id(1).unwrap();
        assert_eq!(focused_index(&board), Some(1));

        board.open_on(Some(&derive_key("A", T1)));
        assert_eq!(focused_index(&board), Some(0));

        assert!(matches!(
            board.open_id(9),
            Err(BoardError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn test_key_for_id() {
        let mut board = Board::default();
        board.apply_rows(&rows(&[(T1, "A"), (T2, "B")])).unwrap();
        assert_eq!(board.key_for_id(1), Some(derive_key("B", T2)));
        assert_eq!(board.key_for_id(7), None);
    }
}
