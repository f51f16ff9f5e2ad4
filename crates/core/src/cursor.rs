//! Single-question navigator behind the modal viewer.
//!
//! The cursor is an index into the view cache plus the key of the focused
//! question. Whenever the view is rebuilt the cursor re-locates its key, so
//! focus follows the question rather than the slot.
//!
//! Invariant: in `Focused` the index is always within `0..view.len()`, and
//! `Empty` is the only open state for an empty view.

use serde::Serialize;

use crate::identity::QuestionKey;
use crate::question::Question;

/// Navigator state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CursorState {
    /// Modal closed.
    #[default]
    Unfocused,
    /// Modal showing the question at `index`.
    Focused {
        /// Position in the view cache.
        index: usize,
        /// Key of the focused question.
        key: QuestionKey,
    },
    /// Modal open with nothing to show.
    Empty,
}

/// Actions emitted by the modal surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalAction {
    /// Step to the next question.
    Next,
    /// Step to the previous question.
    Prev,
    /// Close the modal.
    Close,
}

impl ModalAction {
    /// Map a keyboard key name to an action.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowRight" | "ArrowDown" => Some(Self::Next),
            "ArrowLeft" | "ArrowUp" => Some(Self::Prev),
            "Escape" => Some(Self::Close),
            _ => None,
        }
    }
}

/// What the modal surface should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ModalView<'a> {
    /// Modal closed.
    Hidden,
    /// A single question with navigation affordances.
    #[serde(rename_all = "camelCase")]
    Question {
        /// Focused question.
        question: &'a Question,
        /// Zero-based position in the view.
        position: usize,
        /// Length of the view.
        total: usize,
        /// Whether the previous button is live.
        can_prev: bool,
        /// Whether the next button is live.
        can_next: bool,
    },
    /// Empty state with an explanatory message.
    Empty {
        /// Message to show instead of a question.
        message: &'static str,
    },
}

fn position_of(view: &[Question], key: &QuestionKey) -> Option<usize> {
    view.iter().position(|q| &q.key == key)
}

/// Modal navigator.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    state: CursorState,
}

impl Cursor {
    /// Create a closed cursor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: CursorState::Unfocused,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &CursorState {
        &self.state
    }

    /// Whether the modal is open, with or without a question.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.state, CursorState::Unfocused)
    }

    /// Key of the focused question.
    #[must_use]
    pub const fn focused_key(&self) -> Option<&QuestionKey> {
        match &self.state {
            CursorState::Focused { key, .. } => Some(key),
            _ => None,
        }
    }

    fn focus(&mut self, view: &[Question], index: usize) {
        self.state = match view.get(index) {
            Some(q) => CursorState::Focused {
                index,
                key: q.key.clone(),
            },
            None => CursorState::Empty,
        };
    }

    /// Open on a question, or on the empty state when it is absent.
    pub fn open_on(&mut self, view: &[Question], key: Option<&QuestionKey>) {
        match key.and_then(|k| position_of(view, k)) {
            Some(index) => self.focus(view, index),
            None => self.state = CursorState::Empty,
        }
    }

    /// Open on the first question of the view, or on the empty state.
    pub fn open_first(&mut self, view: &[Question]) {
        self.focus(view, 0);
    }

    /// Open on an exact slot of the view, or on the empty state when the
    /// slot is out of range.
    pub fn open_at(&mut self, view: &[Question], index: usize) {
        self.focus(view, index);
    }

    /// Re-locate focus after the view was rebuilt.
    ///
    /// Focus stays put while its slot still holds the focused key, so
    /// resubmitted duplicates sharing a key remain distinct stops. Otherwise
    /// the key is searched for, and a question that vanished hands focus to
    /// the head of the view. An open empty state picks up the head as soon
    /// as there is one.
    pub fn on_data_refresh(&mut self, view: &[Question]) {
        let index = match &self.state {
            CursorState::Unfocused => return,
            CursorState::Focused { index, key } => {
                if view.get(*index).is_some_and(|q| &q.key == key) {
                    *index
                } else {
                    position_of(view, key).unwrap_or(0)
                }
            }
            CursorState::Empty => 0,
        };
        self.focus(view, index);
    }

    /// Step forward. Inert at the last question.
    pub fn next(&mut self, view: &[Question]) {
        self.on_data_refresh(view);
        if let CursorState::Focused { index, .. } = self.state {
            if index + 1 < view.len() {
                self.focus(view, index + 1);
            }
        }
    }

    /// Step back. Inert at the first question.
    pub fn prev(&mut self, view: &[Question]) {
        self.on_data_refresh(view);
        if let CursorState::Focused { index, .. } = self.state {
            if index > 0 {
                self.focus(view, index - 1);
            }
        }
    }

    /// Close the modal from any state.
    pub fn close(&mut self) {
        self.state = CursorState::Unfocused;
    }

    /// Apply a modal action.
    pub fn apply(&mut self, view: &[Question], action: ModalAction) {
        match action {
            ModalAction::Next => self.next(view),
            ModalAction::Prev => self.prev(view),
            ModalAction::Close => self.close(),
        }
    }

    /// Focused question, if any.
    #[must_use]
    pub fn current<'a>(&self, view: &'a [Question]) -> Option<&'a Question> {
        match self.state {
            CursorState::Focused { index, .. } => view.get(index),
            _ => None,
        }
    }

    /// Build the modal surface data.
    #[must_use]
    pub fn render<'a>(&self, view: &'a [Question], empty_message: &'static str) -> ModalView<'a> {
        match self.state {
            CursorState::Unfocused => ModalView::Hidden,
            CursorState::Empty => ModalView::Empty {
                message: empty_message,
            },
            CursorState::Focused { index, .. } => match view.get(index) {
                Some(question) => ModalView::Question {
                    question,
                    position: index,
                    total: view.len(),
                    can_prev: index > 0,
                    can_next: index + 1 < view.len(),
                },
                None => ModalView::Empty {
                    message: empty_message,
                },
            },
        }
    }
}
