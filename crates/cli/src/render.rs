//! Plain-text rendering of the board.

use qaboard_core::{ModalView, Question};

/// Placeholder for an empty list.
pub const EMPTY_LIST: &str = "No questions found. Questions will appear here when submitted.";

/// `Submitted on Mar 14 at 10:00`, or the raw timestamp when it does not parse.
#[must_use]
pub fn submitted_label(question: &Question) -> String {
    match question.submitted_at() {
        Some(at) => format!("Submitted on {}", at.format("%b %-d at %H:%M")),
        None => format!("Submitted on {}", question.timestamp),
    }
}

fn list_line(question: &Question) -> String {
    let mut line = format!(
        "{:>3} {} {}",
        question.id,
        if question.answered { "[x]" } else { "[ ]" },
        question.question
    );
    if let Some(author) = &question.author {
        line.push_str(&format!(" ({author})"));
    }
    if question.votes > 0 {
        line.push_str(&format!(" +{}", question.votes));
    }
    if question.is_new {
        line.push_str(" NEW");
    }
    line
}

/// Render the view cache as a numbered list.
#[must_use]
pub fn render_list(view: &[Question]) -> String {
    if view.is_empty() {
        return EMPTY_LIST.to_string();
    }
    view.iter().map(list_line).collect::<Vec<_>>().join("\n")
}

/// Render the modal surface.
#[must_use]
pub fn render_modal(modal: &ModalView<'_>) -> String {
    match modal {
        ModalView::Hidden => "Viewer closed.".to_string(),
        ModalView::Empty { message } => (*message).to_string(),
        ModalView::Question {
            question,
            position,
            total,
            can_prev,
            can_next,
        } => {
            let prev = if *can_prev { "< prev" } else { "      " };
            let next = if *can_next { "next >" } else { "" };
            format!(
                "{}\n{}\n{prev}  {}/{}  {next}",
                question.question,
                submitted_label(question),
                position + 1,
                total
            )
            .trim_end()
            .to_string()
        }
    }
}
