//! Ordered projection of the canonical set.
//!
//! The view cache is never patched: every change to the canonical set or to
//! the ordering policy produces a fresh projection. All orderings are stable,
//! so ties keep source order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use qaboard_common::BoardError;
use serde::{Deserialize, Serialize};

use crate::question::Question;

/// Ordering policy selected by the moderator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Ascending manual display order; unordered records last.
    DisplayOrder,
    /// Unanswered first, then latest submission first.
    #[default]
    Newest,
    /// Unanswered first, then earliest submission first.
    Oldest,
    /// Unanswered first, source order otherwise.
    Unsorted,
}

impl OrderingPolicy {
    /// Name used in configuration and console commands.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DisplayOrder => "display",
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Unsorted => "default",
        }
    }
}

impl fmt::Display for OrderingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderingPolicy {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "display" | "display_order" => Ok(Self::DisplayOrder),
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "default" | "unsorted" | "" => Ok(Self::Unsorted),
            other => Err(BoardError::Config(format!("unknown sort method: {other}"))),
        }
    }
}

/// Unanswered before answered.
fn by_answered(a: &Question, b: &Question) -> Ordering {
    a.answered.cmp(&b.answered)
}

/// Present values before absent ones, regardless of direction.
fn present_first<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compare two questions under a policy.
#[must_use]
pub fn compare(policy: OrderingPolicy, a: &Question, b: &Question) -> Ordering {
    match policy {
        OrderingPolicy::DisplayOrder => present_first(a.display_rank(), b.display_rank(), false),
        OrderingPolicy::Newest => by_answered(a, b)
            .then_with(|| present_first(a.submitted_at(), b.submitted_at(), true)),
        OrderingPolicy::Oldest => by_answered(a, b)
            .then_with(|| present_first(a.submitted_at(), b.submitted_at(), false)),
        OrderingPolicy::Unsorted => by_answered(a, b),
    }
}

/// Project the canonical set into presentation order.
#[must_use]
pub fn project(questions: &[Question], policy: OrderingPolicy) -> Vec<Question> {
    let mut view = questions.to_vec();
    view.sort_by(|a, b| compare(policy, a, b));
    view
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::derive_key;

    fn question(id: usize, text: &str, timestamp: &str) -> Question {
        Question {
            id,
            key: derive_key(text, timestamp),
            question: text.to_string(),
            timestamp: timestamp.to_string(),
            author: None,
            display_order: None,
            votes: 0,
            answered: false,
            removed: false,
            is_new: false,
        }
    }

    fn texts(view: &[Question]) -> Vec<&str> {
        view.iter().map(|q| q.question.as_str()).collect()
    }

    fn sample() -> Vec<Question> {
        let mut a = question(0, "A", "3/14/2025 10:00:00");
        let b = question(1, "B", "3/14/2025 11:00:00");
        let c = question(2, "C", "3/14/2025 09:00:00");
        let d = question(3, "D", "not a date");
        a.answered = true;
        vec![a, b, c, d]
    }

    #[test]
    fn test_newest_puts_answered_last() {
        let view = project(&sample(), OrderingPolicy::Newest);
        assert_eq!(texts(&view), ["B", "C", "D", "A"]);
    }

    #[test]
    fn test_oldest_puts_answered_last() {
        let view = project(&sample(), OrderingPolicy::Oldest);
        assert_eq!(texts(&view), ["C", "B", "D", "A"]);
    }

    #[test]
    fn test_unsorted_only_partitions() {
        let view = project(&sample(), OrderingPolicy::Unsorted);
        assert_eq!(texts(&view), ["B", "C", "D", "A"]);
    }

    #[test]
    fn test_display_order_fallback() {
        let mut two = question(0, "two", "t");
        two.display_order = Some("2".to_string());
        let unordered = question(1, "none", "t");
        let mut one = question(2, "one", "t");
        one.display_order = Some("1".to_string());

        let view = project(&[two, unordered, one], OrderingPolicy::DisplayOrder);
        let orders: Vec<_> = view.iter().map(|q| q.display_order.as_deref()).collect();
        assert_eq!(orders, [Some("1"), Some("2"), None]);
    }

    #[test]
    fn test_display_order_ignores_answered() {
        let mut first = question(0, "first", "t");
        first.display_order = Some("1".to_string());
        first.answered = true;
        let mut second = question(1, "second", "t");
        second.display_order = Some("2".to_string());

        let view = project(&[second, first], OrderingPolicy::DisplayOrder);
        assert_eq!(texts(&view), ["first", "second"]);
    }

    #[test]
    fn test_display_order_ties_are_stable() {
        let mut a = question(0, "A", "t");
        a.display_order = Some("x".to_string());
        let b = question(1, "B", "t");
        let mut c = question(2, "C", "t");
        c.display_order = Some("5".to_string());

        let view = project(&[a, b, c], OrderingPolicy::DisplayOrder);
        assert_eq!(texts(&view), ["C", "A", "B"]);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let questions = sample();
        for policy in [
            OrderingPolicy::DisplayOrder,
            OrderingPolicy::Newest,
            OrderingPolicy::Oldest,
            OrderingPolicy::Unsorted,
        ] {
            let once = project(&questions, policy);
            assert_eq!(once, project(&questions, policy));
            assert_eq!(once, project(&once, policy));
        }
    }

    #[test]
    fn test_policy_names() {
        assert_eq!("display".parse::<OrderingPolicy>().unwrap(), OrderingPolicy::DisplayOrder);
        assert_eq!("newest".parse::<OrderingPolicy>().unwrap(), OrderingPolicy::Newest);
        assert_eq!("oldest".parse::<OrderingPolicy>().unwrap(), OrderingPolicy::Oldest);
        assert_eq!("default".parse::<OrderingPolicy>().unwrap(), OrderingPolicy::Unsorted);
        assert!("random".parse::<OrderingPolicy>().is_err());
        assert_eq!(OrderingPolicy::DisplayOrder.to_string(), "display");
    }
}
