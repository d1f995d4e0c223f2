//! Conversation history.

use serde::{Deserialize, Serialize};

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Append-only record of answered questions, oldest first.
///
/// Only successful answers are recorded; the engine appends after the model
/// call succeeds and never otherwise. The only way to shrink a history is to
/// replace it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has completed yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The most recent `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub(crate) fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ConversationTurn { question: question.into(), answer: answer.into() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_returns_tail_in_order() {
        let mut history = ConversationHistory::new();
        for i in 0..5 {
            history.push(format!("q{i}"), format!("a{i}"));
        }
        let recent: Vec<&str> = history.recent(2).iter().map(|t| t.question.as_str()).collect();
        assert_eq!(recent, vec!["q3", "q4"]);
        assert_eq!(history.recent(10).len(), 5);
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn round_trips_through_json() {
        let mut history = ConversationHistory::new();
        history.push("What?", "That.");
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(serde_json::from_str::<ConversationHistory>(&json).unwrap(), history);
    }
}
