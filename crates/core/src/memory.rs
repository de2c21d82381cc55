use crate::ConversationTurn;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Rendered in place of the history when no turn has been saved yet.
pub const EMPTY_HISTORY: &str =
    "This is the beginning of our conversation. There is no prior history.";

/// Sliding window over the most recent question/answer pairs.
///
/// Holds at most `capacity` turns; saving past capacity evicts the oldest.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    capacity: usize,
    turns: VecDeque<ConversationTurn>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Oldest turn first. Never returns an empty string.
    pub fn load(&self) -> String {
        if self.turns.is_empty() {
            return EMPTY_HISTORY.to_string();
        }

        self.turns
            .iter()
            .map(|turn| format!("Human: {}\nAI: {}", turn.question, turn.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn save(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(ConversationTurn {
            question: question.into(),
            answer: answer.into(),
        });
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }
}
