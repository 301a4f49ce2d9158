//! Conversation history management
//!
//! Keeps the full, append-only record of turns. Only the context view sent to
//! the model is bounded; nothing is ever dropped from the record itself.

use serde::{Deserialize, Serialize};

use crate::core::{Message, Result, Role, Turn};
use crate::llm::estimate_tokens;

/// Append-only sequence of turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Append several turns in order
    pub fn extend(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.turns.extend(turns);
    }

    /// Every turn ever appended
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Get the last N turns
    pub fn last_n(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Get the last assistant text
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == Role::Assistant)
            .find_map(Turn::text)
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Largest suffix whose estimated size fits in `budget` tokens
    ///
    /// Walks back from the newest turn and stops at the first turn that does
    /// not fit, so the result is always a contiguous suffix.
    pub fn context_view(&self, budget: u64) -> &[Turn] {
        let mut used = 0u64;
        let mut start = self.turns.len();

        for turn in self.turns.iter().rev() {
            let cost = estimate_turn(turn);
            if used + cost > budget {
                break;
            }
            used += cost;
            start -= 1;
        }

        &self.turns[start..]
    }

    /// Provider messages for the context view
    pub fn context_messages(&self, budget: u64) -> Vec<Message> {
        let view = self.context_view(budget);
        turns_to_messages(view, self.turns.len() - view.len())
    }

    /// Serialize to JSON bytes
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Estimated token size of one turn
pub fn estimate_turn(turn: &Turn) -> u64 {
    estimate_tokens(&turn.render())
}

/// Expand turns into provider messages
///
/// `offset` is the index of the first turn in the full history and seeds call
/// ids for tool turns that the provider did not label.
pub fn turns_to_messages(turns: &[Turn], offset: usize) -> Vec<Message> {
    turns
        .iter()
        .enumerate()
        .flat_map(|(i, turn)| turn.to_messages(offset + i))
        .collect()
}
