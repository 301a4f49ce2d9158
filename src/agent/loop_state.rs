//! Turn loop state
//!
//! Everything one `run_turn` produces is staged here and only reaches the
//! session when the turn completes.

use crate::core::{ToolResult, Turn};

/// State of the tool round-trip loop for one user message
#[derive(Debug, Clone)]
pub struct TurnLoopState {
    /// LLM calls made so far
    pub round: usize,
    /// Maximum allowed LLM calls
    pub max_rounds: usize,
    /// Turns produced by this run, in causal order
    pub staged: Vec<Turn>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Successful search-tool calls
    pub searches: u32,
    /// Final answer once the model stops calling tools
    pub final_answer: Option<String>,
}

impl TurnLoopState {
    /// Start a loop for a user message
    pub fn new(user_turn: Turn, max_rounds: usize) -> Self {
        Self {
            round: 0,
            max_rounds: max_rounds.max(1),
            staged: vec![user_turn],
            input_tokens: 0,
            output_tokens: 0,
            searches: 0,
            final_answer: None,
        }
    }

    /// Check if another LLM call is allowed
    pub fn should_continue(&self) -> bool {
        self.round < self.max_rounds && self.final_answer.is_none()
    }

    /// Count the next LLM call
    pub fn next_round(&mut self) -> usize {
        self.round += 1;
        self.round
    }

    pub fn add_usage(&mut self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
    }

    pub fn stage(&mut self, turn: Turn) {
        self.staged.push(turn);
    }

    /// Tool turns staged so far
    pub fn tool_turns(&self) -> usize {
        self.staged.iter().filter(|t| t.tool_result().is_some()).count()
    }

    /// Results of the most recent tool turns, oldest first
    pub fn recent_results(&self, n: usize) -> Vec<&ToolResult> {
        let mut results: Vec<&ToolResult> = self
            .staged
            .iter()
            .rev()
            .filter_map(Turn::tool_result)
            .take(n)
            .collect();
        results.reverse();
        results
    }

    /// Assistant text used when the round limit is hit
    pub fn exhausted_message(&self) -> String {
        let mut output = format!(
            "Unable to complete the request within {} tool rounds.",
            self.max_rounds
        );

        let recent = self.recent_results(5);
        if !recent.is_empty() {
            output.push_str("\n\nLast tool outcomes:");
            for result in recent {
                let status = if result.ok { "ok" } else { "failed" };
                let detail = first_line(&result.observation());
                output.push_str(&format!("\n- {} ({}): {}", result.tool_name, status, detail));
            }
        }
        output
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > 120 {
        let cut: String = line.chars().take(120).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
