//! Session state and persistence
//!
//! `SessionState` is the long-lived aggregate: full history, the active model
//! and cumulative usage counters. Snapshots are plain JSON documents.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::history::History;
use crate::core::{CodewrightError, Result, Turn};
use crate::llm::PricingTable;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Cumulative usage for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

/// Usage of one completed turn, attributed to the model that served it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnUsage {
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Successful search-tool calls
    pub searches: u32,
}

impl TurnUsage {
    /// Dollar cost at this turn's model rate
    pub fn cost(&self, pricing: &PricingTable) -> f64 {
        pricing.cost(
            &self.model_id,
            self.input_tokens,
            self.output_tokens,
            self.searches,
        )
    }
}

/// Live state of one conversation
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    history: History,
    model_id: String,
    cumulative_input_tokens: u64,
    cumulative_output_tokens: u64,
    cumulative_cost: f64,
    created_at: DateTime<Utc>,
}

impl SessionState {
    /// Start an empty session on a model
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            history: History::new(),
            model_id: model_id.into(),
            cumulative_input_tokens: 0,
            cumulative_output_tokens: 0,
            cumulative_cost: 0.0,
            created_at: Utc::now(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn usage(&self) -> UsageSummary {
        UsageSummary {
            input_tokens: self.cumulative_input_tokens,
            output_tokens: self.cumulative_output_tokens,
            cost: self.cumulative_cost,
        }
    }

    /// Commit a completed turn: its turns, then its usage
    ///
    /// Nothing in here suspends, so a turn is either fully committed or not
    /// at all.
    pub(crate) fn commit_turn(
        &mut self,
        turns: Vec<Turn>,
        usage: &TurnUsage,
        pricing: &PricingTable,
    ) -> f64 {
        self.history.extend(turns);
        self.record_usage(usage, pricing)
    }

    /// Add one completed turn's usage to the cumulative counters
    ///
    /// Priced at `usage.model_id`, never at whatever model is active later.
    /// Returns the cost charged.
    pub fn record_usage(&mut self, usage: &TurnUsage, pricing: &PricingTable) -> f64 {
        let cost = usage.cost(pricing);
        self.cumulative_input_tokens += usage.input_tokens;
        self.cumulative_output_tokens += usage.output_tokens;
        self.cumulative_cost += cost;
        tracing::debug!(
            model = %usage.model_id,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            searches = usage.searches,
            cost,
            total_cost = self.cumulative_cost,
            "usage recorded"
        );
        cost
    }

    /// Change the model used for future calls and future pricing
    pub fn switch_model(&mut self, model_id: impl Into<String>) -> Result<()> {
        let model_id = model_id.into();
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(CodewrightError::invalid_input("model id must not be empty"));
        }
        tracing::info!(from = %self.model_id, to = %model_id, "Switching model");
        self.model_id = model_id.to_string();
        Ok(())
    }

    /// Reset history and counters, keeping the active model
    pub fn clear(&mut self) {
        self.history.clear();
        self.cumulative_input_tokens = 0;
        self.cumulative_output_tokens = 0;
        self.cumulative_cost = 0.0;
        self.created_at = Utc::now();
    }

    /// Capture the full state
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            history: self.history.clone(),
            model_id: Some(self.model_id.clone()),
            cumulative_input_tokens: self.cumulative_input_tokens,
            cumulative_output_tokens: self.cumulative_output_tokens,
            cumulative_cost: self.cumulative_cost,
            created_at: Some(self.created_at),
        }
    }

    /// Rebuild state from a snapshot
    ///
    /// Snapshots written without a model fall back to `default_model`.
    pub fn restore(snapshot: SessionSnapshot, default_model: &str) -> Self {
        if snapshot.version > SNAPSHOT_VERSION {
            tracing::warn!(
                version = snapshot.version,
                "Snapshot is newer than this build; loading known fields"
            );
        }
        Self {
            history: snapshot.history,
            model_id: snapshot
                .model_id
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            cumulative_input_tokens: snapshot.cumulative_input_tokens,
            cumulative_output_tokens: snapshot.cumulative_output_tokens,
            cumulative_cost: snapshot.cumulative_cost,
            created_at: snapshot.created_at.unwrap_or_else(Utc::now),
        }
    }
}

fn snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Persisted form of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default = "snapshot_version")]
    pub version: u32,
    pub history: History,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub cumulative_input_tokens: u64,
    #[serde(default)]
    pub cumulative_output_tokens: u64,
    #[serde(default)]
    pub cumulative_cost: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    /// Encode as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| CodewrightError::session(format!("invalid session snapshot: {}", e)))
    }

    /// Write to `path`, replacing any previous snapshot atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CodewrightError::with_context(format!("creating {}", parent.display()), e)
            })?;
        }

        let mut tmp_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| {
                CodewrightError::session(format!("not a file path: {}", path.display()))
            })?;
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        std::fs::write(&tmp, self.to_json()?).map_err(|e| {
            CodewrightError::with_context(format!("writing {}", tmp.display()), e)
        })?;
        std::fs::rename(&tmp, path).map_err(|e| {
            CodewrightError::with_context(format!("replacing {}", path.display()), e)
        })?;

        tracing::info!(path = %path.display(), turns = self.history.len(), "Session saved");
        Ok(())
    }

    /// Read from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            CodewrightError::session(format!("cannot read {}: {}", path.display(), e))
        })?;
        let snapshot = Self::from_json(&data)?;
        tracing::info!(path = %path.display(), turns = snapshot.history.len(), "Session loaded");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ToolCall, ToolResult};
    use serde_json::json;

    fn usage(model: &str, input_tokens: u64, output_tokens: u64) -> TurnUsage {
        TurnUsage {
            model_id: model.to_string(),
            input_tokens,
            output_tokens,
            searches: 0,
        }
    }

    fn populated() -> SessionState {
        let mut session = SessionState::new("openai/gpt-4o");
        let pricing = PricingTable::default();
        session.commit_turn(
            vec![
                Turn::user("make a file"),
                Turn::tool(
                    ToolCall::new("write_file", json!({"path": "a", "content": "b"})),
                    ToolResult::success("write_file", "Created a (1 bytes)", 1),
                ),
                Turn::assistant("done").with_ledger("openai/gpt-4o", 0.0045),
            ],
            &usage("openai/gpt-4o", 1000, 200),
            &pricing,
        );
        session
    }

    #[test]
    fn test_record_usage_accumulates_at_turn_rate() {
        let pricing = PricingTable::default();
        let mut session = SessionState::new("mystery-model");

        // default rate: $3 in / $15 out per million
        let first = session.record_usage(&usage("mystery-model", 1_000_000, 0), &pricing);
        let second =
            session.record_usage(&usage("anthropic/claude-opus-4", 0, 1_000_000), &pricing);

        assert!((first - 3.0).abs() < 1e-9);
        assert!((second - 75.0).abs() < 1e-9);
        let total = session.usage();
        assert_eq!(total.input_tokens, 1_000_000);
        assert_eq!(total.output_tokens, 1_000_000);
        assert!((total.cost - 78.0).abs() < 1e-9);
    }

    #[test]
    fn test_switch_model_keeps_ledger() {
        let mut session = populated();
        session.switch_model("anthropic/claude-sonnet-4").unwrap();
        assert_eq!(session.model_id(), "anthropic/claude-sonnet-4");
        let before = session.usage().cost;
        assert!(before > 0.0);
        assert_eq!(session.usage().cost, before);
        assert_eq!(
            session.history().turns()[2].model_id.as_deref(),
            Some("openai/gpt-4o")
        );
        assert!(session.switch_model("  ").is_err());
        assert_eq!(session.model_id(), "anthropic/claude-sonnet-4");
    }

    #[test]
    fn test_clear_resets_everything_but_model() {
        let mut session = populated();
        session.clear();
        assert!(session.history().is_empty());
        assert_eq!(session.usage(), UsageSummary::default());
        assert_eq!(session.model_id(), "openai/gpt-4o");
    }

    #[test]
    fn test_snapshot_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let session = populated();

        session.snapshot().save(&path).unwrap();
        let restored = SessionState::restore(SessionSnapshot::load(&path).unwrap(), "other");

        assert_eq!(restored, session);
        assert!(!dir.path().join("nested").join("session.json.tmp").exists());
    }

    #[test]
    fn test_old_snapshot_defaults_missing_fields() {
        let data = r#"{"history": [{"role": "user", "content": {"type": "text", "text": "hi"}, "timestamp": "2025-01-01T00:00:00Z"}]}"#;
        let snapshot = SessionSnapshot::from_json(data).unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);

        let session = SessionState::restore(snapshot, "qwen3:8b");
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.model_id(), "qwen3:8b");
        assert_eq!(session.usage(), UsageSummary::default());
    }

    #[test]
    fn test_garbage_snapshot_is_session_error() {
        let err = SessionSnapshot::from_json("{not json").unwrap_err();
        assert!(matches!(err, CodewrightError::Session(_)));
    }
}
