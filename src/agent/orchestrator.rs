//! Agent orchestrator
//!
//! Owns the session and wires the provider, tool registry, retry engine and
//! pricing table together. This is the surface the CLI talks to.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::executor::{
    AssistantResponse, ExecutorSettings, TurnExecutor, DEFAULT_SYSTEM_PROMPT,
};
use crate::agent::retry::RetryEngine;
use crate::agent::session::{SessionSnapshot, SessionState, UsageSummary};
use crate::core::{CodewrightError, Config, Message, Result, Turn};
use crate::llm::{create_provider, LLMProvider, PricingTable};
use crate::tools::ToolRegistry;

/// Main agent that orchestrates LLM and tools
pub struct Orchestrator {
    /// Configuration
    config: Config,
    executor: TurnExecutor,
    session: SessionState,
}

impl Orchestrator {
    /// Create an orchestrator for the configured provider and built-in tools
    pub fn new(config: Config) -> Result<Self> {
        let provider = create_provider(&config)?;
        let registry = ToolRegistry::with_builtins(
            config.agent.workspace.clone(),
            Duration::from_secs(config.agent.tool_timeout_secs),
        );
        Ok(Self::with_parts(config, provider, registry))
    }

    /// Create an orchestrator from explicit parts
    pub fn with_parts(
        config: Config,
        provider: Arc<dyn LLMProvider>,
        registry: ToolRegistry,
    ) -> Self {
        let engine = RetryEngine::new(
            Arc::new(registry),
            config.agent.max_tool_attempts,
            Duration::from_secs(config.agent.tool_timeout_secs),
        );

        let settings = ExecutorSettings {
            system_prompt: config
                .agent
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_round_trips: config.agent.max_round_trips,
            context_budget_tokens: config.agent.context_budget_tokens as u64,
            ..ExecutorSettings::default()
        };

        let executor = TurnExecutor::new(
            provider,
            engine,
            PricingTable::from_config(&config.pricing),
            settings,
        );
        let session = SessionState::new(config.models.active.clone());

        Self {
            config,
            executor,
            session,
        }
    }

    /// Check that the provider is reachable and serves the active model
    pub async fn initialize(&self) -> Result<()> {
        let provider = self.executor.provider();
        let model = self.session.model_id();

        let models = provider.list_models().await?;
        tracing::debug!(provider = provider.name(), count = models.len(), "Available models");

        if !provider.is_model_available(model).await? {
            return Err(CodewrightError::ModelNotFound(model.to_string()));
        }
        Ok(())
    }

    /// Process one user message and return the assistant's answer
    pub async fn submit(&mut self, text: &str) -> Result<String> {
        Ok(self.submit_detailed(text).await?.text)
    }

    /// Process one user message, returning the full turn report
    pub async fn submit_detailed(&mut self, text: &str) -> Result<AssistantResponse> {
        self.executor.run_turn(&mut self.session, text).await
    }

    /// Switch the model used for future turns
    pub fn switch_model(&mut self, model_id: &str) -> Result<String> {
        self.session.switch_model(model_id)?;
        let model = self.session.model_id();
        let rate = self.executor.pricing().rate(model);

        let mut message = format!(
            "Switched to {} (${:.2} in / ${:.2} out per 1M tokens)",
            model, rate.input_per_million, rate.output_per_million
        );
        if !self.executor.pricing().is_known(model) {
            message.push_str(" [unknown model, default rate]");
        }
        Ok(message)
    }

    /// Drop all history and reset usage counters
    pub fn clear(&mut self) {
        self.session.clear();
        tracing::info!("Session cleared");
    }

    /// Write a snapshot of the session to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        self.session.snapshot().save(path)
    }

    /// Replace the session with the snapshot at `path`
    ///
    /// The current session is kept if the snapshot cannot be read.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let snapshot = SessionSnapshot::load(path)?;
        self.session = SessionState::restore(snapshot, &self.config.models.active);
        Ok(())
    }

    /// Pick up the snapshot at `path` if there is one, then apply `pinned_model`
    ///
    /// A model chosen on the command line wins over the one stored in the
    /// snapshot. Returns whether a snapshot was loaded.
    pub fn resume(&mut self, path: &Path, pinned_model: Option<&str>) -> Result<bool> {
        let loaded = if path.exists() {
            self.load(path)?;
            true
        } else {
            false
        };

        if let Some(model) = pinned_model {
            if model != self.session.model_id() {
                tracing::info!(
                    snapshot_model = %self.session.model_id(),
                    model,
                    "Using the requested model instead of the stored one"
                );
                self.session.switch_model(model)?;
            }
        }
        Ok(loaded)
    }

    pub fn usage_summary(&self) -> UsageSummary {
        self.session.usage()
    }

    /// Full record, including turns outside the context window
    pub fn history(&self) -> &[Turn] {
        self.session.history().turns()
    }

    /// What the next LLM call would be sent before the new user message
    pub fn context_preview(&self) -> Vec<Message> {
        self.executor.preview(&self.session)
    }

    pub fn model_id(&self) -> &str {
        self.session.model_id()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Get current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pricing(&self) -> &PricingTable {
        self.executor.pricing()
    }

    /// Registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.executor.engine().registry().tool_names()
    }

    pub fn provider_name(&self) -> &str {
        self.executor.provider().name()
    }

    /// List models served by the provider
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.executor.provider().list_models().await
    }

    /// Enable debug mode
    pub fn set_debug(&mut self, debug: bool) {
        self.config.agent.debug = debug;
    }

    pub fn is_debug(&self) -> bool {
        self.config.agent.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_take_config_values_and_executor_defaults() {
        let mut config = Config::default();
        config.agent.max_round_trips = 4;
        config.agent.context_budget_tokens = 1_000;
        let provider = create_provider(&config).unwrap();
        let agent = Orchestrator::with_parts(config, provider, ToolRegistry::new());

        let settings = agent.executor.settings();
        let defaults = ExecutorSettings::default();
        assert_eq!(settings.max_round_trips, 4);
        assert_eq!(settings.context_budget_tokens, 1_000);
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(settings.options.temperature, defaults.options.temperature);
        assert_eq!(settings.options.max_tokens, defaults.options.max_tokens);
    }
}
