//! Turn executor
//!
//! Drives one user message to a final assistant answer: LLM call, tool calls
//! resolved in the order requested, repeat until the model answers or the
//! round limit is reached.
//!
//! All turns and usage are staged in a [`TurnLoopState`] and committed to the
//! session in one step after the last await. A provider error, or dropping the
//! future, leaves the session exactly as it was.

use std::sync::Arc;

use crate::agent::history::{estimate_turn, turns_to_messages};
use crate::agent::loop_state::TurnLoopState;
use crate::agent::retry::RetryEngine;
use crate::agent::session::{SessionState, TurnUsage};
use crate::core::{CodewrightError, Message, Result, ToolCategory, ToolDefinition, Turn};
use crate::llm::{
    estimate_messages_tokens, estimate_tokens, GenerateOptions, LLMProvider, LLMReply,
    LLMResponse, PricingTable,
};

/// Instructions sent ahead of every conversation
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a coding agent working inside the user's project.

## Tools
- `read_file`, `write_file`, `list_directory`: project files (paths are relative to the project root)
- `run_command`: run a shell command in the project root

## Rules
- Read a file before changing it.
- `write_file` refuses to replace an existing file unless `overwrite` is true.
- When a tool reports an error, read it carefully and decide the next step.
- Answer in plain text once the task is done."#;

/// Tunables for the turn loop
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub system_prompt: String,
    /// LLM calls allowed per user message
    pub max_round_trips: usize,
    /// Estimated tokens allowed for the outbound context
    pub context_budget_tokens: u64,
    pub options: GenerateOptions,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_round_trips: 10,
            context_budget_tokens: 32_000,
            options: GenerateOptions {
                temperature: Some(0.1), // Low temperature for tool selection
                ..Default::default()
            },
        }
    }
}

/// Result of one completed turn
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantResponse {
    /// Final assistant text
    pub text: String,
    /// Tool turns appended during the turn
    pub tool_turns: usize,
    /// LLM calls made
    pub round_trips: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Dollars charged for the turn
    pub cost: f64,
    /// Whether the turn ended at the round limit
    pub exhausted: bool,
}

/// Runs turns against a provider and tool engine
pub struct TurnExecutor {
    provider: Arc<dyn LLMProvider>,
    engine: RetryEngine,
    pricing: PricingTable,
    settings: ExecutorSettings,
}

impl TurnExecutor {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        engine: RetryEngine,
        pricing: PricingTable,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            provider,
            engine,
            pricing,
            settings,
        }
    }

    pub fn provider(&self) -> &dyn LLMProvider {
        self.provider.as_ref()
    }

    pub fn engine(&self) -> &RetryEngine {
        &self.engine
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run one user message to completion
    pub async fn run_turn(
        &self,
        session: &mut SessionState,
        user_text: &str,
    ) -> Result<AssistantResponse> {
        if user_text.trim().is_empty() {
            return Err(CodewrightError::invalid_input("message must not be empty"));
        }

        let model = session.model_id().to_string();
        let tools = self.engine.registry().definitions();
        let mut state =
            TurnLoopState::new(Turn::user(user_text), self.settings.max_round_trips);

        tracing::debug!(model = %model, max_rounds = state.max_rounds, "Starting turn");

        while state.should_continue() {
            let round = state.next_round();
            let messages = self.compose(session, &state.staged);
            tracing::debug!(model = %model, round, messages = messages.len(), "LLM call");

            let response = self.call(&model, &messages, &tools).await?;
            let (input_tokens, output_tokens) = usage_of(&messages, &response);
            state.add_usage(input_tokens, output_tokens);

            match response.into_reply() {
                LLMReply::Final(text) => {
                    state.final_answer = Some(text);
                }
                LLMReply::ToolRequest { calls, text } => {
                    tracing::debug!(round, calls = calls.len(), "Resolving tool calls");
                    let mut preamble = text;
                    for call in calls {
                        let resolution = self.engine.resolve(call).await;
                        if resolution.result.ok
                            && self.engine.registry().category(&resolution.call.name)
                                == Some(ToolCategory::Search)
                        {
                            state.searches += 1;
                        }
                        let mut turn = Turn::tool(resolution.call, resolution.result);
                        if let Some(text) = preamble.take() {
                            turn = turn.with_preamble(text);
                        }
                        state.stage(turn);
                    }
                }
            }
        }

        let exhausted = state.final_answer.is_none();
        let text = match state.final_answer.take() {
            Some(text) => text,
            None => {
                tracing::warn!(rounds = state.round, "Round limit reached without an answer");
                state.exhausted_message()
            }
        };

        let usage = TurnUsage {
            model_id: model.clone(),
            input_tokens: state.input_tokens,
            output_tokens: state.output_tokens,
            searches: state.searches,
        };
        let cost = usage.cost(&self.pricing);
        let tool_turns = state.tool_turns();

        state.stage(
            Turn::assistant(text.clone())
                .with_tokens(usage.input_tokens, usage.output_tokens)
                .with_ledger(model, cost),
        );
        session.commit_turn(state.staged, &usage, &self.pricing);

        Ok(AssistantResponse {
            text,
            tool_turns,
            round_trips: state.round,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost,
            exhausted,
        })
    }

    /// Messages the next LLM call would see, before the new user message
    pub fn preview(&self, session: &SessionState) -> Vec<Message> {
        self.compose(session, &[])
    }

    /// System prompt, then as much committed history as fits, then staged turns
    fn compose(&self, session: &SessionState, staged: &[Turn]) -> Vec<Message> {
        let reserved = estimate_tokens(&self.settings.system_prompt)
            + staged.iter().map(estimate_turn).sum::<u64>();
        let budget = self.settings.context_budget_tokens.saturating_sub(reserved);

        let history = session.history();
        let mut messages = vec![Message::system(self.settings.system_prompt.clone())];
        messages.extend(history.context_messages(budget));
        messages.extend(turns_to_messages(staged, history.len()));
        messages
    }

    async fn call(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        self.provider
            .chat_with_tools(model, messages, tools, Some(self.settings.options.clone()))
            .await
            .map_err(|e| {
                tracing::warn!(model, error = %e, "LLM call failed; turn discarded");
                if e.is_provider_error() {
                    e
                } else {
                    CodewrightError::provider(e.to_string())
                }
            })
    }
}

/// Token counts for one call: reported by the provider, else estimated
fn usage_of(messages: &[Message], response: &LLMResponse) -> (u64, u64) {
    if let Some(usage) = response.usage {
        return (usage.prompt_tokens as u64, usage.completion_tokens as u64);
    }

    let input = estimate_messages_tokens(messages);
    let output = estimate_tokens(&response.content)
        + response
            .tool_calls
            .iter()
            .map(|c| estimate_tokens(&c.name) + estimate_tokens(&c.arguments.to_string()))
            .sum::<u64>();
    (input, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Role, ToolCall};
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider that replays canned responses and records what it was sent
    struct Scripted {
        responses: Mutex<Vec<Result<LLMResponse>>>,
        sent: Mutex<Vec<Vec<Message>>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<LLMResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn chat_with_tools(
            &self,
            _model: &str,
            messages: &[Message],
            _tools: &[ToolDefinition],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            self.sent.lock().unwrap().push(messages.to_vec());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(LLMResponse::text("out of script"));
            }
            responses.remove(0)
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn executor(provider: Arc<Scripted>, settings: ExecutorSettings) -> TurnExecutor {
        let dir = std::env::temp_dir();
        let registry = Arc::new(ToolRegistry::with_builtins(dir, Duration::from_secs(5)));
        TurnExecutor::new(
            provider,
            RetryEngine::new(registry, 3, Duration::from_secs(5)),
            PricingTable::default(),
            settings,
        )
    }

    #[tokio::test]
    async fn test_final_answer_appends_two_turns() {
        let provider = Scripted::new(vec![Ok(LLMResponse::text("hello").with_usage(100, 10))]);
        let exec = executor(provider, ExecutorSettings::default());
        let mut session = SessionState::new("anthropic/claude-sonnet-4");

        let response = exec.run_turn(&mut session, "hi").await.unwrap();

        assert_eq!(response.text, "hello");
        assert_eq!(response.round_trips, 1);
        assert_eq!(session.history().len(), 2);
        let last = &session.history().turns()[1];
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.input_tokens, Some(100));
        assert_eq!(last.model_id.as_deref(), Some("anthropic/claude-sonnet-4"));
        assert_eq!(session.usage().input_tokens, 100);
        assert!(session.usage().cost > 0.0);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let exec = executor(Scripted::new(vec![]), ExecutorSettings::default());
        let mut session = SessionState::new("m");
        let err = exec.run_turn(&mut session, "   ").await.unwrap_err();
        assert!(matches!(err, CodewrightError::InvalidInput(_)));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_after_tool_round_discards_everything() {
        let provider = Scripted::new(vec![
            Ok(LLMResponse::tools(vec![ToolCall::new("list_directory", json!({}))])),
            Err(CodewrightError::provider("connection reset")),
        ]);
        let exec = executor(provider, ExecutorSettings::default());
        let mut session = SessionState::new("m");
        let before = session.clone();

        let err = exec.run_turn(&mut session, "look around").await.unwrap_err();
        assert!(err.is_provider_error());
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn test_round_limit_produces_terminal_answer() {
        let call = || Ok(LLMResponse::tools(vec![ToolCall::new("nope", json!({}))]));
        let provider = Scripted::new(vec![call(), call(), call()]);
        let settings = ExecutorSettings {
            max_round_trips: 2,
            ..Default::default()
        };
        let exec = executor(provider.clone(), settings);
        let mut session = SessionState::new("m");

        let response = exec.run_turn(&mut session, "loop").await.unwrap();

        assert!(response.exhausted);
        assert_eq!(response.round_trips, 2);
        assert_eq!(provider.sent.lock().unwrap().len(), 2);
        assert!(response.text.contains("within 2 tool rounds"));
        assert!(response.text.contains("unknown_tool"));
        // user + 2 tool turns + assistant
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn test_context_is_truncated_to_budget() {
        let provider = Scripted::new(vec![
            Ok(LLMResponse::text("a".repeat(400))),
            Ok(LLMResponse::text("ok")),
        ]);
        let settings = ExecutorSettings {
            system_prompt: "sys".into(),
            context_budget_tokens: 50,
            ..Default::default()
        };
        let exec = executor(provider.clone(), settings);
        let mut session = SessionState::new("m");

        exec.run_turn(&mut session, "first").await.unwrap();
        exec.run_turn(&mut session, "second").await.unwrap();

        let sent = provider.sent.lock().unwrap();
        let second_call = &sent[1];
        // The 100-token answer no longer fits, so nothing before it is replayed.
        assert_eq!(second_call.len(), 2);
        assert_eq!(second_call[0].role, "system");
        assert_eq!(second_call[1].content, "second");
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn test_usage_is_estimated_without_provider_counts() {
        let provider = Scripted::new(vec![Ok(LLMResponse::text("abcdefgh"))]);
        let settings = ExecutorSettings {
            system_prompt: "abcd".into(),
            ..Default::default()
        };
        let exec = executor(provider, settings);
        let mut session = SessionState::new("m");

        let response = exec.run_turn(&mut session, "abcd").await.unwrap();
        assert_eq!(response.input_tokens, 2);
        assert_eq!(response.output_tokens, 2);
    }
}
