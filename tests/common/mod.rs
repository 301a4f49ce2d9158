//! Shared test doubles: a scripted LLM provider and tool handlers

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use codewright::agent::Orchestrator;
use codewright::core::{CodewrightError, Message, Result, ToolCall, ToolDefinition, ToolOutput};
use codewright::llm::{GenerateOptions, LLMProvider, LLMResponse};
use codewright::tools::{ToolHandler, ToolRegistry};
use codewright::Config;

/// One scripted provider step
pub enum Step {
    Reply(LLMResponse),
    Fail(String),
    /// Never returns
    Hang,
}

/// What the provider was asked
#[derive(Debug, Clone)]
pub struct SentCall {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Provider that replays a script and records every request
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    sent: Mutex<Vec<SentCall>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn sent(&self) -> Vec<SentCall> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.sent.lock().unwrap().push(SentCall {
            model: model.to_string(),
            messages: messages.to_vec(),
        });

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(CodewrightError::provider(message)),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(CodewrightError::provider("script exhausted")),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["anthropic/claude-sonnet-4".to_string()])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Handler that always returns the same output and counts calls
pub struct FixedHandler {
    output: ToolOutput,
    pub calls: Mutex<Vec<Value>>,
}

impl FixedHandler {
    pub fn new(output: ToolOutput) -> Arc<Self> {
        Arc::new(Self {
            output,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolHandler for FixedHandler {
    async fn call(&self, arguments: &Value) -> ToolOutput {
        self.calls.lock().unwrap().push(arguments.clone());
        self.output.clone()
    }
}

/// Handler that never finishes
pub struct HangingHandler;

#[async_trait]
impl ToolHandler for HangingHandler {
    async fn call(&self, _arguments: &Value) -> ToolOutput {
        std::future::pending().await
    }
}

pub const PRICED_MODEL: &str = "anthropic/claude-sonnet-4";

/// Test configuration rooted at a workspace directory
pub fn config(workspace: &Path) -> Config {
    let mut config = Config::default();
    config.models.active = PRICED_MODEL.to_string();
    config.agent.workspace = workspace.to_path_buf();
    config.agent.system_prompt = Some("You are a test agent.".to_string());
    config.agent.tool_timeout_secs = 5;
    config.agent.autosave = false;
    config
}

/// Built-in tools rooted at `workspace`
pub fn builtins(workspace: &Path) -> ToolRegistry {
    ToolRegistry::with_builtins(workspace, Duration::from_secs(5))
}

/// Orchestrator over the built-in tools and a scripted provider
pub fn orchestrator(workspace: &Path, provider: Arc<ScriptedProvider>) -> Orchestrator {
    Orchestrator::with_parts(config(workspace), provider, builtins(workspace))
}

pub fn reply(text: &str) -> Step {
    Step::Reply(LLMResponse::text(text).with_usage(500, 40))
}

pub fn tools(calls: Vec<ToolCall>) -> Step {
    Step::Reply(LLMResponse::tools(calls).with_usage(600, 30))
}

pub fn write_file(path: &str, content: &str, overwrite: bool) -> ToolCall {
    ToolCall::new(
        "write_file",
        json!({"path": path, "content": content, "overwrite": overwrite}),
    )
}
