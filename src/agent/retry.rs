//! Retry-correction engine
//!
//! Resolves one tool call: validates it against the registry, runs the handler
//! under a timeout, classifies any failure and, when the failure has a
//! deterministic fix, corrects the arguments and tries again.
//!
//! Only side-effect-free flag flips are applied automatically. Every other
//! failure is handed back to the model as a tool result so the model decides
//! the next step (for example reading a file before rewriting it).

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::{ToolCall, ToolErrorKind, ToolOutput, ToolResult};
use crate::tools::{validate_arguments, ToolRegistry};

/// Default execution attempts per tool call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A deterministic argument fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Force a boolean argument to a value
    SetFlag { key: &'static str, value: bool },
}

impl Correction {
    /// Apply the fix, leaving every other argument untouched
    pub fn apply(&self, arguments: &mut Value) {
        match self {
            Correction::SetFlag { key, value } => {
                if let Some(args) = arguments.as_object_mut() {
                    args.insert((*key).to_string(), Value::Bool(*value));
                }
            }
        }
    }
}

struct CorrectionRule {
    tool: &'static str,
    kind: ToolErrorKind,
    correction: Correction,
}

/// `(tool, kind)` pairs with a safe automatic fix
const CORRECTION_RULES: &[CorrectionRule] = &[CorrectionRule {
    tool: "write_file",
    kind: ToolErrorKind::ExistsConflict,
    correction: Correction::SetFlag {
        key: "overwrite",
        value: true,
    },
}];

struct PatternRule {
    /// `None` applies to every tool
    tool: Option<&'static str>,
    pattern: &'static str,
    kind: ToolErrorKind,
}

/// Message patterns for handlers that do not report a kind themselves
const PATTERN_RULES: &[PatternRule] = &[
    PatternRule {
        tool: Some("write_file"),
        pattern: "already exists",
        kind: ToolErrorKind::ExistsConflict,
    },
    PatternRule {
        tool: None,
        pattern: "timed out",
        kind: ToolErrorKind::Timeout,
    },
    PatternRule {
        tool: None,
        pattern: "invalid argument",
        kind: ToolErrorKind::ValidationError,
    },
];

/// Classify a failed handler output
pub fn classify(tool_name: &str, output: &ToolOutput) -> ToolErrorKind {
    if let Some(kind) = output.error_kind.as_deref().and_then(ToolErrorKind::parse) {
        return kind;
    }

    let message = output
        .error_message
        .as_deref()
        .unwrap_or(&output.output)
        .to_lowercase();

    PATTERN_RULES
        .iter()
        .filter(|rule| rule.tool.is_none_or(|t| t == tool_name))
        .find(|rule| message.contains(rule.pattern))
        .map(|rule| rule.kind)
        .unwrap_or(ToolErrorKind::ExecutionFailed)
}

/// The automatic fix for a classified failure, if one exists
pub fn correction_for(tool_name: &str, kind: ToolErrorKind) -> Option<Correction> {
    CORRECTION_RULES
        .iter()
        .find(|rule| rule.tool == tool_name && rule.kind == kind)
        .map(|rule| rule.correction)
}

/// Outcome of resolving a call
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The call as last executed (corrected arguments, final attempt number)
    pub call: ToolCall,
    pub result: ToolResult,
}

/// Executes tool calls with bounded, error-driven retries
pub struct RetryEngine {
    registry: Arc<ToolRegistry>,
    max_attempts: u32,
    timeout: Duration,
}

impl RetryEngine {
    pub fn new(registry: Arc<ToolRegistry>, max_attempts: u32, timeout: Duration) -> Self {
        Self {
            registry,
            max_attempts: max_attempts.max(1),
            timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Resolve a tool call to a terminal result
    pub async fn resolve(&self, mut call: ToolCall) -> Resolution {
        call.attempt = 1;

        let Some(tool) = self.registry.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Model requested an unknown tool");
            let result = ToolResult::failure(
                &call.name,
                ToolErrorKind::UnknownTool,
                format!(
                    "No tool named '{}'. Available tools: {}",
                    call.name,
                    self.registry.tool_names().join(", ")
                ),
                call.attempt,
            );
            return Resolution { call, result };
        };

        if let Err(reason) = validate_arguments(&tool.definition.function.parameters, &call.arguments)
        {
            tracing::debug!(tool = %call.name, %reason, "Tool arguments rejected");
            let result = ToolResult::failure(
                &call.name,
                ToolErrorKind::ValidationError,
                reason,
                call.attempt,
            );
            return Resolution { call, result };
        }

        loop {
            let started = Instant::now();
            let output = match timeout(self.timeout, tool.handler.call(&call.arguments)).await {
                Ok(output) => output,
                Err(_) => ToolOutput::failure(
                    ToolErrorKind::Timeout,
                    format!("Tool did not finish within {}s", self.timeout.as_secs()),
                ),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            if output.ok {
                tracing::info!(
                    tool = %call.name,
                    attempt = call.attempt,
                    duration_ms,
                    outcome = "ok",
                    "tool"
                );
                let result = ToolResult::success(&call.name, output.output, call.attempt);
                return Resolution { call, result };
            }

            let kind = classify(&call.name, &output);
            let message = output
                .error_message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| {
                    if output.output.is_empty() {
                        "tool failed".to_string()
                    } else {
                        output.output
                    }
                });

            tracing::info!(
                tool = %call.name,
                attempt = call.attempt,
                duration_ms,
                outcome = %kind,
                "tool"
            );

            let Some(fix) = correction_for(&call.name, kind) else {
                let result = ToolResult::failure(&call.name, kind, message, call.attempt);
                return Resolution { call, result };
            };

            if call.attempt >= self.max_attempts {
                let result = ToolResult::failure(
                    &call.name,
                    ToolErrorKind::MaxRetriesExceeded,
                    format!(
                        "Gave up after {} attempts; last error [{}]: {}",
                        call.attempt, kind, message
                    ),
                    call.attempt,
                );
                return Resolution { call, result };
            }

            fix.apply(&mut call.arguments);
            call.attempt += 1;
            tracing::info!(
                tool = %call.name,
                correction = ?fix,
                next_attempt = call.attempt,
                "Retrying with corrected arguments"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ToolCategory, ToolDefinition};
    use crate::tools::ToolHandler;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Handler that replays scripted outputs and records every argument set
    struct Scripted {
        outputs: Mutex<Vec<ToolOutput>>,
        seen: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl ToolHandler for Scripted {
        async fn call(&self, arguments: &Value) -> ToolOutput {
            self.seen.lock().unwrap().push(arguments.clone());
            let mut outputs = self.outputs.lock().unwrap();
            if outputs.len() > 1 {
                outputs.remove(0)
            } else {
                outputs[0].clone()
            }
        }
    }

    struct Hang;

    #[async_trait]
    impl ToolHandler for Hang {
        async fn call(&self, _arguments: &Value) -> ToolOutput {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ToolOutput::success("never")
        }
    }

    fn write_def() -> ToolDefinition {
        ToolDefinition::function(
            "write_file",
            "write",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "overwrite": {"type": "boolean"}
                },
                "required": ["path", "content"]
            }),
        )
    }

    fn engine_with(
        name: &str,
        outputs: Vec<ToolOutput>,
    ) -> (RetryEngine, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut def = write_def();
        def.function.name = name.to_string();
        let mut registry = ToolRegistry::new();
        registry.register(
            def,
            ToolCategory::FileSystem,
            Arc::new(Scripted {
                outputs: Mutex::new(outputs),
                seen: seen.clone(),
            }),
        );
        (
            RetryEngine::new(Arc::new(registry), DEFAULT_MAX_ATTEMPTS, Duration::from_secs(5)),
            seen,
        )
    }

    fn conflict() -> ToolOutput {
        ToolOutput::failure(ToolErrorKind::ExistsConflict, "exists")
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (engine, seen) = engine_with("write_file", vec![ToolOutput::success("ok")]);
        let res = engine
            .resolve(ToolCall::new("write_file", json!({"path": "a", "content": "b"})))
            .await;
        assert!(res.result.ok);
        assert_eq!(res.result.attempt, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exists_conflict_flips_only_overwrite() {
        let (engine, seen) =
            engine_with("write_file", vec![conflict(), ToolOutput::success("ok")]);
        let args = json!({"path": "hello.py", "content": "print(1)", "overwrite": false});
        let res = engine.resolve(ToolCall::new("write_file", args.clone())).await;

        assert!(res.result.ok);
        assert_eq!(res.result.attempt, 2);
        assert_eq!(res.call.attempt, 2);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], args);
        let mut expected = args.clone();
        expected["overwrite"] = json!(true);
        assert_eq!(seen[1], expected);
    }

    #[tokio::test]
    async fn test_retry_bound_is_exact() {
        let (engine, seen) = engine_with("write_file", vec![conflict()]);
        let res = engine
            .resolve(ToolCall::new("write_file", json!({"path": "a", "content": "b"})))
            .await;

        assert_eq!(seen.lock().unwrap().len(), 3);
        assert!(!res.result.ok);
        assert_eq!(res.result.error_kind, Some(ToolErrorKind::MaxRetriesExceeded));
        assert_eq!(res.result.attempt, 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_never_executes() {
        let (engine, seen) = engine_with("write_file", vec![ToolOutput::success("ok")]);
        let res = engine.resolve(ToolCall::new("delete_repo", json!({}))).await;
        assert_eq!(res.result.error_kind, Some(ToolErrorKind::UnknownTool));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_error_is_not_retried() {
        let (engine, seen) = engine_with("write_file", vec![ToolOutput::success("ok")]);
        let res = engine
            .resolve(ToolCall::new("write_file", json!({"path": "a"})))
            .await;
        assert_eq!(res.result.error_kind, Some(ToolErrorKind::ValidationError));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uncorrectable_failure_surfaces_immediately() {
        let (engine, seen) = engine_with(
            "update_file",
            vec![ToolOutput::error("file must be read before it is updated")],
        );
        let res = engine
            .resolve(ToolCall::new("update_file", json!({"path": "a", "content": "b"})))
            .await;
        assert_eq!(res.result.error_kind, Some(ToolErrorKind::ExecutionFailed));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(res.result.observation().contains("read before"));
    }

    #[tokio::test]
    async fn test_hanging_handler_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(write_def(), ToolCategory::FileSystem, Arc::new(Hang));
        let engine = RetryEngine::new(Arc::new(registry), 3, Duration::from_millis(50));

        let res = engine
            .resolve(ToolCall::new("write_file", json!({"path": "a", "content": "b"})))
            .await;
        assert_eq!(res.result.error_kind, Some(ToolErrorKind::Timeout));
        assert_eq!(res.result.attempt, 1);
    }

    #[test]
    fn test_classify_by_message_pattern() {
        let out = ToolOutput::error("File hello.py already exists");
        assert_eq!(classify("write_file", &out), ToolErrorKind::ExistsConflict);
        assert_eq!(classify("read_file", &out), ToolErrorKind::ExecutionFailed);
        assert_eq!(
            classify("run_command", &ToolOutput::error("command timed out")),
            ToolErrorKind::Timeout
        );
    }

    #[test]
    fn test_correction_table() {
        assert!(correction_for("write_file", ToolErrorKind::ExistsConflict).is_some());
        assert!(correction_for("write_file", ToolErrorKind::Timeout).is_none());
        assert!(correction_for("read_file", ToolErrorKind::ExistsConflict).is_none());
    }
}
