//! Shared types used across Codewright modules
//!
//! Contains conversation turns, tool call/result records, tool definitions and
//! the provider wire message.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Payload of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    /// Plain text from the user or the assistant
    Text { text: String },
    /// A resolved tool call together with its outcome
    ToolExchange { call: ToolCall, result: ToolResult },
}

/// One atomic unit of conversation history
///
/// Turns are never edited once they are in the history; a correction always
/// produces a new turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    /// Model that was active when this turn was billed (terminal assistant turns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Dollar cost charged for the whole exchange this turn closes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Text the model sent together with the tool call (tool turns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
}

impl Turn {
    fn new(role: Role, content: TurnContent) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
            input_tokens: None,
            output_tokens: None,
            model_id: None,
            cost: None,
            preamble: None,
        }
    }

    /// Create a user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, TurnContent::Text { text: text.into() })
    }

    /// Create an assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnContent::Text { text: text.into() })
    }

    /// Create a tool turn from a resolved call
    pub fn tool(call: ToolCall, result: ToolResult) -> Self {
        Self::new(Role::Tool, TurnContent::ToolExchange { call, result })
    }

    /// Attach token counts
    pub fn with_tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self
    }

    /// Attach the billing ledger entry
    pub fn with_ledger(mut self, model_id: impl Into<String>, cost: f64) -> Self {
        self.model_id = Some(model_id.into());
        self.cost = Some(cost);
        self
    }

    /// Attach the text that accompanied a tool request
    pub fn with_preamble(mut self, text: impl Into<String>) -> Self {
        self.preamble = Some(text.into());
        self
    }

    /// Text of a user/assistant turn
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text { text } => Some(text),
            TurnContent::ToolExchange { .. } => None,
        }
    }

    /// Tool result of a tool turn
    pub fn tool_result(&self) -> Option<&ToolResult> {
        match &self.content {
            TurnContent::ToolExchange { result, .. } => Some(result),
            TurnContent::Text { .. } => None,
        }
    }

    /// Flat textual rendering, used for token estimation and `/history`
    pub fn render(&self) -> String {
        match &self.content {
            TurnContent::Text { text } => text.clone(),
            TurnContent::ToolExchange { call, result } => {
                let exchange =
                    format!("{}({}) -> {}", call.name, call.arguments, result.observation());
                match &self.preamble {
                    Some(text) => format!("{}\n{}", text, exchange),
                    None => exchange,
                }
            }
        }
    }

    /// Expand the turn into provider wire messages
    ///
    /// A tool turn becomes the assistant message that requested the call
    /// followed by the tool message carrying its result. `index` seeds a call
    /// id when the provider did not assign one.
    pub fn to_messages(&self, index: usize) -> Vec<Message> {
        match (&self.role, &self.content) {
            (Role::User, TurnContent::Text { text }) => vec![Message::user(text.clone())],
            (_, TurnContent::Text { text }) => vec![Message::assistant(text.clone())],
            (_, TurnContent::ToolExchange { call, result }) => {
                let id = call.id.clone().unwrap_or_else(|| format!("call_{}", index));
                let mut requested = call.clone();
                requested.id = Some(id.clone());

                let mut request =
                    Message::assistant(self.preamble.clone().unwrap_or_default());
                request.tool_calls = Some(vec![requested]);

                vec![request, Message::tool(&call.name, id, result.observation())]
            }
        }
    }
}

/// A message on the provider wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (system, user, assistant, tool)
    pub role: String,
    /// Content of the message
    pub content: String,
    /// Tool calls requested by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the call a tool message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool a tool message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content.into())
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content.into())
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content.into())
    }

    /// Create a tool result message
    pub fn tool(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new("tool", content.into());
        msg.tool_name = Some(tool_name.into());
        msg.tool_call_id = Some(call_id.into());
        msg
    }
}

fn first_attempt() -> u32 {
    1
}

/// A tool call requested by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON object of arguments
    pub arguments: serde_json::Value,
    /// 1-based attempt counter
    #[serde(default = "first_attempt")]
    pub attempt: u32,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
            attempt: 1,
        }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Get a boolean argument by key
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.arguments.get(key).and_then(|v| v.as_bool())
    }
}

/// Classified reason a tool call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Name not in the registry; never retried
    UnknownTool,
    /// Target already exists and the call did not ask to overwrite
    ExistsConflict,
    /// Arguments do not match the tool's schema
    ValidationError,
    /// Handler exceeded its time bound
    Timeout,
    /// Correctable failure persisted through every attempt
    MaxRetriesExceeded,
    /// Any other handler failure
    ExecutionFailed,
}

impl ToolErrorKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::UnknownTool => "unknown_tool",
            ToolErrorKind::ExistsConflict => "exists_conflict",
            ToolErrorKind::ValidationError => "validation_error",
            ToolErrorKind::Timeout => "timeout",
            ToolErrorKind::MaxRetriesExceeded => "max_retries_exceeded",
            ToolErrorKind::ExecutionFailed => "execution_failed",
        }
    }

    /// Parse a wire name reported by a handler
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "unknown_tool" => Some(ToolErrorKind::UnknownTool),
            "exists_conflict" | "already_exists" => Some(ToolErrorKind::ExistsConflict),
            "validation_error" | "invalid_arguments" => Some(ToolErrorKind::ValidationError),
            "timeout" => Some(ToolErrorKind::Timeout),
            "max_retries_exceeded" => Some(ToolErrorKind::MaxRetriesExceeded),
            "execution_failed" => Some(ToolErrorKind::ExecutionFailed),
            _ => None,
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw outcome returned by a tool handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub ok: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolOutput {
    /// Successful handler output
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
            error_kind: None,
            error_message: None,
        }
    }

    /// Failed handler output with a self-reported kind
    pub fn failure(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: String::new(),
            error_kind: Some(kind.as_str().to_string()),
            error_message: Some(message.into()),
        }
    }

    /// Failed handler output without a kind; the engine classifies it
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: String::new(),
            error_kind: None,
            error_message: Some(message.into()),
        }
    }
}

/// Resolved outcome of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool that was executed
    pub tool_name: String,
    /// Whether the execution was successful
    pub ok: bool,
    /// Output from the tool
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Attempt on which this outcome was produced
    #[serde(default = "first_attempt")]
    pub attempt: u32,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>, attempt: u32) -> Self {
        Self {
            tool_name: tool_name.into(),
            ok: true,
            output: output.into(),
            error_kind: None,
            error_message: None,
            attempt,
        }
    }

    /// Create a failed result
    pub fn failure(
        tool_name: impl Into<String>,
        kind: ToolErrorKind,
        message: impl Into<String>,
        attempt: u32,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            ok: false,
            output: String::new(),
            error_kind: Some(kind),
            error_message: Some(message.into()),
            attempt,
        }
    }

    /// What the LLM sees for this result
    pub fn observation(&self) -> String {
        if self.ok {
            return self.output.clone();
        }
        let kind = self
            .error_kind
            .unwrap_or(ToolErrorKind::ExecutionFailed);
        format!(
            "Error [{}]: {}",
            kind,
            self.error_message.as_deref().unwrap_or("tool failed")
        )
    }
}

/// Definition of a tool that can be called by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Tool name
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Category of tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// File system operations
    FileSystem,
    /// Shell commands
    System,
    /// Web search (billed per call)
    Search,
    /// Git and hosting platforms
    VersionControl,
    /// Document and page fetching
    Web,
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolCategory::FileSystem => write!(f, "filesystem"),
            ToolCategory::System => write!(f, "system"),
            ToolCategory::Search => write!(f, "search"),
            ToolCategory::VersionControl => write!(f, "version_control"),
            ToolCategory::Web => write!(f, "web"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_kind_parse() {
        assert_eq!(
            ToolErrorKind::parse("exists_conflict"),
            Some(ToolErrorKind::ExistsConflict)
        );
        assert_eq!(
            ToolErrorKind::parse("Already-Exists"),
            Some(ToolErrorKind::ExistsConflict)
        );
        assert_eq!(ToolErrorKind::parse("weird"), None);
    }

    #[test]
    fn test_tool_turn_expands_to_request_and_result() {
        let call = ToolCall::new("read_file", json!({"path": "a.txt"}));
        let result = ToolResult::success("read_file", "hello", 1);
        let messages = Turn::tool(call, result).to_messages(4);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "assistant");
        let requested = messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(requested[0].id.as_deref(), Some("call_4"));
        assert_eq!(messages[1].role, "tool");
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_4"));
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn test_preamble_rides_on_the_request_message() {
        let call = ToolCall::new("read_file", json!({"path": "a.txt"}));
        let result = ToolResult::success("read_file", "hello", 1);
        let turn = Turn::tool(call, result).with_preamble("Checking a.txt first.");

        let messages = turn.to_messages(0);
        assert_eq!(messages[0].content, "Checking a.txt first.");
        assert!(messages[0].tool_calls.is_some());
        assert!(turn.render().starts_with("Checking a.txt first.\n"));

        let json = serde_json::to_string(&turn).unwrap();
        let restored: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.preamble.as_deref(), Some("Checking a.txt first."));
    }

    #[test]
    fn test_failure_observation() {
        let result = ToolResult::failure(
            "write_file",
            ToolErrorKind::Timeout,
            "took too long",
            1,
        );
        assert_eq!(result.observation(), "Error [timeout]: took too long");
    }

    #[test]
    fn test_tool_call_defaults_attempt_when_missing() {
        let call: ToolCall =
            serde_json::from_value(json!({"name": "x", "arguments": {}})).unwrap();
        assert_eq!(call.attempt, 1);
    }
}
