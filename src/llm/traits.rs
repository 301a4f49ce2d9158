//! LLM Provider trait for abstracting different backends
//!
//! Enables swapping between Ollama, OpenRouter, or a scripted test double.

use async_trait::async_trait;

use crate::core::{Message, Result, ToolCall, ToolDefinition};

/// Response from an LLM provider
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    /// Text content of the response
    pub content: String,
    /// Any tool calls the model wants to make
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

/// What the model wants next
#[derive(Debug, Clone, PartialEq)]
pub enum LLMReply {
    /// Plain text, no further action
    Final(String),
    /// One or more tool calls, to be resolved in order, with any text the
    /// model sent alongside them
    ToolRequest {
        calls: Vec<ToolCall>,
        text: Option<String>,
    },
}

impl LLMResponse {
    /// A final text response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// A response requesting tool calls
    pub fn tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }

    /// Attach usage reported by the backend
    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.usage = Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        });
        self
    }

    /// Interpret the response
    pub fn into_reply(self) -> LLMReply {
        if self.tool_calls.is_empty() {
            LLMReply::Final(self.content)
        } else {
            let text = self.content.trim();
            LLMReply::ToolRequest {
                text: (!text.is_empty()).then(|| text.to_string()),
                calls: self.tool_calls,
            }
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Options for LLM generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response with tool definitions
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Check if a model is available
    async fn is_model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == model))
    }

    /// Get the provider name
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_without_tools_is_final() {
        let reply = LLMResponse::text("done").into_reply();
        assert_eq!(reply, LLMReply::Final("done".to_string()));
    }

    #[test]
    fn test_reply_with_tools_is_request() {
        let call = ToolCall::new("read_file", json!({"path": "x"}));
        let mut response = LLMResponse::tools(vec![call.clone()]);
        response.content = "let me look\n".to_string();
        assert_eq!(
            response.into_reply(),
            LLMReply::ToolRequest {
                calls: vec![call],
                text: Some("let me look".to_string()),
            }
        );
    }

    #[test]
    fn test_blank_text_with_tools_is_dropped() {
        let call = ToolCall::new("list_directory", json!({}));
        let mut response = LLMResponse::tools(vec![call.clone()]);
        response.content = "  \n".to_string();
        assert_eq!(
            response.into_reply(),
            LLMReply::ToolRequest {
                calls: vec![call],
                text: None,
            }
        );
    }
}
