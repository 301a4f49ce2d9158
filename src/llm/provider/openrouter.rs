//! OpenRouter Provider
//!
//! OpenAI-compatible chat completions with function calling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{CodewrightError, Config, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// Rate limit retry configuration
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

pub struct OpenRouterProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

/// Arguments travel as a JSON-encoded string on this API
#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenRouterProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.openrouter.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.openrouter.base_url.trim_end_matches('/').to_string(),
            api_key: config.openrouter.api_key.clone(),
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            CodewrightError::provider("No OpenRouter API key. Set OPENROUTER_API_KEY.")
        })
    }

    fn to_wire_message(msg: &Message) -> WireMessage {
        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    call_type: function_type(),
                    function: WireFunction {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect()
        });

        WireMessage {
            role: msg.role.clone(),
            content: Some(msg.content.clone()),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    fn to_llm_response(response: ChatResponse, requested_model: &str) -> Result<LLMResponse> {
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| CodewrightError::provider("No choices in response"))?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                // Malformed argument JSON is passed through as a string so the
                // registry reports it as a validation error to the model.
                let arguments = if tc.function.arguments.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(serde_json::Value::String(tc.function.arguments))
                };
                let mut call = ToolCall::new(tc.function.name, arguments);
                call.id = tc.id;
                call
            })
            .collect();

        Ok(LLMResponse {
            content: message.content.unwrap_or_default(),
            tool_calls,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.prompt_tokens + u.completion_tokens,
            }),
            model: response
                .model
                .unwrap_or_else(|| requested_model.to_string()),
        })
    }
}

#[async_trait]
impl LLMProvider for OpenRouterProvider {
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let api_key = self.api_key()?;
        let options = options.unwrap_or_default();

        let request = ChatRequest {
            model,
            messages: messages.iter().map(Self::to_wire_message).collect(),
            tools: if tools.is_empty() { None } else { Some(tools) },
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop,
        };

        let mut retry_count = 0;
        loop {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", api_key))
                .header("X-Title", "Codewright")
                .json(&request)
                .send()
                .await
                .map_err(|e| CodewrightError::provider(format!("OpenRouter request failed: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                let chat_response: ChatResponse = response.json().await.map_err(|e| {
                    CodewrightError::provider(format!("Failed to parse response: {}", e))
                })?;
                return Self::to_llm_response(chat_response, model);
            }

            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 && retry_count < MAX_RATE_LIMIT_RETRIES {
                retry_count += 1;
                let backoff_ms = INITIAL_BACKOFF_MS * 2u64.pow(retry_count - 1);
                tracing::warn!(
                    retry_count,
                    backoff_ms,
                    "Rate limited by OpenRouter, backing off"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                continue;
            }

            return Err(match status.as_u16() {
                401 => CodewrightError::provider("Invalid OpenRouter API key"),
                404 => CodewrightError::ModelNotFound(model.to_string()),
                _ => CodewrightError::provider(format!(
                    "OpenRouter API error ({}): {}",
                    status, text
                )),
            });
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .send()
            .await
            .map_err(|e| CodewrightError::provider(format!("OpenRouter request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CodewrightError::provider("Failed to list models"));
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
