//! LLM module - Language Model integrations
//!
//! Provider abstraction, the Ollama and OpenRouter backends, model presets and
//! the cost model.

pub mod cost;
pub mod models;
pub mod ollama;
pub mod provider;
pub mod traits;

pub use cost::{estimate_messages_tokens, estimate_tokens, ModelRate, PricingTable};
pub use models::*;
pub use ollama::OllamaClient;
pub use provider::create_provider;
pub use traits::{GenerateOptions, LLMProvider, LLMReply, LLMResponse, TokenUsage};
