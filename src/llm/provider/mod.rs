//! LLM Provider implementations and factory
//!
//! Submodules implement hosted providers; the local Ollama client lives in
//! `llm::ollama`.

pub mod openrouter;

use std::sync::Arc;

use crate::core::config::{Config, ProviderType};
use crate::core::Result;
use crate::llm::traits::LLMProvider;
use crate::llm::OllamaClient;

use self::openrouter::OpenRouterProvider;

/// Create a new LLM provider based on configuration
pub fn create_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.provider {
        ProviderType::Ollama => Arc::new(OllamaClient::from_config(config)?),
        ProviderType::OpenRouter => Arc::new(OpenRouterProvider::from_config(config)?),
    };
    Ok(provider)
}
