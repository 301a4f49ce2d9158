//! Model definitions and presets
//!
//! Contains known models, the provider that serves them and their list prices.

use serde::{Deserialize, Serialize};

use crate::core::ProviderType;

/// Model preset with pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPreset {
    /// Model identifier as the provider knows it
    pub id: String,
    /// Human-readable display name
    pub display_name: String,
    /// Description of the model
    pub description: String,
    /// Provider that serves this model
    pub provider: ProviderType,
    /// USD per million input tokens
    pub input_per_million: f64,
    /// USD per million output tokens
    pub output_per_million: f64,
}

fn preset(
    id: &str,
    display_name: &str,
    description: &str,
    provider: ProviderType,
    input_per_million: f64,
    output_per_million: f64,
) -> ModelPreset {
    ModelPreset {
        id: id.to_string(),
        display_name: display_name.to_string(),
        description: description.to_string(),
        provider,
        input_per_million,
        output_per_million,
    }
}

/// Get predefined model presets
pub fn get_model_presets() -> Vec<ModelPreset> {
    use ProviderType::{Ollama, OpenRouter};

    vec![
        // Hosted models
        preset(
            "anthropic/claude-sonnet-4",
            "Claude Sonnet 4",
            "Strong tool use and code editing",
            OpenRouter,
            3.0,
            15.0,
        ),
        preset(
            "anthropic/claude-opus-4",
            "Claude Opus 4",
            "Highest quality reasoning, premium price",
            OpenRouter,
            15.0,
            75.0,
        ),
        preset(
            "anthropic/claude-3.5-haiku",
            "Claude 3.5 Haiku",
            "Fast and cheap for small edits",
            OpenRouter,
            0.8,
            4.0,
        ),
        preset(
            "openai/gpt-4o",
            "GPT-4o",
            "General purpose with reliable function calling",
            OpenRouter,
            2.5,
            10.0,
        ),
        preset(
            "openai/gpt-4o-mini",
            "GPT-4o mini",
            "Budget hosted model",
            OpenRouter,
            0.15,
            0.6,
        ),
        // Local models run on your own hardware
        preset(
            "qwen3:8b",
            "Qwen 3 8B",
            "Local default with tool calling",
            Ollama,
            0.0,
            0.0,
        ),
        preset(
            "qwen2.5-coder:7b",
            "Qwen 2.5 Coder 7B",
            "Local code generation with good function calling",
            Ollama,
            0.0,
            0.0,
        ),
        preset(
            "mistral:7b",
            "Mistral 7B",
            "Local general purpose with decent function calling",
            Ollama,
            0.0,
            0.0,
        ),
    ]
}

/// Find a model preset by id
pub fn find_preset(id: &str) -> Option<ModelPreset> {
    get_model_presets().into_iter().find(|p| p.id == id)
}

/// Presets served by one provider
pub fn presets_for(provider: ProviderType) -> Vec<ModelPreset> {
    get_model_presets()
        .into_iter()
        .filter(|p| p.provider == provider)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_preset() {
        let preset = find_preset("openai/gpt-4o").unwrap();
        assert_eq!(preset.provider, ProviderType::OpenRouter);
        assert!(find_preset("nope").is_none());
    }

    #[test]
    fn test_local_presets_are_free() {
        assert!(presets_for(ProviderType::Ollama)
            .iter()
            .all(|p| p.input_per_million == 0.0 && p.output_per_million == 0.0));
    }
}
