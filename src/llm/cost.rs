//! Cost model
//!
//! Token estimation and dollar pricing. Both are pure: the table is built once
//! from presets plus config overrides and never changes afterwards.
//!
//! Token estimates are approximate (characters / 4) and only drive context
//! budgeting and usage display when the provider does not report real counts.

use std::collections::HashMap;

use crate::core::config::{PricingConfig, RateConfig};
use crate::core::Message;
use crate::llm::models::get_model_presets;

/// Characters per estimated token
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text
///
/// Rounds up so that any non-empty text costs at least one token.
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64
}

/// Estimate the token count of a batch of wire messages
pub fn estimate_messages_tokens(messages: &[Message]) -> u64 {
    messages
        .iter()
        .map(|m| {
            let calls = m
                .tool_calls
                .as_ref()
                .map(|calls| {
                    calls
                        .iter()
                        .map(|c| estimate_tokens(&c.name) + estimate_tokens(&c.arguments.to_string()))
                        .sum::<u64>()
                })
                .unwrap_or(0);
            estimate_tokens(&m.content) + calls
        })
        .sum()
}

/// Dollar rates for one model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRate {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl From<RateConfig> for ModelRate {
    fn from(rate: RateConfig) -> Self {
        Self {
            input_per_million: rate.input_per_million,
            output_per_million: rate.output_per_million,
        }
    }
}

/// Per-model rate table with a default for unknown models
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<String, ModelRate>,
    default_rate: ModelRate,
    search_fee: f64,
}

impl PricingTable {
    /// Build the table from built-in presets and config overrides
    pub fn from_config(config: &PricingConfig) -> Self {
        let mut rates: HashMap<String, ModelRate> = get_model_presets()
            .into_iter()
            .map(|p| {
                (
                    p.id,
                    ModelRate {
                        input_per_million: p.input_per_million,
                        output_per_million: p.output_per_million,
                    },
                )
            })
            .collect();

        for (model, rate) in &config.overrides {
            rates.insert(model.clone(), ModelRate::from(*rate));
        }

        Self {
            rates,
            default_rate: ModelRate {
                input_per_million: config.default_input_per_million,
                output_per_million: config.default_output_per_million,
            },
            search_fee: config.search_fee,
        }
    }

    /// Whether the model has its own entry
    pub fn is_known(&self, model_id: &str) -> bool {
        self.rates.contains_key(model_id)
    }

    /// Rate for a model, falling back to the default rate
    pub fn rate(&self, model_id: &str) -> ModelRate {
        self.rates
            .get(model_id)
            .copied()
            .unwrap_or(self.default_rate)
    }

    /// Flat fee charged per web search
    pub fn search_fee(&self) -> f64 {
        self.search_fee
    }

    /// Dollar cost of one exchange
    pub fn cost(&self, model_id: &str, input_tokens: u64, output_tokens: u64, searches: u32) -> f64 {
        let rate = self.rate(model_id);
        let input_cost = (input_tokens as f64 / 1_000_000.0) * rate.input_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * rate.output_per_million;
        input_cost + output_cost + searches as f64 * self.search_fee
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}
