//! Configuration management for Codewright
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/codewright/config.toml

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{CodewrightError, Result};

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| v == "true" || v == "1")
}

/// Which LLM backend serves the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible OpenRouter API
    OpenRouter,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Ollama => write!(f, "ollama"),
            ProviderType::OpenRouter => write!(f, "openrouter"),
        }
    }
}

/// Main configuration for Codewright
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Active LLM provider
    pub provider: ProviderType,
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// OpenRouter configuration
    pub openrouter: OpenRouterConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Agent configuration
    pub agent: AgentConfig,
    /// Pricing configuration
    pub pricing: PricingConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// OpenRouter API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenRouterConfig {
    /// API base URL
    pub base_url: String,
    /// API key; usually supplied through OPENROUTER_API_KEY
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model used for the conversation
    pub active: String,
    /// Models offered for quick switching
    pub alternatives: Vec<String>,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// LLM round-trips allowed per user message
    /// Default: 10
    pub max_round_trips: usize,
    /// Execution attempts per tool call
    /// Default: 3
    pub max_tool_attempts: u32,
    /// Upper bound on a single tool handler invocation
    /// Default: 60
    pub tool_timeout_secs: u64,
    /// Estimated tokens of history replayed per LLM call
    /// Default: 32000
    pub context_budget_tokens: usize,
    /// Whether to show debug output
    pub debug: bool,
    /// System prompt override
    pub system_prompt: Option<String>,
    /// Root directory for the file tools
    pub workspace: PathBuf,
    /// Where the REPL keeps its session snapshot
    pub session_file: PathBuf,
    /// Default target of explicit `save` and `load`, never touched by autosave
    pub snapshot_file: PathBuf,
    /// Save the session after every turn
    pub autosave: bool,
}

/// Per-model dollar rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    /// USD per million input tokens
    pub input_per_million: f64,
    /// USD per million output tokens
    pub output_per_million: f64,
}

/// Pricing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Rate applied to models missing from the table
    pub default_input_per_million: f64,
    pub default_output_per_million: f64,
    /// Flat fee per web search
    pub search_fee: f64,
    /// Rates that replace or extend the built-in table
    pub overrides: HashMap<String, RateConfig>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: env::var("OPENROUTER_API_KEY").ok(),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            active: env::var("CODEWRIGHT_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
            alternatives: vec![
                "qwen2.5-coder:7b".to_string(),
                "anthropic/claude-sonnet-4".to_string(),
                "openai/gpt-4o".to_string(),
            ],
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_round_trips: 10,
            max_tool_attempts: 3,
            tool_timeout_secs: 60,
            context_budget_tokens: 32_000,
            debug: env_flag("CODEWRIGHT_DEBUG").unwrap_or(false),
            system_prompt: None,
            workspace: PathBuf::from("."),
            session_file: PathBuf::from(".codewright").join("session.json"),
            snapshot_file: PathBuf::from(".codewright").join("snapshot.json"),
            autosave: env_flag("CODEWRIGHT_AUTOSAVE").unwrap_or(true),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_input_per_million: 3.0,
            default_output_per_million: 15.0,
            search_fee: 0.01,
            overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("codewright")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                if Self::config_exists() {
                    tracing::warn!("Ignoring config file: {}", e);
                }
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(CodewrightError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| CodewrightError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CodewrightError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                CodewrightError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CodewrightError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| CodewrightError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Check if a config file exists
    pub fn config_exists() -> bool {
        Self::config_file().exists()
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Session file resolved against the workspace
    pub fn session_path(&self) -> PathBuf {
        self.in_workspace(&self.agent.session_file)
    }

    /// Snapshot file for explicit `save`/`load`, resolved against the workspace
    pub fn snapshot_path(&self) -> PathBuf {
        self.in_workspace(&self.agent.snapshot_file)
    }

    fn in_workspace(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.agent.workspace.join(path)
        }
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
