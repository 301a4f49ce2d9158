//! Codewright - conversational coding agent
//!
//! Drives a multi-turn, tool-using conversation with an LLM backend: tool calls
//! are dispatched and retried with deterministic corrections, history grows
//! under a context budget, token and dollar cost are tracked per turn and per
//! session, and sessions can be saved and restored.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction (Ollama, OpenRouter), model presets, cost model
//! - **Tools**: Tool registry with schema validation and built-in file/shell tools
//! - **Agent**: Turn executor, retry-correction engine, history, session state
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use codewright::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> codewright::Result<()> {
//!     let mut agent = Orchestrator::new(Config::load())?;
//!     agent.initialize().await?;
//!
//!     let response = agent.submit("Create hello.py that prints a greeting").await?;
//!     println!("{}", response);
//!     println!("{:?}", agent.usage_summary());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{Orchestrator, SessionState, UsageSummary};
pub use cli::Repl;
pub use core::{CodewrightError, Config, ProviderType, Result};
