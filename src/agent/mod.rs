//! Agent module - orchestration core
//!
//! Turn executor, retry-correction engine, history, session state and the
//! orchestrator that owns them.

pub mod executor;
pub mod history;
pub mod loop_state;
pub mod orchestrator;
pub mod retry;
pub mod session;

pub use executor::{AssistantResponse, ExecutorSettings, TurnExecutor, DEFAULT_SYSTEM_PROMPT};
pub use history::History;
pub use loop_state::TurnLoopState;
pub use orchestrator::Orchestrator;
pub use retry::{classify, correction_for, Correction, Resolution, RetryEngine};
pub use session::{SessionSnapshot, SessionState, TurnUsage, UsageSummary};
