//! Custom error types for Codewright
//!
//! Provides a unified error handling system across all modules. Tool failures
//! are not errors at this level: they travel as [`ToolResult`](crate::core::ToolResult)
//! values back into the conversation.

use thiserror::Error;

/// Main error type for Codewright operations
#[derive(Error, Debug)]
pub enum CodewrightError {
    /// LLM provider call failed (network, HTTP status, malformed reply)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Model not available on the configured provider
    #[error("Model '{0}' is not available on the configured provider")]
    ModelNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session snapshot read/write or format errors
    #[error("Session error: {0}")]
    Session(String),

    /// Caller handed in something unusable (empty message, empty model id)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Convenience Result type for Codewright operations
pub type Result<T> = std::result::Result<T, CodewrightError>;

impl CodewrightError {
    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wrap an error with additional context
    pub fn with_context<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Whether this error came from the LLM backend and should abort the turn
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::ModelNotFound(_) | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        assert!(CodewrightError::provider("boom").is_provider_error());
        assert!(CodewrightError::ModelNotFound("x".into()).is_provider_error());
        assert!(!CodewrightError::session("bad").is_provider_error());
    }

    #[test]
    fn test_with_context_display() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = CodewrightError::with_context("Failed to read snapshot", io);
        assert_eq!(err.to_string(), "Failed to read snapshot: missing");
    }
}
