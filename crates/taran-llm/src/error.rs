//! Error types for the chat backend crate.

use thiserror::Error;

/// Result type alias using the chat error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for chat operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Backend/API error from the model daemon.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Network/connectivity error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns true if the daemon rejected the request because the model
    /// cannot do tool calling.
    ///
    /// The orchestration loop treats this specially: it records the model in
    /// the capability cache and retries the turn without tools.
    pub fn is_tool_support_error(&self) -> bool {
        match self {
            Self::Backend(msg) => msg.contains("does not support tools"),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::Network("timeout".to_string()).is_retryable());
        assert!(!LlmError::Backend("server error".to_string()).is_retryable());
        assert!(!LlmError::Config("bad config".to_string()).is_retryable());
    }

    #[test]
    fn test_is_tool_support_error() {
        let err = LlmError::Backend(
            "registry.ollama.ai/library/tinyllama:latest does not support tools".to_string(),
        );
        assert!(err.is_tool_support_error());

        assert!(!LlmError::Backend("model not found".to_string()).is_tool_support_error());
        assert!(!LlmError::Network("does not support tools".to_string()).is_tool_support_error());
    }
}
