//! Error types for tool-server operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for tool-server operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for tool-server operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to spawn the server process.
    #[error("failed to spawn tool server: {0}")]
    Spawn(String),

    /// Failed to communicate with the server.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The capability handshake failed or produced a malformed response.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Bad or missing server configuration.
    #[error(transparent)]
    Config(#[from] taran_config::ConfigError),

    /// The configured transport kind is not recognized.
    #[error("unsupported transport kind '{0}' (expected stdio, sse or http)")]
    UnsupportedTransport(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server returned an error response.
    #[error("server error {code}: {message}")]
    Server {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// Operation requires a Ready session.
    #[error("session not ready - call initialize() first")]
    NotReady,

    /// Connection closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Timed out waiting for a correlated response.
    #[error("timed out after {:.1}s waiting for response", .0.as_secs_f64())]
    Timeout(Duration),
}

impl McpError {
    /// Create a spawn error.
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a handshake error.
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Create a server error from an error response.
    pub fn server(code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::Server {
            code,
            message: message.into(),
            data,
        }
    }
}

impl From<crate::protocol::JsonRpcError> for McpError {
    fn from(err: crate::protocol::JsonRpcError) -> Self {
        Self::server(err.code, err.message, err.data)
    }
}
