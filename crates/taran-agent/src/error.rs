//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors surfaced by the agent layer.
///
/// Failures local to one tool call never appear here; they are folded into
/// error-variant tool results at the dispatch boundary. What remains is
/// model-backend failures and connection setup.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Model backend failure.
    #[error(transparent)]
    Llm(#[from] taran_llm::LlmError),

    /// Tool-server failure during setup/discovery.
    #[error(transparent)]
    Mcp(#[from] taran_mcp::McpError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] taran_config::ConfigError),

    /// A tool misbehaved in a way that isn't attributable to the server.
    #[error("tool error: {0}")]
    Tool(String),
}
