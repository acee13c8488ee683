//! Chat backend abstraction for Taran.
//!
//! The orchestration loop talks to the model through the [`ChatBackend`]
//! trait; this crate provides the Ollama implementation used in production
//! and a scripted [`MockBackend`] used in tests. Wire types follow the
//! daemon's native chat API, including tool declarations and tool-call
//! replies.

pub mod backend;
pub mod error;
pub mod ollama;
pub mod types;

pub use backend::{with_retry, ChatBackend, MockBackend, SharedBackend};
pub use error::{LlmError, Result};
pub use ollama::{ModelSummary, OllamaBackend, OllamaConfig, DEFAULT_OLLAMA_URL};
pub use types::{
    ChatMessage, ChatOptions, ChatRequest, ChatResponse, FunctionCall, FunctionSpec, Role,
    ToolCallRequest, ToolSpec,
};
