//! Agent core for Taran: the tool registry and the conversation loop.
//!
//! The flow mirrors the crate layering:
//!
//! 1. [`RemoteTool`] adapters bridge tool-server connections into a
//!    [`ToolRegistry`].
//! 2. [`Agent::turn`] sends the conversation plus the registry's cleaned
//!    tool declarations to the model, dispatches requested calls
//!    sequentially, and loops until a plain-text answer or the round budget
//!    (default 50) runs out.
//! 3. [`Agent::turn_stream`] yields the same turn as chunks: whole tool
//!    exchanges, then the answer as a growing prefix sequence.
//!
//! Errors local to a single tool call are folded into error-variant results
//! at the dispatch boundary; the conversation never crashes because one
//! tool or one server failed.

pub mod agent;
pub mod error;
pub mod remote;
pub mod schema;
pub mod stream;
pub mod tool;

pub use agent::{Agent, AgentConfig, Conversation, ToolExchange, TurnOutcome, MAX_TOOL_ROUNDS};
pub use error::{AgentError, Result};
pub use remote::{RemoteTool, ServerBinding};
pub use schema::{clean_schema, to_model_schema};
pub use stream::{TurnChunk, TurnStream};
pub use tool::{Tool, ToolRegistry, ToolResult};
