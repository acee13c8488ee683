//! Tool-server client for Taran.
//!
//! This crate connects to external tool servers over a small JSON-RPC
//! protocol and exposes uniform tool discovery and invocation across three
//! transport variants.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ServerConnection / McpManager                              │
//! │  - selects transport from named server configuration        │
//! │  - normalizes tool-list and tool-result shapes              │
//! │  - wraps failures into ToolOutcome::Error                   │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Session                                                    │
//! │  - Unopened → Initializing → Ready → Closed                 │
//! │  - initialize / tools/list / tools/call                     │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Transport                                                  │
//! │  - Stdio: child process, Content-Length framed JSON-RPC     │
//! │  - Sse: persistent event-stream + POST-back endpoint        │
//! │  - Http: POST per message, JSON or event-stream reply       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The protocol flow is:
//! 1. Client sends `initialize` with capabilities
//! 2. Server responds with its capabilities
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` and `tools/call`
//!
//! Every blocking receive is bounded by a per-request timeout, and closing a
//! connection is safe to race with an in-flight call: the transport's reader
//! thread observes the teardown and pending receives fail instead of
//! hanging.

pub mod error;
pub mod manager;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export main types
pub use error::{McpError, Result};
pub use manager::{
    normalize_call_result, normalize_tool_list, McpManager, ServerConnection, ToolOutcome,
};
pub use protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, ServerInfo, ToolDescriptor,
};
pub use session::{Session, SessionState};
pub use transport::{HttpOptions, SseOptions, Transport, DEFAULT_TIMEOUT};
