//! Protocol session layered on a transport.
//!
//! A [`Session`] drives the capability handshake and the tools/list and
//! tools/call requests over one [`Transport`]. Its lifecycle is an explicit
//! state machine:
//!
//! ```text
//! Unopened ── initialize() ──▶ Initializing ──▶ Ready ── close() ──▶ Closed
//! ```
//!
//! A session is owned by exactly one connection and must not be reused after
//! close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest,
    ServerInfo,
};
use crate::transport::{Transport, DEFAULT_TIMEOUT};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet handshaken.
    Unopened,
    /// Handshake in flight (or failed part-way).
    Initializing,
    /// Handshake complete; requests allowed.
    Ready,
    /// Torn down; unusable.
    Closed,
}

/// A protocol session over one transport.
pub struct Session {
    /// Transport, serialized behind a lock so `&self` requests don't interleave.
    transport: Mutex<Transport>,
    state: SessionState,
    server_info: Option<ServerInfo>,
    request_id: AtomicU64,
    timeout: Duration,
}

impl Session {
    /// Create a session over an opened transport with the default timeout.
    pub fn new(transport: Transport) -> Self {
        Self::with_timeout(transport, DEFAULT_TIMEOUT)
    }

    /// Create a session with a per-request timeout.
    pub fn with_timeout(transport: Transport, timeout: Duration) -> Self {
        Self {
            transport: Mutex::new(transport),
            state: SessionState::Unopened,
            server_info: None,
            request_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is ready for requests.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Server info (available after initialization).
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and get the raw result value.
    fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);

        let mut transport = self
            .transport
            .lock()
            .map_err(|_| McpError::transport("failed to acquire transport lock"))?;

        let response = transport.send_request(&request, self.timeout)?;
        response.into_result().map_err(McpError::from)
    }

    /// Send a notification (no response expected).
    fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);

        let mut transport = self
            .transport
            .lock()
            .map_err(|_| McpError::transport("failed to acquire transport lock"))?;

        transport.send_notification(&notification, self.timeout)
    }

    /// Perform the capability handshake.
    ///
    /// Calling this while already `Ready` is a no-op: no duplicate handshake
    /// message is sent. A malformed or error response fails with
    /// [`McpError::Handshake`] and leaves the session in `Initializing`; the
    /// only way out of that state is [`close`](Self::close).
    pub fn initialize(&mut self) -> Result<&ServerInfo> {
        match self.state {
            SessionState::Ready => {
                return self.server_info.as_ref().ok_or(McpError::NotReady);
            }
            SessionState::Closed => {
                return Err(McpError::protocol("session already closed"));
            }
            SessionState::Unopened | SessionState::Initializing => {}
        }

        self.state = SessionState::Initializing;

        let params = InitializeParams::default();
        let result = self
            .send_request("initialize", Some(serde_json::to_value(&params)?))
            .map_err(|e| match e {
                McpError::Server { code, message, .. } => {
                    McpError::handshake(format!("server rejected initialize ({code}): {message}"))
                }
                other => other,
            })?;

        let init_result: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::handshake(format!("malformed initialize response: {e}")))?;

        tracing::info!(
            server = %init_result.server_info.name,
            version = %init_result.server_info.version,
            protocol = %init_result.protocol_version,
            "session initialized"
        );

        self.send_notification("notifications/initialized", None)?;

        self.server_info = Some(init_result.server_info);
        self.state = SessionState::Ready;

        Ok(self.server_info.as_ref().expect("just set"))
    }

    /// List available tools, returning the raw result value.
    ///
    /// The shape is not uniform across server implementations; callers
    /// normalize it (see [`crate::manager::normalize_tool_list`]).
    pub fn list_tools(&self) -> Result<Value> {
        if !self.is_ready() {
            return Err(McpError::NotReady);
        }
        self.send_request("tools/list", None)
    }

    /// Call a tool, returning the raw result value.
    ///
    /// Blocks the calling thread until the correlated response arrives or
    /// the session timeout elapses ([`McpError::Timeout`]).
    pub fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<Value> {
        if !self.is_ready() {
            return Err(McpError::NotReady);
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result = self.send_request("tools/call", Some(serde_json::to_value(&params)?));

        match &result {
            Ok(_) => tracing::debug!(tool = %name, "tool call succeeded"),
            Err(e) => tracing::warn!(tool = %name, error = %e, "tool call failed"),
        }

        result
    }

    /// Tear the session down from any state.
    ///
    /// Always attempts to release the transport, even if the session was
    /// mid-handshake or already erroring. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;

        let mut transport = self
            .transport
            .lock()
            .map_err(|_| McpError::transport("failed to acquire transport lock"))?;
        transport.shutdown()
    }

    /// Check if the underlying transport is still connected.
    pub fn is_connected(&self) -> bool {
        if let Ok(mut transport) = self.transport.lock() {
            transport.is_connected()
        } else {
            false
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("server", &self.server_info.as_ref().map(|s| &s.name))
            .finish()
    }
}
