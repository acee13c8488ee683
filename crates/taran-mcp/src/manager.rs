//! Per-server connection management.
//!
//! [`ServerConnection`] owns the lifecycle of one transport + session pair,
//! selected by named server configuration: it reads the descriptor from the
//! injected [`ConfigStore`], opens the matching transport, runs the
//! handshake, and exposes normalized tool discovery and invocation.
//!
//! Tool lists and tool results arrive in different shapes from different
//! server implementations; both are funneled through explicit normalization
//! functions with a safe fallback, so callers above this layer never see a
//! raw wire shape or a transport exception.
//!
//! [`McpManager`] adds multi-server convenience on top (connect-all,
//! list-all, shutdown-all).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use taran_config::{ConfigError, ConfigStore, ServerEntry};

use crate::error::{McpError, Result};
use crate::protocol::{ServerInfo, ToolDescriptor};
use crate::session::Session;
use crate::transport::{HttpOptions, SseOptions, Transport, DEFAULT_TIMEOUT};

// ─────────────────────────────────────────────────────────────────────────────
// Tool Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized outcome of one tool invocation: always text or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool produced output.
    Ok {
        /// Concatenated text content.
        text: String,
    },
    /// The tool (or the transport carrying it) failed.
    Error {
        /// Readable failure message.
        message: String,
    },
}

impl ToolOutcome {
    /// Create a success outcome.
    pub fn ok(text: impl Into<String>) -> Self {
        Self::Ok { text: text.into() }
    }

    /// Create an error outcome.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if this outcome is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The text either way: tool output or failure message.
    pub fn content(&self) -> &str {
        match self {
            Self::Ok { text } => text,
            Self::Error { message } => message,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Connection
// ─────────────────────────────────────────────────────────────────────────────

/// A live connection to one named tool server.
pub struct ServerConnection {
    name: String,
    session: Session,
}

impl ServerConnection {
    /// Connect to the server named `name` in the configuration.
    ///
    /// Fails with a config error if the name is absent or a required field
    /// is missing, and with [`McpError::UnsupportedTransport`] for an
    /// unrecognized transport kind. Nothing is spawned in either case.
    pub fn connect(store: &ConfigStore, name: &str) -> Result<Self> {
        let entry = store.server(name)?;
        Self::connect_entry(&entry)
    }

    /// Connect using an already-resolved server entry.
    pub fn connect_entry(entry: &ServerEntry) -> Result<Self> {
        let timeout = entry
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let transport = open_transport(entry, timeout)?;
        let mut session = Session::with_timeout(transport, timeout);

        if let Err(e) = session.initialize() {
            // Handshake failed: release the transport before surfacing.
            close_quietly(&mut session, &entry.name);
            return Err(e);
        }

        tracing::info!(
            server = %entry.name,
            transport = %entry.transport,
            "connected to tool server"
        );

        Ok(Self {
            name: entry.name.clone(),
            session,
        })
    }

    /// The configured server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server info from the handshake.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.session.server_info()
    }

    /// Whether the underlying transport is still connected.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// List the server's tools, normalized across response shapes.
    ///
    /// Unrecognized shapes yield an empty list with a logged warning, never
    /// an error.
    pub fn available_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let raw = self.session.list_tools()?;
        let tools = normalize_tool_list(&raw);

        tracing::debug!(
            server = %self.name,
            tool_count = tools.len(),
            "listed tools"
        );

        Ok(tools)
    }

    /// Invoke a tool, converting every failure into an error outcome.
    ///
    /// The orchestration layer above never needs to catch transport-level
    /// errors: a timeout, a dead process or a server error all come back as
    /// `ToolOutcome::Error`.
    pub fn invoke_tool(&self, name: &str, arguments: Value) -> ToolOutcome {
        match self.session.call_tool(name, Some(arguments)) {
            Ok(raw) => normalize_call_result(raw),
            Err(e) => {
                tracing::warn!(server = %self.name, tool = %name, error = %e, "tool invocation failed");
                ToolOutcome::error(format!("tool '{}' failed: {}", name, e))
            }
        }
    }

    /// Close the connection, swallowing secondary teardown errors.
    pub fn close(&mut self) {
        close_quietly(&mut self.session, &self.name);
    }
}

impl Drop for ServerConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("name", &self.name)
            .field("session", &self.session)
            .finish()
    }
}

/// Close a session; a failure while closing an already-failed session is
/// reported as a warning, not an error.
fn close_quietly(session: &mut Session, server: &str) {
    if let Err(e) = session.close() {
        tracing::warn!(server, error = %e, "error while closing session");
    }
}

/// Open the transport selected by the entry's transport kind.
fn open_transport(entry: &ServerEntry, timeout: Duration) -> Result<Transport> {
    match entry.transport.as_str() {
        "stdio" => {
            let command = entry.command.as_deref().ok_or_else(|| {
                ConfigError::missing_field("command", format!("server '{}'", entry.name))
            })?;

            let mut args = entry.args.clone();
            if let Some(workspace) = &entry.workspace {
                // Servers that scope themselves to a directory take it as a
                // trailing absolute path argument.
                let absolute = std::fs::canonicalize(workspace).unwrap_or_else(|_| workspace.clone());
                args.push(absolute.display().to_string());
            }

            let env = entry.env_tuples();
            let env = if env.is_empty() {
                None
            } else {
                Some(env.as_slice())
            };

            Transport::spawn_stdio(command, &args, env)
        }
        "sse" => {
            let url = entry.url.as_deref().ok_or_else(|| {
                ConfigError::missing_field("url", format!("server '{}'", entry.name))
            })?;

            let mut options = SseOptions::new(url).with_open_timeout(timeout);
            for (key, value) in entry.header_tuples() {
                options = options.with_header(key, value);
            }
            Transport::connect_sse(options)
        }
        "http" => {
            let url = entry.url.as_deref().ok_or_else(|| {
                ConfigError::missing_field("url", format!("server '{}'", entry.name))
            })?;

            let mut options = HttpOptions::new(url);
            if let Some(retries) = entry.retries {
                options = options.with_retries(retries);
            }
            for (key, value) in entry.header_tuples() {
                options = options.with_header(key, value);
            }
            Transport::connect_http(options)
        }
        other => Err(McpError::UnsupportedTransport(other.to_string())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalization
// ─────────────────────────────────────────────────────────────────────────────

/// Normalize a raw tools/list result across the known response shapes.
///
/// Recognized, in order:
/// 1. an object with a `tools` array (the standard shape),
/// 2. an array of ≥3 elements whose third element is an array (a legacy
///    server packs the list as the third element of a tuple),
/// 3. a bare array of tool objects.
///
/// Anything else yields an empty list with a logged warning. Individual
/// entries that fail to parse are skipped, also with a warning.
pub fn normalize_tool_list(raw: &Value) -> Vec<ToolDescriptor> {
    let entries: &[Value] = if let Some(tools) = raw.get("tools").and_then(Value::as_array) {
        tools
    } else if let Some(array) = raw.as_array() {
        match array.get(2).and_then(Value::as_array) {
            Some(third) if array.len() >= 3 => third,
            _ => array,
        }
    } else {
        tracing::warn!(shape = %json_type_name(raw), "unexpected tools/list response shape");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(tool) => Some(tool),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparsable tool entry");
                None
            }
        })
        .collect()
}

/// Normalize a raw tools/call result into a [`ToolOutcome`].
///
/// A structured `content` list is preferred: its text parts are concatenated
/// in order and non-text items stringified. Without one, the raw value is
/// stringified. An `isError` flag turns the same text into the error
/// variant.
pub fn normalize_call_result(raw: Value) -> ToolOutcome {
    let is_error = raw
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let from_content = raw.get("content").and_then(Value::as_array).map(|items| {
        items
            .iter()
            .map(|item| match item.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    });

    let text = match from_content {
        Some(text) => text,
        None => match raw {
            Value::String(s) => s,
            other => other.to_string(),
        },
    };

    if is_error {
        ToolOutcome::error(text)
    } else {
        ToolOutcome::ok(text)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Multi-server Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle manager for connections to multiple configured servers.
pub struct McpManager {
    store: Arc<ConfigStore>,
    connections: HashMap<String, Arc<ServerConnection>>,
}

impl McpManager {
    /// Create a manager over the given configuration store.
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            connections: HashMap::new(),
        }
    }

    /// Connect one server by name. Already-connected servers are left alone.
    pub fn connect(&mut self, name: &str) -> Result<Arc<ServerConnection>> {
        if let Some(existing) = self.connections.get(name) {
            return Ok(Arc::clone(existing));
        }

        let connection = Arc::new(ServerConnection::connect(&self.store, name)?);
        self.connections
            .insert(name.to_string(), Arc::clone(&connection));
        Ok(connection)
    }

    /// Connect every enabled server in the configuration.
    ///
    /// Servers that fail to connect are logged and skipped; returns the
    /// number of live connections.
    pub fn connect_all(&mut self) -> usize {
        for name in self.store.server_names() {
            let enabled = self.store.server(&name).map(|e| e.enabled).unwrap_or(false);
            if !enabled {
                tracing::debug!(server = %name, "server disabled, skipping");
                continue;
            }
            if let Err(e) = self.connect(&name) {
                tracing::error!(server = %name, error = %e, "failed to connect to tool server");
            }
        }

        tracing::info!(connected = self.connections.len(), "server connection complete");
        self.connections.len()
    }

    /// Get a live connection by name.
    pub fn get(&self, name: &str) -> Option<Arc<ServerConnection>> {
        self.connections.get(name).cloned()
    }

    /// Check if a server is connected.
    pub fn is_connected(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Names of all live connections.
    pub fn connected_names(&self) -> Vec<&str> {
        self.connections.keys().map(|s| s.as_str()).collect()
    }

    /// Number of live connections.
    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }

    /// List tools from every live connection, keyed by server name.
    ///
    /// Servers that fail to list are logged and omitted.
    pub fn list_all_tools(&self) -> HashMap<String, Vec<ToolDescriptor>> {
        let mut all = HashMap::new();
        for (name, connection) in &self.connections {
            match connection.available_tools() {
                Ok(tools) => {
                    all.insert(name.clone(), tools);
                }
                Err(e) => {
                    tracing::error!(server = %name, error = %e, "failed to list tools");
                }
            }
        }
        all
    }

    /// Disconnect one server. Returns true if it was connected.
    pub fn disconnect(&mut self, name: &str) -> bool {
        self.connections.remove(name).is_some()
    }

    /// Disconnect every server.
    pub fn shutdown_all(&mut self) {
        tracing::info!(count = self.connections.len(), "shutting down tool servers");
        self.connections.clear();
    }
}

impl std::fmt::Debug for McpManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpManager")
            .field("connected", &self.connections.keys().collect::<Vec<_>>())
            .finish()
    }
}
