//! Remote tools: bridging server connections into the registry.
//!
//! A [`RemoteTool`] wraps one discovered
//! [`ToolDescriptor`](taran_mcp::ToolDescriptor) and delegates execution to
//! a tool server through one of two bindings:
//!
//! - **Shared** — a long-lived [`ServerConnection`] serializes all calls
//!   through one session.
//! - **PerCall** — a fresh connection per invocation, trading setup latency
//!   for strict isolation between concurrent tool calls.
//!
//! The protocol layer is synchronous, so session calls run under
//! `spawn_blocking`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use taran_config::ConfigStore;
use taran_mcp::{McpError, ServerConnection, ToolDescriptor, ToolOutcome};

use crate::error::{AgentError, Result};
use crate::tool::{Tool, ToolResult};

/// How a remote tool reaches its server.
#[derive(Clone)]
pub enum ServerBinding {
    /// One long-lived connection shared by every call.
    Shared(Arc<ServerConnection>),
    /// A fresh connection per call, opened from configuration.
    PerCall {
        /// Configuration store to resolve the server from.
        store: Arc<ConfigStore>,
        /// Name of the server entry.
        server: String,
    },
}

/// A tool living on a remote server.
pub struct RemoteTool {
    name: String,
    description: String,
    parameters: Value,
    binding: ServerBinding,
}

impl RemoteTool {
    /// Wrap one discovered tool descriptor.
    pub fn new(binding: ServerBinding, descriptor: &ToolDescriptor) -> Self {
        let description = descriptor
            .description
            .clone()
            .unwrap_or_else(|| format!("Remote tool: {}", descriptor.name));

        let parameters = descriptor
            .input_schema
            .clone()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));

        Self {
            name: descriptor.name.clone(),
            description,
            parameters,
            binding,
        }
    }

    /// Build shared-binding adapters for every tool on a live connection.
    pub fn from_connection(
        connection: Arc<ServerConnection>,
    ) -> std::result::Result<Vec<Self>, McpError> {
        let tools = connection.available_tools()?;
        Ok(tools
            .iter()
            .map(|descriptor| {
                Self::new(ServerBinding::Shared(Arc::clone(&connection)), descriptor)
            })
            .collect())
    }

    /// Build per-call-binding adapters for every tool on a configured server.
    ///
    /// Opens a discovery connection just long enough to list the tools, then
    /// releases it; each later invocation opens its own connection.
    pub fn from_store(
        store: Arc<ConfigStore>,
        server: &str,
    ) -> std::result::Result<Vec<Self>, McpError> {
        let discovery = ServerConnection::connect(&store, server)?;
        let tools = discovery.available_tools()?;
        drop(discovery);

        Ok(tools
            .iter()
            .map(|descriptor| {
                Self::new(
                    ServerBinding::PerCall {
                        store: Arc::clone(&store),
                        server: server.to_string(),
                    },
                    descriptor,
                )
            })
            .collect())
    }
}

impl std::fmt::Debug for RemoteTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let binding = match &self.binding {
            ServerBinding::Shared(conn) => format!("shared:{}", conn.name()),
            ServerBinding::PerCall { server, .. } => format!("per-call:{}", server),
        };
        f.debug_struct("RemoteTool")
            .field("name", &self.name)
            .field("binding", &binding)
            .finish()
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let name = self.name.clone();
        let binding = self.binding.clone();

        tracing::debug!(tool = %name, "executing remote tool");

        let outcome = tokio::task::spawn_blocking(move || match binding {
            ServerBinding::Shared(connection) => connection.invoke_tool(&name, params),
            ServerBinding::PerCall { store, server } => {
                match ServerConnection::connect(&store, &server) {
                    Ok(connection) => connection.invoke_tool(&name, params),
                    Err(e) => {
                        tracing::warn!(server = %server, error = %e, "connection for tool call failed");
                        ToolOutcome::error(format!("could not reach server '{}': {}", server, e))
                    }
                }
            }
        })
        .await
        .map_err(|e| AgentError::Tool(format!("tool task failed: {}", e)))?;

        Ok(match outcome {
            ToolOutcome::Ok { text } => ToolResult::text(text),
            ToolOutcome::Error { message } => ToolResult::error(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: None,
            input_schema: None,
            output_schema: None,
        }
    }

    fn per_call_binding(doc: &str) -> (tempfile::TempDir, ServerBinding) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taran.toml");
        std::fs::write(&path, doc).unwrap();
        let store = Arc::new(ConfigStore::load(&path).unwrap());
        (
            dir,
            ServerBinding::PerCall {
                store,
                server: "mock".to_string(),
            },
        )
    }

    #[test]
    fn test_defaults_for_sparse_descriptor() {
        let (_dir, binding) = per_call_binding("");
        let tool = RemoteTool::new(binding, &descriptor("query"));

        assert_eq!(tool.name(), "query");
        assert!(tool.description().contains("query"));
        assert_eq!(tool.parameters()["type"], "object");
    }

    #[tokio::test]
    async fn test_per_call_missing_server_is_error_result() {
        // "mock" isn't configured: execution must fold the config error
        // into an error-variant result, not abort the loop.
        let (_dir, binding) = per_call_binding("");
        let tool = RemoteTool::new(binding, &descriptor("echo"));

        let result = tool.execute(json!({})).await.unwrap();
        assert!(result.is_error());
        assert!(result.to_model_content().contains("mock"));
    }

    #[test]
    fn test_from_store_missing_server_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taran.toml");
        std::fs::write(&path, "").unwrap();
        let store = Arc::new(ConfigStore::load(&path).unwrap());

        let err = RemoteTool::from_store(store, "excel").unwrap_err();
        assert!(err.to_string().contains("excel"));
    }
}
