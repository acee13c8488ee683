//! The [`Tool`] trait and [`ToolRegistry`].
//!
//! A tool is a named capability with a declared input schema. The registry
//! maps names to tools, produces the model-facing declaration list, and
//! dispatches model-issued calls. Dispatch never returns an error: an
//! unknown name or a failing invoker becomes an error-variant
//! [`ToolResult`], so the model can read the failure and self-correct.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use taran_llm::ToolSpec;

use crate::error::Result;
use crate::schema::to_model_schema;

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A named capability invocable by the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of this tool.
    fn name(&self) -> &str;

    /// Get a human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for this tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: Value) -> Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution: always text or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    /// Successful text output.
    Text {
        /// The text content.
        content: String,
    },
    /// Tool execution failed.
    Error {
        /// Error message.
        message: String,
    },
}

impl ToolResult {
    /// Create a text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// Get the content as a string for the model.
    pub fn to_model_content(&self) -> String {
        match self {
            Self::Text { content } => content.clone(),
            Self::Error { message } => format!("Error: {}", message),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of available tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it is replaced (last
    /// write wins). Callers registering tools from several servers into one
    /// registry must avoid unintentional collisions.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            tracing::warn!(tool = %name, "replacing previously registered tool");
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Produce the model-facing tool declaration list.
    ///
    /// Each declared schema goes through the cleaner, so the output always
    /// has `type` and `properties` and never the meta-fields the model
    /// rejects.
    pub fn describe_for_model(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| {
                ToolSpec::function(
                    tool.name(),
                    tool.description(),
                    to_model_schema(Some(&tool.parameters())),
                )
            })
            .collect();
        specs.sort_by(|a, b| a.name().cmp(b.name()));
        specs
    }

    /// Dispatch a model-issued call.
    ///
    /// Never fails: an unknown tool name or a failing invoker comes back as
    /// an error-variant result rather than an `Err`.
    pub async fn dispatch(&self, name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = %name, "model requested unknown tool");
            return ToolResult::error(format!(
                "unknown tool '{}'; available tools: {}",
                name,
                self.names().join(", ")
            ));
        };

        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool execution failed");
                ToolResult::error(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_tools {
    use super::*;
    use serde_json::json;

    /// Echoes its "message" argument back.
    pub struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo back the input"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            })
        }

        async fn execute(&self, params: Value) -> Result<ToolResult> {
            let message = params
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(ToolResult::text(message))
        }
    }

    /// Always fails with an Err (not an error-variant result).
    pub struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _params: Value) -> Result<ToolResult> {
            Err(crate::error::AgentError::Tool("wires crossed".to_string()))
        }
    }
}
