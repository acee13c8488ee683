//! Wire types for chat requests and responses.
//!
//! These serialize directly to the Ollama `/api/chat` shapes; the
//! [`ChatBackend`](crate::backend::ChatBackend) trait keeps the rest of the
//! system provider-agnostic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The function being called.
    pub function: FunctionCall,
}

impl ToolCallRequest {
    /// Create a tool call request.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    /// Name of the requested tool.
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Arguments of the requested call.
    pub fn arguments(&self) -> &Value {
        &self.function.arguments
    }
}

/// A function name plus its argument object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name.
    pub name: String,
    /// Arguments as a JSON object.
    #[serde(default)]
    pub arguments: Value,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// For tool-role messages, the name of the tool that produced the content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_calls(text: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            tool_calls: calls,
            tool_name: None,
        }
    }

    /// Create a tool-result message.
    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: Some(tool_name.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Declarations
// ─────────────────────────────────────────────────────────────────────────────

/// A tool declaration offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Declaration kind (always "function").
    #[serde(rename = "type")]
    pub kind: String,
    /// The function declaration.
    pub function: FunctionSpec,
}

/// Function declaration details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema of the parameters.
    pub parameters: Value,
}

impl ToolSpec {
    /// Create a function declaration.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Name of the declared tool.
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

impl ChatOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

/// A chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use.
    pub model: String,
    /// The conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Tools available for the model to call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    /// Whether to stream the response.
    #[serde(default)]
    pub stream: bool,
    /// Sampling options.
    #[serde(default, skip_serializing_if = "ChatOptions::is_empty")]
    pub options: ChatOptions,
}

impl ChatRequest {
    /// Create a new request.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            stream: false,
            options: ChatOptions::default(),
        }
    }

    /// Offer tools to the model.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }
}

/// A chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The model that produced the reply.
    pub model: String,
    /// The assistant's message.
    pub message: ChatMessage,
    /// Whether generation is complete.
    #[serde(default)]
    pub done: bool,
    /// Why generation stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    /// Prompt token count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Generated token count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl ChatResponse {
    /// A plain-text reply, for tests and mocks.
    pub fn text_reply(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: ChatMessage::assistant(content),
            done: true,
            done_reason: Some("stop".to_string()),
            prompt_eval_count: None,
            eval_count: None,
        }
    }

    /// A reply requesting one tool call, for tests and mocks.
    pub fn tool_call_reply(model: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self::tool_calls_reply(model, vec![ToolCallRequest::new(name, args)])
    }

    /// A reply requesting several tool calls, for tests and mocks.
    pub fn tool_calls_reply(model: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            model: model.into(),
            message: ChatMessage::assistant_with_calls("", calls),
            done: true,
            done_reason: Some("stop".to_string()),
            prompt_eval_count: None,
            eval_count: None,
        }
    }

    /// Tool calls in the reply.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.message.tool_calls
    }

    /// Check whether the reply requests tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }

    /// The reply's text content.
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_calls.is_empty());

        let tool = ChatMessage::tool("list_directory", "a.txt");
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_name.as_deref(), Some("list_directory"));
    }

    #[test]
    fn test_plain_message_wire_shape() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        // Empty collections stay off the wire.
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_name"));
    }

    #[test]
    fn test_request_wire_shape() {
        let request = ChatRequest::new("llama3.2", vec![ChatMessage::user("hi")])
            .with_tools(vec![ToolSpec::function(
                "echo",
                "Echo back",
                json!({"type": "object", "properties": {}}),
            )])
            .with_temperature(0.2);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\":\"llama3.2\""));
        assert!(json.contains("\"type\":\"function\""));
        assert!(json.contains("\"temperature\":0.2"));
        assert!(json.contains("\"stream\":false"));
    }

    #[test]
    fn test_request_without_tools_or_options() {
        let request = ChatRequest::new("llama3.2", vec![ChatMessage::user("hi")]);
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("\"tools\""));
        assert!(!json.contains("\"options\""));
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "model": "llama3.2",
            "created_at": "2025-05-01T10:00:00Z",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "add", "arguments": {"a": 1, "b": 2}}}
                ]
            },
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 120,
            "eval_count": 14
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls()[0].name(), "add");
        assert_eq!(response.tool_calls()[0].arguments()["b"], 2);
        assert_eq!(response.eval_count, Some(14));
    }

    #[test]
    fn test_text_reply_helper() {
        let response = ChatResponse::text_reply("m", "The answer is 3.");
        assert!(!response.has_tool_calls());
        assert_eq!(response.text(), "The answer is 3.");
    }

    #[test]
    fn test_tool_calls_reply_helper() {
        let response = ChatResponse::tool_calls_reply(
            "m",
            vec![
                ToolCallRequest::new("a", json!({})),
                ToolCallRequest::new("b", json!({"x": 1})),
            ],
        );
        assert_eq!(response.tool_calls().len(), 2);
        assert_eq!(response.tool_calls()[1].name(), "b");
    }
}
