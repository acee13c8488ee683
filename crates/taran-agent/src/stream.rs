//! Streaming turns.
//!
//! [`Agent::turn_stream`] runs the same loop as [`Agent::turn`] but yields
//! progress as it happens: tool exchanges as single complete units, then the
//! final answer revealed as a monotonically growing prefix sequence — every
//! yielded `Answer` text is a prefix of the next. The stream honors a
//! cancellation token and never resumes after cancelling.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use taran_config::{ConfigStore, ToolChoice};
use taran_llm::{ChatMessage, ChatRequest, SharedBackend};

use crate::agent::{Agent, AgentConfig, Conversation, EXHAUSTED_MESSAGE};
use crate::tool::ToolRegistry;

// ─────────────────────────────────────────────────────────────────────────────
// Turn Chunk
// ─────────────────────────────────────────────────────────────────────────────

/// A chunk emitted during a streamed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnChunk {
    /// The answer so far. Each value is a prefix of the next.
    Answer {
        /// Accumulated answer text.
        text: String,
    },
    /// The model requested a tool call.
    ToolCall {
        /// Tool name.
        name: String,
        /// Call arguments.
        arguments: Value,
    },
    /// A tool finished; surfaced as one complete unit, never incrementally.
    ToolResult {
        /// Tool name.
        name: String,
        /// Whether the tool succeeded.
        ok: bool,
        /// Result content.
        content: String,
    },
    /// The turn is complete.
    Done {
        /// Tool-dispatch rounds used.
        rounds: u32,
    },
    /// The turn failed.
    Error {
        /// Readable message.
        message: String,
    },
}

impl TurnChunk {
    /// Create an answer chunk.
    pub fn answer(text: impl Into<String>) -> Self {
        Self::Answer { text: text.into() }
    }

    /// Create a tool-call chunk.
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCall {
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool-result chunk.
    pub fn tool_result(name: impl Into<String>, ok: bool, content: impl Into<String>) -> Self {
        Self::ToolResult {
            name: name.into(),
            ok,
            content: content.into(),
        }
    }

    /// Create a done chunk.
    pub fn done(rounds: u32) -> Self {
        Self::Done { rounds }
    }

    /// Create an error chunk.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// A boxed stream of turn chunks.
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnChunk> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Stream Construction
// ─────────────────────────────────────────────────────────────────────────────

struct StreamState {
    backend: SharedBackend,
    tools: ToolRegistry,
    store: Arc<ConfigStore>,
    config: AgentConfig,
    messages: Vec<ChatMessage>,
    cancellation: CancellationToken,
}

impl Agent {
    /// Execute a single turn with streamed output.
    ///
    /// The user message is appended to the conversation; the stream then
    /// works on a snapshot. Callers that keep the conversation across turns
    /// append the final answer after draining the stream.
    pub fn turn_stream(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
        cancellation: CancellationToken,
    ) -> TurnStream {
        conversation.push(ChatMessage::user(user_message));

        create_turn_stream(StreamState {
            backend: self.backend(),
            tools: self.tools().clone(),
            store: self.store(),
            config: self.config().clone(),
            messages: conversation.messages().to_vec(),
            cancellation,
        })
    }
}

fn build_request(
    config: &AgentConfig,
    tools: &ToolRegistry,
    messages: &[ChatMessage],
    offer_tools: bool,
) -> ChatRequest {
    let mut all = Vec::with_capacity(messages.len() + 1);
    if let Some(prompt) = &config.system_prompt {
        all.push(ChatMessage::system(prompt.clone()));
    }
    all.extend_from_slice(messages);

    let mut request = ChatRequest::new(&config.model, all);
    if let Some(temperature) = config.temperature {
        request = request.with_temperature(temperature);
    }
    if offer_tools {
        request = request.with_tools(tools.describe_for_model());
    }
    request
}

fn create_turn_stream(state: StreamState) -> TurnStream {
    Box::pin(async_stream::stream! {
        let StreamState { backend, tools, store, config, mut messages, cancellation } = state;
        let mut rounds = 0u32;

        loop {
            if cancellation.is_cancelled() {
                yield TurnChunk::error("cancelled");
                return;
            }

            let offer_tools = config.tool_choice == ToolChoice::Auto
                && !tools.is_empty()
                && store.tool_support(&config.model);

            let request = build_request(&config, &tools, &messages, offer_tools);
            let response = match backend.chat(request).await {
                Ok(response) => response,
                Err(e) if offer_tools && e.is_tool_support_error() => {
                    tracing::warn!(
                        model = %config.model,
                        "model rejected tools; caching and retrying without them"
                    );
                    if let Err(persist) = store.set_tool_support(&config.model, false) {
                        tracing::warn!(error = %persist, "failed to persist tool-support flag");
                    }
                    let retry = build_request(&config, &tools, &messages, false);
                    match backend.chat(retry).await {
                        Ok(response) => response,
                        Err(e) => {
                            yield TurnChunk::error(e.to_string());
                            return;
                        }
                    }
                }
                Err(e) => {
                    yield TurnChunk::error(e.to_string());
                    return;
                }
            };

            if !response.has_tool_calls() {
                // Reveal the answer as growing prefixes.
                let text = response.text().to_string();
                let mut end = 0usize;
                for ch in text.chars() {
                    if cancellation.is_cancelled() {
                        yield TurnChunk::error("cancelled");
                        return;
                    }
                    end += ch.len_utf8();
                    yield TurnChunk::answer(&text[..end]);
                }

                yield TurnChunk::done(rounds);
                return;
            }

            if rounds >= config.max_rounds {
                yield TurnChunk::answer(EXHAUSTED_MESSAGE);
                yield TurnChunk::done(rounds);
                return;
            }
            rounds += 1;

            let calls = response.tool_calls().to_vec();
            messages.push(response.message.clone());

            for call in calls {
                if cancellation.is_cancelled() {
                    yield TurnChunk::error("cancelled");
                    return;
                }

                yield TurnChunk::tool_call(call.name(), call.arguments().clone());

                let result = tools.dispatch(call.name(), call.arguments().clone()).await;

                yield TurnChunk::tool_result(
                    call.name(),
                    result.is_success(),
                    result.to_model_content(),
                );
                messages.push(ChatMessage::tool(call.name(), result.to_model_content()));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::test_tools::EchoTool;
    use futures::StreamExt;
    use serde_json::json;
    use taran_llm::{ChatResponse, MockBackend};

    fn test_agent(responses: Vec<ChatResponse>) -> (tempfile::TempDir, Agent) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taran.toml");
        std::fs::write(&path, "").unwrap();
        let store = Arc::new(ConfigStore::load(&path).unwrap());

        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);

        let agent = Agent::new(
            Arc::new(MockBackend::new(responses)),
            tools,
            store,
            AgentConfig::new("m"),
        );
        (dir, agent)
    }

    async fn collect(mut stream: TurnStream) -> Vec<TurnChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_answer_streams_as_growing_prefixes() {
        let (_dir, agent) = test_agent(vec![ChatResponse::text_reply("m", "abc")]);

        let mut conversation = Conversation::new();
        let stream = agent.turn_stream(&mut conversation, "hi", CancellationToken::new());
        let chunks = collect(stream).await;

        let answers: Vec<&str> = chunks
            .iter()
            .filter_map(|c| match c {
                TurnChunk::Answer { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        assert_eq!(answers, vec!["a", "ab", "abc"]);
        // Monotone prefix property.
        for pair in answers.windows(2) {
            assert!(pair[1].starts_with(pair[0]));
        }
        assert!(matches!(chunks.last(), Some(TurnChunk::Done { rounds: 0 })));
    }

    #[tokio::test]
    async fn test_tool_exchange_then_streamed_answer() {
        let (_dir, agent) = test_agent(vec![
            ChatResponse::tool_call_reply("m", "echo", json!({"message": "a.txt\nb.txt"})),
            ChatResponse::text_reply("m", "ok"),
        ]);

        let mut conversation = Conversation::new();
        let stream = agent.turn_stream(&mut conversation, "list files", CancellationToken::new());
        let chunks = collect(stream).await;

        // Tool call, then its complete result, then the prefix reveal.
        assert!(matches!(&chunks[0], TurnChunk::ToolCall { name, .. } if name == "echo"));
        match &chunks[1] {
            TurnChunk::ToolResult { name, ok, content } => {
                assert_eq!(name, "echo");
                assert!(ok);
                assert_eq!(content, "a.txt\nb.txt");
            }
            other => panic!("expected tool result, got {:?}", other),
        }

        let answers: Vec<&str> = chunks
            .iter()
            .filter_map(|c| match c {
                TurnChunk::Answer { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(answers, vec!["o", "ok"]);
        assert!(matches!(chunks.last(), Some(TurnChunk::Done { rounds: 1 })));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (_dir, agent) = test_agent(vec![ChatResponse::text_reply("m", "never shown")]);

        let token = CancellationToken::new();
        token.cancel();

        let mut conversation = Conversation::new();
        let stream = agent.turn_stream(&mut conversation, "hi", token);
        let chunks = collect(stream).await;

        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], TurnChunk::Error { message } if message == "cancelled"));
    }

    #[tokio::test]
    async fn test_exhaustion_streams_terminal_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taran.toml");
        std::fs::write(&path, "").unwrap();
        let store = Arc::new(ConfigStore::load(&path).unwrap());

        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);

        let agent = Agent::new(
            Arc::new(MockBackend::new(vec![
                ChatResponse::tool_call_reply(
                    "m",
                    "echo",
                    json!({"message": "x"})
                );
                3
            ])),
            tools,
            store,
            AgentConfig::new("m").with_max_rounds(2),
        );

        let mut conversation = Conversation::new();
        let stream = agent.turn_stream(&mut conversation, "loop", CancellationToken::new());
        let chunks = collect(stream).await;

        let answer = chunks
            .iter()
            .rev()
            .find_map(|c| match c {
                TurnChunk::Answer { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap();
        assert!(answer.contains("No conclusive answer"));
        assert!(matches!(chunks.last(), Some(TurnChunk::Done { rounds: 2 })));
    }

    #[tokio::test]
    async fn test_backend_error_yields_error_chunk() {
        let (_dir, agent) = test_agent(vec![]); // empty script → backend errors

        let mut conversation = Conversation::new();
        let stream = agent.turn_stream(&mut conversation, "hi", CancellationToken::new());
        let chunks = collect(stream).await;

        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], TurnChunk::Error { .. }));
    }

    #[test]
    fn test_chunk_serialization() {
        let chunk = TurnChunk::tool_result("echo", true, "out");
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("tool_result"));

        let restored: TurnChunk = serde_json::from_str(&json).unwrap();
        assert!(matches!(restored, TurnChunk::ToolResult { ok: true, .. }));
    }
}
