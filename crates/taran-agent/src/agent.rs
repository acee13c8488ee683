//! The tool-calling orchestration loop.
//!
//! [`Agent::turn`] drives one user turn: it sends the conversation plus the
//! registry's tool declarations to the model, dispatches any requested tool
//! calls sequentially, feeds the results back, and repeats until the model
//! produces a plain-text answer or the round budget runs out.

use std::sync::Arc;

use taran_config::{ConfigStore, ToolChoice};
use taran_llm::{ChatMessage, ChatRequest, ChatResponse, SharedBackend, ToolCallRequest};

use crate::error::Result;
use crate::tool::{ToolRegistry, ToolResult};

/// Default bound on tool-dispatch rounds within one turn.
pub const MAX_TOOL_ROUNDS: u32 = 50;

/// Message appended when the round budget runs out.
pub(crate) const EXHAUSTED_MESSAGE: &str =
    "No conclusive answer was produced: the tool-call budget for this turn was exhausted.";

// ─────────────────────────────────────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered, append-only conversation history.
///
/// Only the orchestration loop appends to it; prior turns are never
/// truncated within a run.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// The messages so far.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if the conversation is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Record a streamed final answer.
    ///
    /// [`Agent::turn_stream`](crate::stream) works on a snapshot, so callers
    /// that keep the conversation across turns append the drained answer
    /// here. [`Agent::turn`] does this itself.
    pub fn record_answer(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(text));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model name.
    pub model: String,
    /// System prompt prepended to every request (not stored in history).
    pub system_prompt: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Whether tools may be offered at all.
    pub tool_choice: ToolChoice,
    /// Bound on tool-dispatch rounds per turn.
    pub max_rounds: u32,
}

impl AgentConfig {
    /// Create a config for `model` with defaults.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            temperature: None,
            tool_choice: ToolChoice::Auto,
            max_rounds: MAX_TOOL_ROUNDS,
        }
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the tool choice mode.
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    /// Set the round budget.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

/// One tool call and its result, as fed back into the conversation.
#[derive(Debug, Clone)]
pub struct ToolExchange {
    /// The model-issued call.
    pub call: ToolCallRequest,
    /// The normalized result.
    pub result: ToolResult,
}

/// Outcome of one user turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The final answer text (or the exhaustion message).
    pub text: String,
    /// Every tool exchange of the turn, in dispatch order.
    pub exchanges: Vec<ToolExchange>,
    /// Tool-dispatch rounds used.
    pub rounds: u32,
    /// True if the round budget ran out before a plain-text answer.
    pub exhausted: bool,
}

/// The tool-calling agent.
pub struct Agent {
    backend: SharedBackend,
    tools: ToolRegistry,
    store: Arc<ConfigStore>,
    config: AgentConfig,
}

impl Agent {
    /// Create an agent.
    pub fn new(
        backend: SharedBackend,
        tools: ToolRegistry,
        store: Arc<ConfigStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            backend,
            tools,
            store,
            config,
        }
    }

    /// The agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The tool registry.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The configuration store.
    pub fn store(&self) -> Arc<ConfigStore> {
        Arc::clone(&self.store)
    }

    /// The model backend.
    pub fn backend(&self) -> SharedBackend {
        Arc::clone(&self.backend)
    }

    /// Whether tools should be offered on the next request.
    pub(crate) fn offer_tools(&self) -> bool {
        self.config.tool_choice == ToolChoice::Auto
            && !self.tools.is_empty()
            && self.store.tool_support(&self.config.model)
    }

    /// Build a chat request from the conversation.
    pub(crate) fn build_request(
        &self,
        messages: &[ChatMessage],
        offer_tools: bool,
    ) -> ChatRequest {
        let mut all = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &self.config.system_prompt {
            all.push(ChatMessage::system(prompt.clone()));
        }
        all.extend_from_slice(messages);

        let mut request = ChatRequest::new(&self.config.model, all);
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if offer_tools {
            request = request.with_tools(self.tools.describe_for_model());
        }
        request
    }

    /// Send one request, handling the "model does not support tools" case.
    ///
    /// On that specific rejection the capability cache is updated and the
    /// request retried once without tools; every other backend error
    /// propagates.
    pub(crate) async fn chat_round(
        &self,
        messages: &[ChatMessage],
        offer_tools: bool,
    ) -> Result<ChatResponse> {
        let request = self.build_request(messages, offer_tools);

        match self.backend.chat(request).await {
            Ok(response) => Ok(response),
            Err(e) if offer_tools && e.is_tool_support_error() => {
                tracing::warn!(
                    model = %self.config.model,
                    "model rejected tools; caching and retrying without them"
                );
                if let Err(persist) = self.store.set_tool_support(&self.config.model, false) {
                    tracing::warn!(error = %persist, "failed to persist tool-support flag");
                }
                let request = self.build_request(messages, false);
                Ok(self.backend.chat(request).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Execute a single turn of conversation.
    ///
    /// Appends the user message, loops over tool-call rounds, and returns
    /// the final answer. Exhausting the round budget produces a terminal
    /// message, not an error; only backend failures are errors.
    pub async fn turn(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
    ) -> Result<TurnOutcome> {
        conversation.push(ChatMessage::user(user_message));

        let mut exchanges: Vec<ToolExchange> = Vec::new();
        let mut rounds = 0u32;

        loop {
            let offer_tools = self.offer_tools();

            tracing::debug!(
                rounds,
                messages = conversation.len(),
                offer_tools,
                model = %self.config.model,
                "calling model"
            );

            let response = self.chat_round(conversation.messages(), offer_tools).await?;

            if !response.has_tool_calls() {
                let text = response.text().to_string();
                conversation.push(ChatMessage::assistant(text.clone()));

                tracing::info!(rounds, tool_calls = exchanges.len(), "turn completed");

                return Ok(TurnOutcome {
                    text,
                    exchanges,
                    rounds,
                    exhausted: false,
                });
            }

            if rounds >= self.config.max_rounds {
                tracing::warn!(rounds, "tool-call budget exhausted");
                conversation.push(ChatMessage::assistant(EXHAUSTED_MESSAGE));

                return Ok(TurnOutcome {
                    text: EXHAUSTED_MESSAGE.to_string(),
                    exchanges,
                    rounds,
                    exhausted: true,
                });
            }
            rounds += 1;

            let calls = response.tool_calls().to_vec();
            tracing::info!(
                round = rounds,
                tool_count = calls.len(),
                tools = %calls.iter().map(|c| c.name()).collect::<Vec<_>>().join(", "),
                "dispatching tools"
            );

            conversation.push(response.message.clone());

            // Sequential, in the order requested: each result may inform
            // the interpretation of subsequent calls. One failing call is
            // tagged and the rest of the batch still runs.
            for call in calls {
                let result = self
                    .tools
                    .dispatch(call.name(), call.arguments().clone())
                    .await;

                conversation.push(ChatMessage::tool(call.name(), result.to_model_content()));
                exchanges.push(ToolExchange { call, result });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::test_tools::{BrokenTool, EchoTool};
    use serde_json::json;
    use taran_llm::{LlmError, MockBackend};

    fn test_store(doc: &str) -> (tempfile::TempDir, Arc<ConfigStore>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taran.toml");
        std::fs::write(&path, doc).unwrap();
        let store = Arc::new(ConfigStore::load(&path).unwrap());
        (dir, store)
    }

    fn agent_with(
        backend: MockBackend,
        store: Arc<ConfigStore>,
        config: AgentConfig,
    ) -> (Arc<MockBackend>, Agent) {
        let backend = Arc::new(backend);
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        tools.register(BrokenTool);
        let agent = Agent::new(Arc::clone(&backend) as SharedBackend, tools, store, config);
        (backend, agent)
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let (_dir, store) = test_store("");
        let (backend, agent) = agent_with(
            MockBackend::with_text("Just an answer."),
            store,
            AgentConfig::new("m"),
        );

        let mut conversation = Conversation::new();
        let outcome = agent.turn(&mut conversation, "hi").await.unwrap();

        assert_eq!(outcome.text, "Just an answer.");
        assert!(!outcome.exhausted);
        assert_eq!(outcome.rounds, 0);
        assert!(outcome.exchanges.is_empty());
        // user + assistant
        assert_eq!(conversation.len(), 2);
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        // Scenario: "list files" → one list_directory-style call → answer.
        let (_dir, store) = test_store("");
        let (backend, agent) = agent_with(
            MockBackend::new(vec![
                ChatResponse::tool_call_reply("m", "echo", json!({"message": "a.txt\nb.txt"})),
                ChatResponse::text_reply("m", "The directory holds a.txt and b.txt."),
            ]),
            store,
            AgentConfig::new("m"),
        );

        let mut conversation = Conversation::new();
        let outcome = agent.turn(&mut conversation, "list files").await.unwrap();

        assert_eq!(outcome.text, "The directory holds a.txt and b.txt.");
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.exchanges.len(), 1);
        assert_eq!(outcome.exchanges[0].call.name(), "echo");
        assert_eq!(outcome.exchanges[0].result, ToolResult::text("a.txt\nb.txt"));

        // user, assistant(call), tool, assistant(answer)
        assert_eq!(conversation.len(), 4);
        let roles: Vec<_> = conversation.messages().iter().map(|m| m.role).collect();
        use taran_llm::Role::*;
        assert_eq!(roles, vec![User, Assistant, Tool, Assistant]);

        // The second request carried the tool result back to the model.
        let second = &backend.requests()[1];
        let tool_turn = second
            .messages
            .iter()
            .find(|m| m.role == Tool)
            .expect("no tool turn sent back");
        assert_eq!(tool_turn.content, "a.txt\nb.txt");
    }

    #[tokio::test]
    async fn test_batch_second_tool_fails_first_unaffected() {
        // Scenario: two calls in one reply; the second invoker raises.
        let (_dir, store) = test_store("");
        let (_backend, agent) = agent_with(
            MockBackend::new(vec![
                ChatResponse::tool_calls_reply(
                    "m",
                    vec![
                        ToolCallRequest::new("echo", json!({"message": "first"})),
                        ToolCallRequest::new("broken", json!({})),
                    ],
                ),
                ChatResponse::text_reply("m", "done"),
            ]),
            store,
            AgentConfig::new("m"),
        );

        let mut conversation = Conversation::new();
        let outcome = agent.turn(&mut conversation, "go").await.unwrap();

        assert_eq!(outcome.exchanges.len(), 2);
        assert_eq!(outcome.exchanges[0].result, ToolResult::text("first"));
        assert!(outcome.exchanges[1].result.is_error());
        assert_eq!(outcome.text, "done");
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_turn() {
        let (_dir, store) = test_store("");
        let (_backend, agent) = agent_with(
            MockBackend::new(vec![
                ChatResponse::tool_call_reply("m", "excel_open", json!({})),
                ChatResponse::text_reply("m", "sorry"),
            ]),
            store,
            AgentConfig::new("m"),
        );

        let mut conversation = Conversation::new();
        let outcome = agent.turn(&mut conversation, "open it").await.unwrap();

        assert!(outcome.exchanges[0].result.is_error());
        // The error text flowed back so the model can self-correct.
        let tool_turn = conversation
            .messages()
            .iter()
            .find(|m| m.role == taran_llm::Role::Tool)
            .unwrap();
        assert!(tool_turn.content.contains("unknown tool"));
        assert_eq!(outcome.text, "sorry");
    }

    #[tokio::test]
    async fn test_round_budget_default_is_fifty() {
        assert_eq!(AgentConfig::new("m").max_rounds, 50);

        // A model that always wants a tool call terminates after exactly
        // 50 dispatch rounds with the exhaustion message.
        let always_calling = vec![
            ChatResponse::tool_call_reply("m", "echo", json!({"message": "again"}));
            51
        ];
        let (_dir, store) = test_store("");
        let (backend, agent) =
            agent_with(MockBackend::new(always_calling), store, AgentConfig::new("m"));

        let mut conversation = Conversation::new();
        let outcome = agent.turn(&mut conversation, "loop").await.unwrap();

        assert!(outcome.exhausted);
        assert_eq!(outcome.rounds, 50);
        assert_eq!(outcome.exchanges.len(), 50);
        assert!(outcome.text.contains("No conclusive answer"));
        assert_eq!(backend.request_count(), 51);
    }

    #[tokio::test]
    async fn test_capability_fallback_retries_without_tools() {
        let (_dir, store) = test_store("");
        let (backend, agent) = agent_with(
            MockBackend::with_script(vec![
                Err(LlmError::Backend(
                    "registry.ollama.ai/library/tinyllama does not support tools".to_string(),
                )),
                Ok(ChatResponse::text_reply("m", "plain answer")),
            ]),
            Arc::clone(&store),
            AgentConfig::new("tinyllama"),
        );

        assert!(store.tool_support("tinyllama"));

        let mut conversation = Conversation::new();
        let outcome = agent.turn(&mut conversation, "hi").await.unwrap();

        assert_eq!(outcome.text, "plain answer");
        // The flag was cached and persisted.
        assert!(!store.tool_support("tinyllama"));

        // First request offered tools, the retry did not.
        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].tools.is_empty());
        assert!(requests[1].tools.is_empty());
    }

    #[tokio::test]
    async fn test_cached_unsupported_model_never_offered_tools() {
        let (_dir, store) = test_store("[tool_support]\n\"m\" = false\n");
        let (backend, agent) = agent_with(
            MockBackend::with_text("answer"),
            store,
            AgentConfig::new("m"),
        );

        let mut conversation = Conversation::new();
        agent.turn(&mut conversation, "hi").await.unwrap();

        assert!(backend.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_tool_choice_none_disables_tools() {
        let (_dir, store) = test_store("");
        let (backend, agent) = agent_with(
            MockBackend::with_text("answer"),
            store,
            AgentConfig::new("m").with_tool_choice(ToolChoice::None),
        );

        let mut conversation = Conversation::new();
        agent.turn(&mut conversation, "hi").await.unwrap();

        assert!(backend.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_system_prompt_sent_but_not_stored() {
        let (_dir, store) = test_store("");
        let (backend, agent) = agent_with(
            MockBackend::with_text("ok"),
            store,
            AgentConfig::new("m").with_system_prompt("You are terse."),
        );

        let mut conversation = Conversation::new();
        agent.turn(&mut conversation, "hi").await.unwrap();

        let request = &backend.requests()[0];
        assert_eq!(request.messages[0].role, taran_llm::Role::System);
        assert_eq!(request.messages[0].content, "You are terse.");
        // History keeps only user + assistant.
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0].role, taran_llm::Role::User);
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let (_dir, store) = test_store("");
        let (_backend, agent) = agent_with(
            MockBackend::with_script(vec![Err(LlmError::Network("daemon down".to_string()))]),
            store,
            AgentConfig::new("m"),
        );

        let mut conversation = Conversation::new();
        let err = agent.turn(&mut conversation, "hi").await.unwrap_err();
        assert!(err.to_string().contains("daemon down"));
    }

    #[tokio::test]
    async fn test_history_grows_across_turns() {
        let (_dir, store) = test_store("");
        let (_backend, agent) = agent_with(
            MockBackend::new(vec![
                ChatResponse::text_reply("m", "one"),
                ChatResponse::text_reply("m", "two"),
            ]),
            store,
            AgentConfig::new("m"),
        );

        let mut conversation = Conversation::new();
        agent.turn(&mut conversation, "first").await.unwrap();
        let after_first = conversation.len();
        agent.turn(&mut conversation, "second").await.unwrap();

        // No truncation: the second turn only appended.
        assert_eq!(conversation.len(), after_first + 2);
        assert_eq!(conversation.messages()[0].content, "first");
    }
}
