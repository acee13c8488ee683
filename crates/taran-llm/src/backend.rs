//! Chat backend trait and mock implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LlmError, Result};
use crate::types::{ChatRequest, ChatResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures). Non-retryable errors
/// are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    let mut backoff = initial_backoff;

    for attempt in 0..=max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < max_retries {
                    tracing::warn!(
                        backend = backend_name,
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap())
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for chat backends.
///
/// Implementations provide the actual connection to a model service. The
/// orchestration loop only depends on this trait, so tests run against
/// [`MockBackend`] and production against
/// [`OllamaBackend`](crate::ollama::OllamaBackend).
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Execute a chat request and return the full response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is reachable and properly configured.
    async fn health_check(&self) -> Result<()>;
}

/// A backend that can be shared across tasks.
pub type SharedBackend = Arc<dyn ChatBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A mock backend for testing.
///
/// Plays back a scripted sequence of replies (or failures) in order and logs
/// every request for verification.
pub struct MockBackend {
    name: String,
    script: std::sync::Mutex<Vec<Result<ChatResponse>>>,
    request_log: std::sync::Mutex<Vec<ChatRequest>>,
}

impl MockBackend {
    /// Create a mock backend that replies with `responses` in order.
    ///
    /// Requests past the end of the script fail.
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self::with_script(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock backend from a full script, including failures.
    pub fn with_script(script: Vec<Result<ChatResponse>>) -> Self {
        Self {
            name: "mock".to_string(),
            script: std::sync::Mutex::new(script),
            request_log: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend with a single text reply.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![ChatResponse::text_reply("mock-model", text)])
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.request_log.lock().unwrap().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.request_log.lock().unwrap().push(request);

        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(LlmError::Backend(
                "MockBackend: no more scripted replies".to_string(),
            ));
        }
        script.remove(0)
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_single_reply() {
        let backend = MockBackend::with_text("Hello!");

        let request = ChatRequest::new("test-model", vec![ChatMessage::user("Hi")]);
        let response = backend.chat(request).await.unwrap();

        assert_eq!(response.text(), "Hello!");
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_replies_in_order() {
        let backend = MockBackend::new(vec![
            ChatResponse::text_reply("m", "First"),
            ChatResponse::text_reply("m", "Second"),
        ]);

        let r1 = backend
            .chat(ChatRequest::new("m", vec![ChatMessage::user("1")]))
            .await
            .unwrap();
        let r2 = backend
            .chat(ChatRequest::new("m", vec![ChatMessage::user("2")]))
            .await
            .unwrap();

        assert_eq!(r1.text(), "First");
        assert_eq!(r2.text(), "Second");
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_exhausted() {
        let backend = MockBackend::new(vec![]);
        let result = backend
            .chat(ChatRequest::new("m", vec![ChatMessage::user("Hi")]))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_scripted_failure() {
        let backend = MockBackend::with_script(vec![
            Err(LlmError::Backend("model does not support tools".to_string())),
            Ok(ChatResponse::text_reply("m", "plain answer")),
        ]);

        let err = backend
            .chat(ChatRequest::new("m", vec![ChatMessage::user("Hi")]))
            .await
            .unwrap_err();
        assert!(err.is_tool_support_error());

        let ok = backend
            .chat(ChatRequest::new("m", vec![ChatMessage::user("Hi")]))
            .await
            .unwrap();
        assert_eq!(ok.text(), "plain answer");
    }

    #[tokio::test]
    async fn test_mock_tool_call_reply() {
        let backend = MockBackend::new(vec![ChatResponse::tool_call_reply(
            "m",
            "read_file",
            json!({"path": "/foo.rs"}),
        )]);

        let response = backend
            .chat(ChatRequest::new("m", vec![ChatMessage::user("Read foo.rs")]))
            .await
            .unwrap();

        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls()[0].name(), "read_file");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let backend = MockBackend::with_text("x");
        assert!(backend.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_on_non_retryable() {
        let mut calls = 0;
        let result: Result<()> = with_retry(3, Duration::from_millis(1), "test", || {
            calls += 1;
            async { Err(LlmError::Backend("fatal".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_with_retry_retries_network_errors() {
        let mut calls = 0;
        let result = with_retry(3, Duration::from_millis(1), "test", || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(LlmError::Network("flaky".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }
}
