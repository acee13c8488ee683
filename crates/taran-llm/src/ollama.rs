//! Ollama chat backend.
//!
//! Talks to a local Ollama daemon over its native HTTP API: `/api/chat` for
//! completions and `/api/tags` for the installed-model list.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::backend::{with_retry, ChatBackend};
use crate::error::{LlmError, Result};
use crate::types::{ChatRequest, ChatResponse};

/// Default daemon address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Configuration for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the daemon.
    pub base_url: String,
    /// Whole-request timeout. Local generation can be slow; keep this large.
    pub timeout: Duration,
    /// Retries for transient network failures.
    pub max_retries: u32,
    /// Initial retry backoff.
    pub retry_backoff: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout: Duration::from_secs(300),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl OllamaConfig {
    /// Create a config pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry count.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// A model installed in the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSummary {
    /// Model name (e.g. "llama3.2:latest").
    pub name: String,
    /// On-disk size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelSummary>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Chat backend over a local Ollama daemon.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Create a backend with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a backend against the default local daemon.
    pub fn local() -> Result<Self> {
        Self::new(OllamaConfig::default())
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.config.base_url.trim_end_matches('/'))
    }

    /// List models installed in the daemon.
    pub async fn list_models(&self) -> Result<Vec<ModelSummary>> {
        let response = self.client.get(self.tags_url()).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models)
    }

    async fn handle_response(response: Response) -> Result<ChatResponse> {
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Serialization(e.to_string()))?;
        Ok(parsed)
    }

    async fn error_from_response(response: Response) -> LlmError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // The daemon wraps failures as {"error": "..."}; surface the message
        // so callers can recognize e.g. "does not support tools".
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
            match status.as_u16() {
                500..=599 => LlmError::Backend(format!("Server error: {}", parsed.error)),
                _ => LlmError::Backend(parsed.error),
            }
        } else {
            LlmError::Backend(format!("HTTP {}: {}", status, body))
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let mut request = request;
        request.stream = false;

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat request"
        );

        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "ollama",
            || async {
                let response = self
                    .client
                    .post(self.chat_url())
                    .json(&request)
                    .send()
                    .await?;

                Self::handle_response(response).await
            },
        )
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<()> {
        let response = self.client.get(self.tags_url()).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::Backend(format!(
                "daemon unhealthy: HTTP {}",
                response.status()
            )))
        }
    }
}
