//! CLI command implementations.

pub mod ask;
pub mod chat;
pub mod models;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use taran_agent::{Agent, AgentConfig, RemoteTool, ToolRegistry};
use taran_config::{ChatDefaults, ConfigStore};
use taran_llm::{OllamaBackend, OllamaConfig, SharedBackend};
use taran_mcp::ServerConnection;

/// Load the configuration store.
pub fn load_store(config: &Path) -> Result<Arc<ConfigStore>> {
    let store = ConfigStore::load(config)
        .with_context(|| format!("could not load configuration from '{}'", config.display()))?;
    Ok(Arc::new(store))
}

/// Build the model backend from the configured daemon URL.
pub fn build_backend(defaults: &ChatDefaults) -> Result<OllamaBackend> {
    let config = match &defaults.ollama_url {
        Some(url) => OllamaConfig::new(url),
        None => OllamaConfig::default(),
    };
    Ok(OllamaBackend::new(config)?)
}

/// Resolve the model name from a flag or the configured default.
pub fn resolve_model(flag: Option<String>, defaults: &ChatDefaults) -> Result<String> {
    flag.or_else(|| defaults.model.clone())
        .context("no model configured; pass --model or set [defaults] model")
}

/// Resolve the server name from a flag or the configured default.
pub fn resolve_server(flag: Option<String>, store: &ConfigStore) -> Result<String> {
    match flag {
        Some(name) => Ok(name),
        None => Ok(store.default_server()?),
    }
}

/// Discover a server's tools and register them.
///
/// `isolated` selects the per-call connection mode: every tool invocation
/// then opens its own connection instead of sharing one session.
pub async fn build_registry(
    store: Arc<ConfigStore>,
    server: &str,
    isolated: bool,
) -> Result<ToolRegistry> {
    let server = server.to_string();
    let adapters = tokio::task::spawn_blocking(move || {
        if isolated {
            RemoteTool::from_store(store, &server)
        } else {
            let connection = Arc::new(ServerConnection::connect(&store, &server)?);
            RemoteTool::from_connection(connection)
        }
    })
    .await
    .context("tool discovery task failed")??;

    let mut registry = ToolRegistry::new();
    let count = adapters.len();
    for adapter in adapters {
        registry.register(adapter);
    }

    tracing::info!(tools = count, "registered remote tools");
    Ok(registry)
}

/// Assemble the agent for a chat/ask session.
pub async fn build_agent(
    store: Arc<ConfigStore>,
    model: String,
    server: &str,
    isolated: bool,
) -> Result<Agent> {
    let defaults = store.defaults();
    let backend: SharedBackend = Arc::new(build_backend(&defaults)?);
    let registry = build_registry(Arc::clone(&store), server, isolated).await?;

    let mut config = AgentConfig::new(model).with_tool_choice(defaults.tool_choice);
    if let Some(prompt) = defaults.system_prompt {
        config = config.with_system_prompt(prompt);
    }
    if let Some(temperature) = defaults.temperature {
        config = config.with_temperature(temperature);
    }

    Ok(Agent::new(backend, registry, store, config))
}
