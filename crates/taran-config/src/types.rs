//! Serde types for the Taran configuration document.
//!
//! ```toml
//! [defaults]
//! server = "filesystem"
//! model = "qwen2.5:7b"
//! temperature = 0.2
//!
//! [[servers]]
//! name = "filesystem"
//! transport = "stdio"
//! command = "mcp-server-filesystem"
//! args = ["--allowed-dirs", "/home/user/projects"]
//! workspace = "/home/user/projects"
//!
//! [[servers]]
//! name = "remote"
//! transport = "http"
//! url = "http://localhost:8931/rpc"
//!
//! [tool_support]
//! "qwen2.5:7b" = true
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The full configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat defaults applied when the CLI doesn't override them.
    pub defaults: ChatDefaults,
    /// Configured tool servers.
    pub servers: Vec<ServerEntry>,
    /// Per-model tool-support flags, persisted across runs.
    ///
    /// Absent models are assumed to support tool calling until a run
    /// observes otherwise.
    pub tool_support: BTreeMap<String, bool>,
}

impl Config {
    /// Look up a server entry by name.
    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Names of all configured servers, in document order.
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }
}

/// How the model should be allowed to use tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides whether to call tools.
    #[default]
    Auto,
    /// Tools are never offered to the model.
    None,
}

/// Default chat options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatDefaults {
    /// Default server name for `connect()` when none is given.
    pub server: Option<String>,
    /// Default model name.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// System prompt prepended to every conversation.
    pub system_prompt: Option<String>,
    /// Tool-calling mode.
    pub tool_choice: ToolChoice,
    /// Base URL of the model daemon.
    pub ollama_url: Option<String>,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            server: None,
            model: None,
            temperature: None,
            system_prompt: Some(
                "You are a helpful assistant who can use available tools to solve problems"
                    .to_string(),
            ),
            tool_choice: ToolChoice::Auto,
            ollama_url: None,
        }
    }
}

/// Configuration for a single tool server.
///
/// The transport kind is kept as a plain string so that one entry with an
/// unrecognized kind fails that connection attempt rather than poisoning the
/// whole document parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEntry {
    /// Unique name for this server.
    pub name: String,
    /// Transport kind: "stdio", "sse" or "http". Defaults to stdio.
    #[serde(default = "default_transport")]
    pub transport: String,
    /// Command to spawn (stdio transport).
    pub command: Option<String>,
    /// Arguments to pass to the command (stdio transport).
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set (as [key, value] pairs, stdio transport).
    #[serde(default)]
    pub env: Vec<[String; 2]>,
    /// Server URL (sse and http transports).
    pub url: Option<String>,
    /// HTTP headers to set (as [key, value] pairs).
    #[serde(default)]
    pub headers: Vec<[String; 2]>,
    /// Workspace root appended to the argument list (stdio transport).
    pub workspace: Option<PathBuf>,
    /// Per-request timeout in seconds. Defaults to 30.
    pub timeout_secs: Option<u64>,
    /// Number of retries for HTTP requests. Defaults to 3.
    pub retries: Option<u32>,
    /// Whether this server is enabled. Defaults to true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_transport() -> String {
    "stdio".to_string()
}

fn default_enabled() -> bool {
    true
}

impl ServerEntry {
    /// Create a new stdio server entry.
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: default_transport(),
            command: Some(command.into()),
            args: Vec::new(),
            env: Vec::new(),
            url: None,
            headers: Vec::new(),
            workspace: None,
            timeout_secs: None,
            retries: None,
            enabled: true,
        }
    }

    /// Create a new URL-based server entry ("sse" or "http").
    pub fn remote(
        name: impl Into<String>,
        transport: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            transport: transport.into(),
            command: None,
            args: Vec::new(),
            env: Vec::new(),
            url: Some(url.into()),
            headers: Vec::new(),
            workspace: None,
            timeout_secs: None,
            retries: None,
            enabled: true,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push([key.into(), value.into()]);
        self
    }

    /// Set the workspace root.
    pub fn with_workspace(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace = Some(path.into());
        self
    }

    /// Set the per-request timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Environment variables as tuples.
    pub fn env_tuples(&self) -> Vec<(String, String)> {
        self.env.iter().map(|[k, v]| (k.clone(), v.clone())).collect()
    }

    /// HTTP headers as tuples.
    pub fn header_tuples(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|[k, v]| (k.clone(), v.clone()))
            .collect()
    }
}
