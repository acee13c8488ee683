//! The configuration store.
//!
//! [`ConfigStore`] owns the on-disk TOML document. Server lookups and the
//! persisted tool-support cache all go through it; nothing else reads or
//! writes the file, so capability updates cannot lose each other beyond
//! last-write-wins.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{ConfigError, Result};
use crate::types::{ChatDefaults, Config, ServerEntry};

/// Owner of the persisted configuration document.
pub struct ConfigStore {
    path: PathBuf,
    doc: RwLock<Config>,
}

impl ConfigStore {
    /// Load the configuration from `path`.
    ///
    /// Fails if the file cannot be read or parsed. A missing file is an
    /// error: connection parameters are never silently defaulted.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        let doc: Config = toml::from_str(&raw)?;

        tracing::debug!(
            path = %path.display(),
            servers = doc.servers.len(),
            "loaded configuration"
        );

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Create a store from an in-memory document, persisting to `path`.
    ///
    /// The file is written immediately so later cache updates have a
    /// document to rewrite.
    pub fn create(path: impl AsRef<Path>, doc: Config) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            doc: RwLock::new(doc),
        };
        store.save()?;
        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chat defaults from the document.
    pub fn defaults(&self) -> ChatDefaults {
        self.doc.read().defaults.clone()
    }

    /// Look up a server entry by name.
    pub fn server(&self, name: &str) -> Result<ServerEntry> {
        self.doc
            .read()
            .server(name)
            .cloned()
            .ok_or_else(|| ConfigError::server_not_found(name))
    }

    /// The default server name, or an error if none is configured.
    pub fn default_server(&self) -> Result<String> {
        self.doc
            .read()
            .defaults
            .server
            .clone()
            .ok_or(ConfigError::NoDefaultServer)
    }

    /// Names of all configured servers.
    pub fn server_names(&self) -> Vec<String> {
        self.doc
            .read()
            .server_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Whether `model` is believed to support tool calling.
    ///
    /// Unknown models default to true; a run that observes a rejection
    /// flips the flag via [`set_tool_support`](Self::set_tool_support).
    pub fn tool_support(&self, model: &str) -> bool {
        self.doc
            .read()
            .tool_support
            .get(model)
            .copied()
            .unwrap_or(true)
    }

    /// Record whether `model` supports tool calling and persist the document.
    ///
    /// Idempotent; concurrent writers resolve last-write-wins.
    pub fn set_tool_support(&self, model: &str, support: bool) -> Result<()> {
        {
            let mut doc = self.doc.write();
            doc.tool_support.insert(model.to_string(), support);
        }
        tracing::info!(model, support, "updated tool-support cache");
        self.save()
    }

    /// Write the current document back to disk.
    pub fn save(&self) -> Result<()> {
        let rendered = toml::to_string_pretty(&*self.doc.read())?;
        std::fs::write(&self.path, rendered).map_err(|source| ConfigError::WriteFile {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("servers", &self.doc.read().server_names())
            .finish()
    }
}
