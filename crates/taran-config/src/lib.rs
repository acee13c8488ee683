//! Configuration system for the Taran agent.
//!
//! Provides TOML-based configuration with:
//! - Named tool-server entries (`[[servers]]`) covering all three transports
//! - Chat defaults (`[defaults]`: server, model, temperature, tool choice)
//! - A persisted per-model tool-support cache (`[tool_support]`)
//!
//! The [`ConfigStore`] is the sole owner of the on-disk document: all reads
//! and writes (including capability-cache updates) go through it.

pub mod error;
pub mod store;
pub mod types;

pub use error::{ConfigError, Result};
pub use store::ConfigStore;
pub use types::{ChatDefaults, Config, ServerEntry, ToolChoice};
