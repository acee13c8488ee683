//! List models installed in the local daemon.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use console::style;

use super::{build_backend, load_store};

#[derive(Args)]
pub struct ModelsArgs {}

pub async fn run(_args: ModelsArgs, config: &Path) -> Result<()> {
    let store = load_store(config)?;
    let backend = build_backend(&store.defaults())?;

    let models = backend.list_models().await?;
    if models.is_empty() {
        println!(
            "{}",
            style("No models installed. Pull one first (e.g. `ollama pull llama3.2`).").yellow()
        );
        return Ok(());
    }

    let default = store.defaults().model;
    for model in &models {
        let marker = if default.as_deref() == Some(model.name.as_str()) {
            style(" (default)").dim().to_string()
        } else {
            String::new()
        };
        match model.size {
            Some(size) => println!(
                "  {}  {:.1} GB{}",
                style(&model.name).green(),
                size as f64 / 1e9,
                marker
            ),
            None => println!("  {}{}", style(&model.name).green(), marker),
        }
    }
    Ok(())
}
