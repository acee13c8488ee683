//! Inspect the tools offered by a configured server.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use taran_mcp::ServerConnection;

use super::{load_store, resolve_server};

#[derive(Args)]
pub struct ToolsArgs {
    /// Tool server to inspect (defaults to the configured default)
    #[arg(short, long)]
    pub server: Option<String>,
}

pub async fn run(args: ToolsArgs, config: &Path) -> Result<()> {
    let store = load_store(config)?;
    let server = resolve_server(args.server, &store)?;

    type Listing = (Option<taran_mcp::ServerInfo>, Vec<taran_mcp::ToolDescriptor>);
    let (info, tools) = tokio::task::spawn_blocking({
        let store = Arc::clone(&store);
        let server = server.clone();
        move || -> taran_mcp::Result<Listing> {
            let connection = ServerConnection::connect(&store, &server)?;
            let info = connection.server_info().cloned();
            let tools = connection.available_tools()?;
            Ok((info, tools))
        }
    })
    .await
    .context("tool listing task failed")??;

    if let Some(info) = info {
        println!(
            "{} {} v{}",
            style("server:").bold(),
            style(&info.name).cyan(),
            info.version
        );
    }

    if tools.is_empty() {
        println!("{}", style("No tools reported.").dim());
        return Ok(());
    }

    for tool in &tools {
        println!(
            "  {}  {}",
            style(&tool.name).green().bold(),
            tool.description.as_deref().unwrap_or("")
        );
    }
    println!("{}", style(format!("{} tools", tools.len())).dim());
    Ok(())
}
