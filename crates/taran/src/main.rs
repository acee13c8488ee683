//! Taran - a local tool-calling agent over external tool servers.
//!
//! Main entry point for the Taran CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ask, chat, models, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Taran - chat with a local model that can call tools on external servers
#[derive(Parser)]
#[command(name = "taran")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true, env = "TARAN_CONFIG", default_value = "taran.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enter interactive chat mode (REPL)
    Chat(chat::ChatArgs),

    /// Ask a one-shot question
    Ask(ask::AskArgs),

    /// List the tools offered by a configured server
    Tools(tools::ToolsArgs),

    /// List models installed in the local daemon
    Models(models::ModelsArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing — console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "taran=debug,taran_agent=debug,taran_llm=debug,taran_mcp=debug,taran_config=debug,info"
    } else {
        "taran=info,taran_agent=info,taran_llm=info,taran_mcp=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily("logs", "taran.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "taran=debug,taran_agent=debug,taran_llm=debug,taran_mcp=debug,taran_config=debug,info",
                )),
        )
        .init();

    match cli.command {
        Commands::Chat(args) => chat::run(args, &cli.config).await,
        Commands::Ask(args) => ask::run(args, &cli.config).await,
        Commands::Tools(args) => tools::run(args, &cli.config).await,
        Commands::Models(args) => models::run(args, &cli.config).await,
    }
}
