//! One-shot question command.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use console::style;

use taran_agent::Conversation;

use super::{build_agent, load_store, resolve_model, resolve_server};

#[derive(Args)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: String,

    /// Tool server to connect to (defaults to the configured default)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Model to ask (defaults to the configured default)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Open a fresh server connection per tool call instead of sharing one
    #[arg(long)]
    pub isolated: bool,
}

pub async fn run(args: AskArgs, config: &Path) -> Result<()> {
    let store = load_store(config)?;
    let defaults = store.defaults();
    let model = resolve_model(args.model, &defaults)?;
    let server = resolve_server(args.server, &store)?;

    let agent = build_agent(store, model, &server, args.isolated).await?;

    let mut conversation = Conversation::new();
    let outcome = agent.turn(&mut conversation, &args.prompt).await?;

    for exchange in &outcome.exchanges {
        let marker = if exchange.result.is_error() {
            style("error").red()
        } else {
            style("ok").green()
        };
        println!(
            "{} {}({}) {}",
            style("tool>").cyan().bold(),
            exchange.call.name(),
            exchange.call.arguments(),
            marker
        );
    }

    if outcome.exhausted {
        println!("{}", style(&outcome.text).yellow());
    } else {
        println!("{}", outcome.text);
    }
    Ok(())
}
