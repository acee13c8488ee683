//! Interactive chat REPL.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Args;
use console::style;
use futures::StreamExt;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio_util::sync::CancellationToken;

use taran_agent::{Conversation, TurnChunk};

use super::{build_agent, load_store, resolve_model, resolve_server};

#[derive(Args)]
pub struct ChatArgs {
    /// Tool server to connect to (defaults to the configured default)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Model to chat with (defaults to the configured default)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Open a fresh server connection per tool call instead of sharing one
    #[arg(long)]
    pub isolated: bool,
}

pub async fn run(args: ChatArgs, config: &Path) -> Result<()> {
    let store = load_store(config)?;
    let defaults = store.defaults();
    let model = resolve_model(args.model, &defaults)?;
    let server = resolve_server(args.server, &store)?;

    println!(
        "Connecting to tool server {}...",
        style(&server).cyan().bold()
    );
    let agent = build_agent(store, model.clone(), &server, args.isolated).await?;

    println!(
        "{}",
        style(format!(
            "Chatting with {} ({} tools from '{}'). Type 'quit' to leave.",
            model,
            agent.tools().len(),
            server
        ))
        .dim()
    );

    let mut editor = DefaultEditor::new()?;
    let mut conversation = Conversation::new();

    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit" | "q") {
            break;
        }
        let _ = editor.add_history_entry(line);

        let token = CancellationToken::new();
        let mut stream = agent.turn_stream(&mut conversation, line, token);

        let mut printed = 0usize;
        let mut answer = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                TurnChunk::Answer { text } => {
                    // Growing prefixes: only the new suffix hits the screen.
                    print!("{}", &text[printed..]);
                    std::io::stdout().flush()?;
                    printed = text.len();
                    answer = text;
                }
                TurnChunk::ToolCall { name, arguments } => {
                    println!(
                        "{} {}({})",
                        style("tool>").cyan().bold(),
                        style(&name).cyan(),
                        arguments
                    );
                }
                TurnChunk::ToolResult { ok, content, .. } => {
                    let marker = if ok {
                        style("ok").green()
                    } else {
                        style("error").red()
                    };
                    println!("  {} {}", marker, style(preview(&content, 200)).dim());
                }
                TurnChunk::Done { .. } => {}
                TurnChunk::Error { message } => {
                    println!("{} {}", style("error:").red().bold(), message);
                }
            }
        }

        println!();
        if !answer.is_empty() {
            conversation.record_answer(answer);
        }
    }

    println!("{}", style("Bye.").dim());
    Ok(())
}

/// Truncate long tool output for display.
fn preview(content: &str, max: usize) -> String {
    let flat = content.replace('\n', " ⏎ ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}…", cut)
    }
}
