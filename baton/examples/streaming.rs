//! Streaming run events.
//!
//! Demonstrates `Agent::run_streamed()`, which yields `RunEvent`s as the run
//! progresses so text can be displayed while it arrives.
//!
//! ```bash
//! cargo run --example streaming
//! ```

#![allow(clippy::print_stdout)]

use std::io::{Write, stdout};
use std::sync::Arc;

use baton::prelude::*;
use futures::StreamExt;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, JsonSchema)]
struct JokeArgs {
    count: u32,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let provider: SharedChatProvider = Arc::new(
        MockProvider::new()
            .streaming(true)
            .push_tool_call("how_many_jokes", json!({"count": 2}))
            .push_text(
                "Why do programmers prefer dark mode? Because light attracts bugs. \
                 Why did the Rust developer stay calm? Nothing was ever borrowed for long.",
            ),
    );

    let jokes = FunctionTool::new(
        "how_many_jokes",
        "Decide how many jokes to tell",
        |args: JokeArgs, _ctx: &RunContext| Ok::<_, ToolError>(args.count),
    );

    let agent = Agent::new("Joker")
        .instructions("First call how_many_jokes, then tell that many jokes.")
        .provider(provider)
        .tool(jokes);

    let mut stream = agent.run_streamed("Tell me some jokes", RunConfig::default());
    while let Some(event) = stream.next().await {
        match event? {
            RunEvent::TurnStarted { turn, agent_name } => println!("-- turn {turn} ({agent_name})"),
            RunEvent::TextDelta(text) => {
                print!("{text}");
                stdout().flush()?;
            }
            RunEvent::ToolCallStarted { name, .. } => println!("calling {name}"),
            RunEvent::ToolCallCompleted(record) => println!("{} -> {}", record.name, record.result),
            RunEvent::AgentSwitched { from, to } => println!("handoff {from} -> {to}"),
            RunEvent::RunCompleted(result) => {
                println!("\n\nCompleted in {} turn(s), {} tokens", result.turns, result.usage.total_tokens);
            }
            _ => {}
        }
    }

    Ok(())
}
