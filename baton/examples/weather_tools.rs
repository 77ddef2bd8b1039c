//! Tool calling and tool-use behaviours against the scripted backend.
//!
//! The same question is asked twice: once with the default behaviour, where
//! the model turns the tool output into an answer, and once with
//! `StopOnFirstTool`, where the raw tool output is the answer.
//!
//! ```bash
//! RUST_LOG=baton=debug cargo run --example weather_tools
//! ```

#![allow(clippy::print_stdout)]

use std::sync::Arc;

use baton::prelude::*;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, JsonSchema)]
struct WeatherArgs {
    /// City to look up.
    city: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct StudentArgs {
    /// Student's full name.
    name: String,
}

fn scripted_backend() -> SharedChatProvider {
    Arc::new(
        MockProvider::new()
            .push_tool_call("get_weather", json!({"city": "Karachi"}))
            .push_text("It's sunny in Karachi right now."),
    )
}

fn assistant(provider: SharedChatProvider) -> Agent {
    let weather = FunctionTool::new(
        "get_weather",
        "Get the current weather for a city",
        |args: WeatherArgs, _ctx: &RunContext| {
            Ok::<_, ToolError>(format!("The weather in {} is sunny", args.city))
        },
    );
    let students = FunctionTool::new(
        "student_finder",
        "Find a student's roll number by name",
        |args: StudentArgs, _ctx: &RunContext| {
            Ok::<_, ToolError>(json!({"name": args.name, "roll_no": 7}))
        },
    );
    Agent::new("Assistant")
        .instructions("You are a helpful assistant. Use the tools when they help.")
        .provider(provider)
        .tool(weather)
        .tool(students)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RunConfig::new()
        .workflow_name("Weather lesson")
        .hooks(Arc::new(LoggingRunHooks::new()));

    let agent = assistant(scripted_backend());
    let result = agent.run("What's the weather in Karachi?", config.clone()).await?;
    println!("[run_llm_again] {} ({} turns)", result.output, result.turns);

    let agent = assistant(scripted_backend()).tool_use_behavior(ToolUseBehavior::StopOnFirstTool);
    let result = agent.run("What's the weather in Karachi?", config).await?;
    println!("[stop_on_first_tool] {} ({} turns)", result.output, result.turns);

    for record in &result.tool_calls {
        println!("  {}({}) -> {}", record.name, record.arguments, record.result);
    }

    Ok(())
}
