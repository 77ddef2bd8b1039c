//! Triage with handoffs, a payload schema and an input filter.
//!
//! The triage agent routes a billing complaint to the billing agent. The
//! handoff requires a structured reason and strips tool traffic from the
//! history the billing agent sees.
//!
//! ```bash
//! RUST_LOG=info cargo run --example handoff_triage
//! ```

#![allow(clippy::print_stdout)]

use std::sync::Arc;

use baton::prelude::*;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, JsonSchema)]
struct EscalationData {
    /// Why the conversation is being escalated.
    reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct OrderArgs {
    order_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let provider: SharedChatProvider = Arc::new(
        MockProvider::new()
            .push_tool_call("lookup_order", json!({"order_id": "A-1009"}))
            .push_tool_call(
                "transfer_to_billing_agent",
                json!({"reason": "customer was charged twice for A-1009"}),
            )
            .push_text("I've refunded the duplicate charge on order A-1009."),
    );

    let billing = Agent::new("Billing Agent")
        .instructions("You resolve charges and refunds.")
        .handoff_description("Handles charges, refunds and invoices.");

    let escalate = Handoff::new(billing)
        .input_type::<EscalationData>()
        .input_filter(filters::remove_tool_items)
        .on_handoff(|ctx, payload| {
            info!(
                trace_id = ctx.trace_id().unwrap_or_default(),
                payload = %payload.cloned().unwrap_or_default(),
                "Escalating to billing"
            );
        });

    let lookup = FunctionTool::new(
        "lookup_order",
        "Look up an order by id",
        |args: OrderArgs, _ctx: &RunContext| {
            Ok::<_, ToolError>(json!({"order_id": args.order_id, "charges": 2}))
        },
    );

    let triage = Agent::new("Triage Agent")
        .instructions("Look up the order, then route the customer to the right specialist.")
        .provider(provider)
        .tool(lookup)
        .handoff(escalate);

    let result = triage
        .run(
            "I was charged twice for order A-1009",
            RunConfig::new().workflow_name("Customer service"),
        )
        .await?;

    println!("Answered by: {}", result.last_agent);
    println!("Output: {}", result.output);
    println!("History:");
    for message in result.history() {
        println!("  {:<9} {}", message.role.as_str(), message.text().unwrap_or("<tool calls>"));
    }

    Ok(())
}
