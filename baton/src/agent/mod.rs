//! Agents and the run loop that drives them.
//!
//! - **[`Agent`]** is plain configuration: name, instructions, model, tools,
//!   handoffs, output schema, guardrails and hooks. Each agent may carry its
//!   own provider.
//! - **[`Runner`]** is a stateless engine that takes an agent through turns
//!   (call the model, run tools, follow handoffs) until a final output.
//! - **[`AgentTool`]** exposes an agent as a tool of another agent; the
//!   caller keeps control of the conversation.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use baton::agent::{Agent, RunConfig};
//!
//! let agent = Agent::new("assistant")
//!     .instructions("You are a helpful assistant.")
//!     .provider(provider.clone());
//!
//! let result = agent.run("Hello!", RunConfig::default()).await?;
//! println!("{}", result.text().unwrap_or("no output"));
//! ```
//!
//! # Handoffs
//!
//! ```rust,ignore
//! let billing = Agent::new("Billing").handoff_description("Billing questions");
//! let triage = Agent::new("Triage")
//!     .instructions("Route the user to the right specialist.")
//!     .provider(provider.clone())
//!     .handoff(billing);
//!
//! let result = triage.run("I was charged twice", RunConfig::default()).await?;
//! assert_eq!(result.last_agent, "Billing");
//! ```

mod as_tool;
mod config;
mod hook;
mod result;
mod runner;

pub use as_tool::{AgentTool, AgentToolArgs};
pub use config::{Agent, Instructions, ToolUseBehavior};
pub use result::{RunConfig, RunEvent, RunResult, ToolCallRecord, UserInput};
pub use runner::{RunEventStream, Runner};
