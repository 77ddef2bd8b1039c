//! Lifecycle callbacks for agent runs.
//!
//! - [`RunContext`]: state handed to every callback
//! - [`RunHooks`] / [`AgentHooks`]: observer traits
//! - [`NoopRunHooks`] / [`NoopAgentHooks`]: empty defaults
//! - [`LoggingRunHooks`] / [`LoggingAgentHooks`]: `tracing` adapters

mod context;
mod hooks;
mod logging;
mod noop;

pub use context::RunContext;
pub use hooks::{
    AgentHooks, BoxedAgentHooks, BoxedRunHooks, RunHooks, SharedAgentHooks, SharedRunHooks,
};
pub use logging::{LogLevel, LoggingAgentHooks, LoggingRunHooks};
pub use noop::{NoopAgentHooks, NoopRunHooks};
