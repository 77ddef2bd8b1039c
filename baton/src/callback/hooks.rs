//! Hook traits for run and agent lifecycle callbacks.
//!
//! - [`RunHooks`]: observe every agent in a run, installed on
//!   [`RunConfig`](crate::agent::RunConfig).
//! - [`AgentHooks`]: bound to one agent, installed with
//!   [`Agent::hooks`](crate::agent::Agent::hooks).
//!
//! Every method has a no-op default, so implementations only override the
//! events they care about. Hooks observe the run but cannot steer it;
//! failures and panics inside a hook are logged and otherwise ignored.
//!
//! # Lifecycle Events
//!
//! 1. `on_run_start`
//! 2. `on_agent_start` for the starting agent
//! 3. Turn loop:
//!    - `on_llm_start` → *model call* → `on_llm_end`
//!    - `on_tool_start` → *tool execution* → `on_tool_end`
//!    - `on_handoff`, then `on_agent_start` for the new agent
//! 4. `on_agent_end` for the final agent, then `on_run_end`, or `on_error`

use async_trait::async_trait;
use serde_json::Value;

use crate::chat::ChatResponse;
use crate::error::Error;
use crate::message::Message;

use super::context::RunContext;

/// A boxed, thread-safe [`RunHooks`] trait object.
pub type BoxedRunHooks = Box<dyn RunHooks>;

/// A shared, thread-safe [`RunHooks`] trait object.
pub type SharedRunHooks = std::sync::Arc<dyn RunHooks>;

/// A boxed, thread-safe [`AgentHooks`] trait object.
pub type BoxedAgentHooks = Box<dyn AgentHooks>;

/// A shared, thread-safe [`AgentHooks`] trait object.
pub type SharedAgentHooks = std::sync::Arc<dyn AgentHooks>;

/// Run-level lifecycle hooks.
///
/// Every method receives the agent name so listeners can tell agents apart
/// in multi-agent runs.
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called once before the first turn, after input guardrails passed.
    async fn on_run_start(&self, _ctx: &RunContext, _agent_name: &str, _input: &[Message]) {}

    /// Called once after the run produced its final output.
    async fn on_run_end(&self, _ctx: &RunContext, _agent_name: &str, _output: &Value) {}

    /// Called when an agent becomes active (run start or handoff).
    async fn on_agent_start(&self, _ctx: &RunContext, _agent_name: &str) {}

    /// Called after the final agent produced its output.
    async fn on_agent_end(&self, _ctx: &RunContext, _agent_name: &str, _output: &Value) {}

    /// Called just before invoking the model.
    async fn on_llm_start(
        &self,
        _ctx: &RunContext,
        _agent_name: &str,
        _instructions: Option<&str>,
        _messages: &[Message],
    ) {
    }

    /// Called immediately after the model returns.
    async fn on_llm_end(&self, _ctx: &RunContext, _agent_name: &str, _response: &ChatResponse) {}

    /// Called immediately before a tool is invoked.
    async fn on_tool_start(&self, _ctx: &RunContext, _agent_name: &str, _tool_name: &str) {}

    /// Called immediately after a tool completes.
    ///
    /// `result` is the text returned to the model (output or error message).
    async fn on_tool_end(
        &self,
        _ctx: &RunContext,
        _agent_name: &str,
        _tool_name: &str,
        _result: &str,
    ) {
    }

    /// Called when control moves from one agent to another.
    async fn on_handoff(&self, _ctx: &RunContext, _from_agent: &str, _to_agent: &str) {}

    /// Called when the run fails.
    async fn on_error(&self, _ctx: &RunContext, _agent_name: &str, _error: &Error) {}
}

/// Per-agent lifecycle hooks.
///
/// Only events concerning the bound agent are delivered, so the agent name
/// is implicit.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Called when this agent becomes active.
    async fn on_start(&self, _ctx: &RunContext) {}

    /// Called after this agent produced the run's final output.
    async fn on_end(&self, _ctx: &RunContext, _output: &Value) {}

    /// Called just before invoking the model for this agent.
    async fn on_llm_start(
        &self,
        _ctx: &RunContext,
        _instructions: Option<&str>,
        _messages: &[Message],
    ) {
    }

    /// Called immediately after the model returns for this agent.
    async fn on_llm_end(&self, _ctx: &RunContext, _response: &ChatResponse) {}

    /// Called immediately before this agent invokes a tool.
    async fn on_tool_start(&self, _ctx: &RunContext, _tool_name: &str) {}

    /// Called immediately after a tool invoked by this agent completes.
    async fn on_tool_end(&self, _ctx: &RunContext, _tool_name: &str, _result: &str) {}

    /// Called on the *receiving* agent when control is handed to it.
    async fn on_handoff(&self, _ctx: &RunContext, _from_agent: &str) {}

    /// Called when the run fails while this agent is active.
    async fn on_error(&self, _ctx: &RunContext, _error: &Error) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Shared counter for tracking how many times each hook is called.
    #[derive(Debug, Default, Clone)]
    struct CallCounter(Arc<AtomicUsize>);

    impl CallCounter {
        fn increment(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct CountingRunHooks {
        run_start: CallCounter,
        handoff: CallCounter,
        tool_end: CallCounter,
    }

    #[async_trait]
    impl RunHooks for CountingRunHooks {
        async fn on_run_start(&self, _ctx: &RunContext, _agent_name: &str, _input: &[Message]) {
            self.run_start.increment();
        }

        async fn on_handoff(&self, _ctx: &RunContext, _from: &str, _to: &str) {
            self.handoff.increment();
        }

        async fn on_tool_end(&self, _ctx: &RunContext, _agent: &str, _tool: &str, _result: &str) {
            self.tool_end.increment();
        }
    }

    #[derive(Default)]
    struct CountingAgentHooks {
        start: CallCounter,
        handoff_from: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AgentHooks for CountingAgentHooks {
        async fn on_start(&self, _ctx: &RunContext) {
            self.start.increment();
        }

        async fn on_handoff(&self, _ctx: &RunContext, from_agent: &str) {
            self.handoff_from
                .lock()
                .unwrap()
                .push(from_agent.to_owned());
        }
    }

    mod run_hooks {
        use super::*;

        #[tokio::test]
        async fn overridden_methods_fire() {
            let hooks = CountingRunHooks::default();
            let ctx = RunContext::new();
            hooks.on_run_start(&ctx, "a", &[]).await;
            hooks.on_handoff(&ctx, "a", "b").await;
            hooks.on_tool_end(&ctx, "a", "t", "ok").await;
            assert_eq!(hooks.run_start.count(), 1);
            assert_eq!(hooks.handoff.count(), 1);
            assert_eq!(hooks.tool_end.count(), 1);
        }

        #[tokio::test]
        async fn defaults_are_noops() {
            let hooks = CountingRunHooks::default();
            let ctx = RunContext::new();
            hooks.on_agent_start(&ctx, "a").await;
            hooks.on_llm_start(&ctx, "a", None, &[]).await;
            hooks
                .on_error(&ctx, "a", &Error::agent("boom"))
                .await;
            assert_eq!(hooks.run_start.count(), 0);
        }

        #[tokio::test]
        async fn usable_as_trait_object() {
            let hooks: SharedRunHooks = Arc::new(CountingRunHooks::default());
            hooks.on_run_start(&RunContext::new(), "a", &[]).await;
        }
    }

    mod agent_hooks {
        use super::*;

        #[tokio::test]
        async fn handoff_reports_source() {
            let hooks = CountingAgentHooks::default();
            let ctx = RunContext::new();
            hooks.on_start(&ctx).await;
            hooks.on_handoff(&ctx, "Triage").await;
            assert_eq!(hooks.start.count(), 1);
            assert_eq!(*hooks.handoff_from.lock().unwrap(), vec!["Triage"]);
        }
    }
}
