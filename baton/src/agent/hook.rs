//! Isolating dispatcher for run and agent hooks.
//!
//! Every event goes to the run-level hooks and, when the agent has them, to
//! the agent's own hooks. A panicking hook is logged and the run carries on.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tracing::warn;

use crate::callback::{RunContext, SharedRunHooks};
use crate::chat::ChatResponse;
use crate::error::Error;
use crate::message::Message;
use crate::tool::panic_message;

use super::config::Agent;

#[derive(Clone)]
pub(crate) struct HookDispatcher {
    run: SharedRunHooks,
}

impl HookDispatcher {
    pub(crate) fn new(run: SharedRunHooks) -> Self {
        Self { run }
    }

    async fn guarded(event: &'static str, fut: impl Future<Output = ()>) {
        if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
            warn!(
                event,
                panic = %panic_message(panic.as_ref()),
                "Hook panicked; ignoring"
            );
        }
    }

    pub(crate) async fn run_start(&self, ctx: &RunContext, agent: &Agent, input: &[Message]) {
        Self::guarded("run_start", self.run.on_run_start(ctx, &agent.name, input)).await;
    }

    pub(crate) async fn run_end(&self, ctx: &RunContext, agent: &Agent, output: &Value) {
        Self::guarded("run_end", self.run.on_run_end(ctx, &agent.name, output)).await;
    }

    pub(crate) async fn agent_start(&self, ctx: &RunContext, agent: &Agent) {
        Self::guarded("agent_start", self.run.on_agent_start(ctx, &agent.name)).await;
        if let Some(hooks) = &agent.hooks {
            Self::guarded("agent_start", hooks.on_start(ctx)).await;
        }
    }

    pub(crate) async fn agent_end(&self, ctx: &RunContext, agent: &Agent, output: &Value) {
        Self::guarded("agent_end", self.run.on_agent_end(ctx, &agent.name, output)).await;
        if let Some(hooks) = &agent.hooks {
            Self::guarded("agent_end", hooks.on_end(ctx, output)).await;
        }
    }

    pub(crate) async fn llm_start(
        &self,
        ctx: &RunContext,
        agent: &Agent,
        instructions: Option<&str>,
        messages: &[Message],
    ) {
        Self::guarded(
            "llm_start",
            self.run.on_llm_start(ctx, &agent.name, instructions, messages),
        )
        .await;
        if let Some(hooks) = &agent.hooks {
            Self::guarded("llm_start", hooks.on_llm_start(ctx, instructions, messages)).await;
        }
    }

    pub(crate) async fn llm_end(&self, ctx: &RunContext, agent: &Agent, response: &ChatResponse) {
        Self::guarded("llm_end", self.run.on_llm_end(ctx, &agent.name, response)).await;
        if let Some(hooks) = &agent.hooks {
            Self::guarded("llm_end", hooks.on_llm_end(ctx, response)).await;
        }
    }

    pub(crate) async fn tool_start(&self, ctx: &RunContext, agent: &Agent, tool: &str) {
        Self::guarded("tool_start", self.run.on_tool_start(ctx, &agent.name, tool)).await;
        if let Some(hooks) = &agent.hooks {
            Self::guarded("tool_start", hooks.on_tool_start(ctx, tool)).await;
        }
    }

    pub(crate) async fn tool_end(&self, ctx: &RunContext, agent: &Agent, tool: &str, result: &str) {
        Self::guarded("tool_end", self.run.on_tool_end(ctx, &agent.name, tool, result)).await;
        if let Some(hooks) = &agent.hooks {
            Self::guarded("tool_end", hooks.on_tool_end(ctx, tool, result)).await;
        }
    }

    /// Agent hooks fire on the receiving agent.
    pub(crate) async fn handoff(&self, ctx: &RunContext, from: &Agent, to: &Agent) {
        Self::guarded("handoff", self.run.on_handoff(ctx, &from.name, &to.name)).await;
        if let Some(hooks) = &to.hooks {
            Self::guarded("handoff", hooks.on_handoff(ctx, &from.name)).await;
        }
    }

    pub(crate) async fn error(&self, ctx: &RunContext, agent: &Agent, error: &Error) {
        Self::guarded("error", self.run.on_error(ctx, &agent.name, error)).await;
        if let Some(hooks) = &agent.hooks {
            Self::guarded("error", hooks.on_error(ctx, error)).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::callback::{AgentHooks, RunHooks};

    struct PanickingHooks;

    #[async_trait]
    impl RunHooks for PanickingHooks {
        async fn on_agent_start(&self, _ctx: &RunContext, _agent_name: &str) {
            panic!("hook exploded");
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl AgentHooks for Counting {
        async fn on_start(&self, _ctx: &RunContext) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_handoff(&self, _ctx: &RunContext, _from_agent: &str) {
            self.0.fetch_add(10, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn panicking_run_hook_does_not_stop_agent_hook() {
        let counter = Arc::new(Counting::default());
        let agent = Agent::new("a").hooks(Arc::clone(&counter) as _);
        let dispatcher = HookDispatcher::new(Arc::new(PanickingHooks));
        dispatcher.agent_start(&RunContext::new(), &agent).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handoff_notifies_receiving_agent() {
        let source = Arc::new(Counting::default());
        let target = Arc::new(Counting::default());
        let from = Agent::new("from").hooks(Arc::clone(&source) as _);
        let to = Agent::new("to").hooks(Arc::clone(&target) as _);
        let dispatcher = HookDispatcher::new(Arc::new(crate::callback::NoopRunHooks));
        dispatcher.handoff(&RunContext::new(), &from, &to).await;
        assert_eq!(source.0.load(Ordering::SeqCst), 0);
        assert_eq!(target.0.load(Ordering::SeqCst), 10);
    }
}
