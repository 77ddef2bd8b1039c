//! No-op implementations of the hook traits.
//!
//! [`NoopRunHooks`] is what a [`RunConfig`](crate::agent::RunConfig) carries
//! until the caller installs real hooks.

use async_trait::async_trait;

use super::hooks::{AgentHooks, RunHooks};

/// A [`RunHooks`] implementation that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunHooks;

#[async_trait]
impl RunHooks for NoopRunHooks {}

/// An [`AgentHooks`] implementation that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAgentHooks;

#[async_trait]
impl AgentHooks for NoopAgentHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::callback::context::RunContext;
    use crate::callback::hooks::{SharedAgentHooks, SharedRunHooks};
    use crate::chat::ChatResponse;
    use crate::error::Error;

    #[tokio::test]
    async fn run_hooks_accept_every_event() {
        let hooks: SharedRunHooks = Arc::new(NoopRunHooks);
        let ctx = RunContext::new();
        hooks.on_run_start(&ctx, "a", &[]).await;
        hooks.on_agent_start(&ctx, "a").await;
        hooks.on_llm_end(&ctx, "a", &ChatResponse::from_text("x")).await;
        hooks.on_handoff(&ctx, "a", "b").await;
        hooks.on_error(&ctx, "a", &Error::agent("x")).await;
        hooks.on_run_end(&ctx, "a", &serde_json::Value::Null).await;
    }

    #[tokio::test]
    async fn agent_hooks_accept_every_event() {
        let hooks: SharedAgentHooks = Arc::new(NoopAgentHooks);
        let ctx = RunContext::new();
        hooks.on_start(&ctx).await;
        hooks.on_tool_start(&ctx, "t").await;
        hooks.on_tool_end(&ctx, "t", "ok").await;
        hooks.on_handoff(&ctx, "a").await;
        hooks.on_end(&ctx, &serde_json::Value::Null).await;
    }

    #[test]
    fn zero_sized() {
        assert_eq!(std::mem::size_of::<NoopRunHooks>(), 0);
        assert_eq!(std::mem::size_of::<NoopAgentHooks>(), 0);
    }
}
