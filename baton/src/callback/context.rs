//! Run context shared by tools, guardrails, instructions and hooks.
//!
//! [`RunContext`] carries two things through a run:
//!
//! - an opaque caller value, installed with
//!   [`RunConfig::context`](crate::agent::RunConfig::context) and retrieved
//!   with [`RunContext::context`]. It is never sent to the model.
//! - bookkeeping maintained by the runtime: turn number, active agent and
//!   its provider, cumulative usage, trace id and workflow name.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::chat::SharedChatProvider;
use crate::usage::Usage;

/// Context passed to every callback during a run.
///
/// Cloning is cheap: the caller value is reference counted, so all clones
/// observe the same value. Use interior mutability (e.g. a `Mutex`) inside
/// the caller value for state that tools update.
///
/// ```rust,ignore
/// struct UserInfo { name: String, uid: u64 }
///
/// let config = RunConfig::new().context(UserInfo { name: "Ada".into(), uid: 7 });
/// // inside a tool:
/// let user = ctx.context::<UserInfo>().expect("user info");
/// ```
#[derive(Clone, Default)]
pub struct RunContext {
    shared: Option<Arc<dyn Any + Send + Sync>>,
    usage: Usage,
    turn: usize,
    agent_name: Option<String>,
    provider: Option<SharedChatProvider>,
    trace_id: Option<String>,
    workflow_name: Option<String>,
}

impl RunContext {
    /// Create a new empty run context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the caller value.
    #[must_use]
    pub fn with_context<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.shared = Some(Arc::new(value));
        self
    }

    /// Attach an already shared caller value.
    #[must_use]
    pub fn with_shared(mut self, value: Option<Arc<dyn Any + Send + Sync>>) -> Self {
        self.shared = value;
        self
    }

    /// Set the agent name.
    #[must_use]
    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = Some(name.into());
        self
    }

    /// Set the current turn number.
    #[must_use]
    pub const fn with_turn(mut self, turn: usize) -> Self {
        self.turn = turn;
        self
    }

    /// Set the trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Set the workflow name.
    #[must_use]
    pub fn with_workflow_name(mut self, name: impl Into<String>) -> Self {
        self.workflow_name = Some(name.into());
        self
    }

    /// Get the caller value, if one of type `T` was attached.
    #[must_use]
    pub fn context<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.shared.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Get the shared caller value handle.
    #[must_use]
    pub fn shared(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.shared.clone()
    }

    /// Get the cumulative token usage.
    #[must_use]
    pub const fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Get the current turn number (1-indexed during a run, 0 before start).
    #[must_use]
    pub const fn turn(&self) -> usize {
        self.turn
    }

    /// Get the active agent name, if set.
    #[must_use]
    pub fn agent_name(&self) -> Option<&str> {
        self.agent_name.as_deref()
    }

    /// Get the provider serving the active agent, if set.
    #[must_use]
    pub const fn provider(&self) -> Option<&SharedChatProvider> {
        self.provider.as_ref()
    }

    /// Get the trace id, if set.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Get the workflow name, if set.
    #[must_use]
    pub fn workflow_name(&self) -> Option<&str> {
        self.workflow_name.as_deref()
    }

    /// Add usage from a model call.
    pub fn add_usage(&mut self, usage: Usage) {
        self.usage += usage;
    }

    /// Advance to the next turn.
    pub const fn advance_turn(&mut self) {
        self.turn += 1;
    }

    /// Update the active agent name.
    pub fn set_agent_name(&mut self, name: impl Into<String>) {
        self.agent_name = Some(name.into());
    }

    /// Update the provider serving the active agent.
    pub fn set_provider(&mut self, provider: SharedChatProvider) {
        self.provider = Some(provider);
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("has_context", &self.shared.is_some())
            .field("usage", &self.usage)
            .field("turn", &self.turn)
            .field("agent_name", &self.agent_name)
            .field("provider", &self.provider.as_ref().map(|p| p.provider_name()))
            .field("trace_id", &self.trace_id)
            .field("workflow_name", &self.workflow_name)
            .finish()
    }
}
