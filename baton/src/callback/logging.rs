//! Tracing-based logging implementations of the hook traits.
//!
//! [`LoggingRunHooks`] and [`LoggingAgentHooks`] turn lifecycle events into
//! structured `tracing` events at a configurable level.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use baton::callback::{LogLevel, LoggingRunHooks};
//!
//! let config = RunConfig::new().hooks(Arc::new(LoggingRunHooks::with_level(LogLevel::Debug)));
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::chat::ChatResponse;
use crate::error::Error;
use crate::message::Message;

use super::context::RunContext;
use super::hooks::{AgentHooks, RunHooks};

/// Log verbosity level for hook events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace-level logging (most verbose).
    Trace,
    /// Debug-level logging.
    Debug,
    /// Info-level logging (default).
    #[default]
    Info,
    /// Warn-level logging.
    Warn,
}

macro_rules! log_at_level {
    ($level:expr, $($arg:tt)*) => {
        match $level {
            LogLevel::Trace => tracing::trace!($($arg)*),
            LogLevel::Debug => tracing::debug!($($arg)*),
            LogLevel::Info  => tracing::info!($($arg)*),
            LogLevel::Warn  => tracing::warn!($($arg)*),
        }
    };
}

/// A [`RunHooks`] implementation that logs every event via `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRunHooks {
    level: LogLevel,
}

impl LoggingRunHooks {
    /// Create logging run hooks at INFO level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create logging run hooks with a custom log level.
    #[must_use]
    pub const fn with_level(level: LogLevel) -> Self {
        Self { level }
    }

    /// Returns the configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

#[async_trait]
impl RunHooks for LoggingRunHooks {
    async fn on_run_start(&self, ctx: &RunContext, agent_name: &str, input: &[Message]) {
        log_at_level!(
            self.level,
            agent = agent_name,
            trace_id = ctx.trace_id().unwrap_or_default(),
            workflow = ctx.workflow_name().unwrap_or_default(),
            input_items = input.len(),
            "Run started"
        );
    }

    async fn on_run_end(&self, ctx: &RunContext, agent_name: &str, output: &Value) {
        let usage = ctx.usage();
        log_at_level!(self.level,
            agent = agent_name,
            trace_id = ctx.trace_id().unwrap_or_default(),
            turns = ctx.turn(),
            total_tokens = usage.total_tokens,
            requests = usage.requests,
            output = %output,
            "Run completed"
        );
    }

    async fn on_agent_start(&self, ctx: &RunContext, agent_name: &str) {
        log_at_level!(
            self.level,
            agent = agent_name,
            turn = ctx.turn(),
            "Agent started"
        );
    }

    async fn on_agent_end(&self, ctx: &RunContext, agent_name: &str, output: &Value) {
        let usage = ctx.usage();
        log_at_level!(self.level,
            agent = agent_name,
            turn = ctx.turn(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            output = %output,
            "Agent completed"
        );
    }

    async fn on_llm_start(
        &self,
        ctx: &RunContext,
        agent_name: &str,
        _instructions: Option<&str>,
        messages: &[Message],
    ) {
        log_at_level!(
            self.level,
            agent = agent_name,
            turn = ctx.turn(),
            message_count = messages.len(),
            "LLM request started"
        );
    }

    async fn on_llm_end(&self, ctx: &RunContext, agent_name: &str, response: &ChatResponse) {
        log_at_level!(self.level,
            agent = agent_name,
            turn = ctx.turn(),
            model = response.model.as_deref().unwrap_or("unknown"),
            usage = %response.usage,
            tool_calls = response.message.tool_calls.len(),
            "LLM request completed"
        );
    }

    async fn on_tool_start(&self, ctx: &RunContext, agent_name: &str, tool_name: &str) {
        log_at_level!(
            self.level,
            agent = agent_name,
            turn = ctx.turn(),
            tool = tool_name,
            "Tool execution started"
        );
    }

    async fn on_tool_end(&self, ctx: &RunContext, agent_name: &str, tool_name: &str, result: &str) {
        log_at_level!(
            self.level,
            agent = agent_name,
            turn = ctx.turn(),
            tool = tool_name,
            result_len = result.len(),
            "Tool execution completed"
        );
    }

    async fn on_handoff(&self, ctx: &RunContext, from_agent: &str, to_agent: &str) {
        log_at_level!(
            self.level,
            from = from_agent,
            to = to_agent,
            turn = ctx.turn(),
            "Agent handoff"
        );
    }

    async fn on_error(&self, ctx: &RunContext, agent_name: &str, error: &Error) {
        // Errors always log at WARN regardless of configured level.
        tracing::warn!(
            agent = agent_name,
            turn = ctx.turn(),
            error = %error,
            "Run failed"
        );
    }
}

/// An [`AgentHooks`] implementation that logs every event via `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAgentHooks {
    level: LogLevel,
}

impl LoggingAgentHooks {
    /// Create logging agent hooks at INFO level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create logging agent hooks with a custom log level.
    #[must_use]
    pub const fn with_level(level: LogLevel) -> Self {
        Self { level }
    }

    /// Returns the configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

#[async_trait]
impl AgentHooks for LoggingAgentHooks {
    async fn on_start(&self, ctx: &RunContext) {
        log_at_level!(self.level, turn = ctx.turn(), "Agent started");
    }

    async fn on_end(&self, ctx: &RunContext, output: &Value) {
        log_at_level!(self.level, turn = ctx.turn(), output = %output, "Agent completed");
    }

    async fn on_llm_start(
        &self,
        ctx: &RunContext,
        _instructions: Option<&str>,
        messages: &[Message],
    ) {
        log_at_level!(
            self.level,
            turn = ctx.turn(),
            message_count = messages.len(),
            "LLM request started"
        );
    }

    async fn on_llm_end(&self, ctx: &RunContext, response: &ChatResponse) {
        log_at_level!(self.level,
            turn = ctx.turn(),
            usage = %response.usage,
            "LLM request completed"
        );
    }

    async fn on_tool_start(&self, ctx: &RunContext, tool_name: &str) {
        log_at_level!(
            self.level,
            turn = ctx.turn(),
            tool = tool_name,
            "Tool execution started"
        );
    }

    async fn on_tool_end(&self, ctx: &RunContext, tool_name: &str, result: &str) {
        log_at_level!(
            self.level,
            turn = ctx.turn(),
            tool = tool_name,
            result_len = result.len(),
            "Tool execution completed"
        );
    }

    async fn on_handoff(&self, ctx: &RunContext, from_agent: &str) {
        log_at_level!(
            self.level,
            turn = ctx.turn(),
            from = from_agent,
            "Received handoff"
        );
    }

    async fn on_error(&self, ctx: &RunContext, error: &Error) {
        tracing::warn!(turn = ctx.turn(), error = %error, "Agent error");
    }
}
