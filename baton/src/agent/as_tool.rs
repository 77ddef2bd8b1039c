//! Agents exposed as tools of other agents.
//!
//! The calling agent keeps control: the sub-agent runs in an isolated nested
//! run that sees only the tool input, never the caller's conversation. The
//! caller's context value is shared with the nested run, and a sub-agent
//! without a provider uses the one serving the caller.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::callback::RunContext;
use crate::error::ToolError;
use crate::schema::generate_json_schema;
use crate::tool::{DynTool, IsEnabled, ToolDefinition, ToolResult};

use super::config::Agent;
use super::result::RunConfig;
use super::runner::Runner;

/// Arguments for calling an agent as a tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentToolArgs {
    /// The input to send to the sub-agent.
    pub input: String,
}

/// A tool that runs an agent. Built with [`Agent::as_tool`].
#[derive(Clone)]
pub struct AgentTool {
    agent: Agent,
    definition: ToolDefinition,
    config: RunConfig,
    enabled: IsEnabled,
}

impl AgentTool {
    pub(crate) fn new(agent: Agent, name: impl Into<String>, description: impl Into<String>) -> Self {
        let definition =
            ToolDefinition::new(name, description, generate_json_schema::<AgentToolArgs>().1);
        Self {
            agent,
            definition,
            config: RunConfig::default(),
            enabled: IsEnabled::default(),
        }
    }

    /// Base configuration for the nested run.
    ///
    /// The context value is always replaced by the caller's.
    #[must_use]
    pub fn run_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Show or hide the tool.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = IsEnabled::Static(enabled);
        self
    }

    /// Compute visibility per turn.
    #[must_use]
    pub fn enabled_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext, &Agent) -> bool + Send + Sync + 'static,
    {
        self.enabled = IsEnabled::Dynamic(Arc::new(f));
        self
    }

    /// The wrapped agent.
    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }
}

impl fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.definition.name)
            .field("agent", &self.agent.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DynTool for AgentTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn is_enabled(&self, context: &RunContext, agent: &Agent) -> bool {
        self.enabled.evaluate(context, agent)
    }

    async fn call_json(&self, args: Value, context: &RunContext) -> ToolResult<Value> {
        let args: AgentToolArgs = serde_json::from_value(args)?;
        debug!(tool = %self.definition.name, agent = %self.agent.name, "Running agent as tool");
        let mut config = self.config.clone().shared_context(context.shared());
        if config.workflow_name.is_none() {
            config.workflow_name = context.workflow_name().map(str::to_owned);
        }
        if config.provider.is_none() {
            config.provider = context.provider().cloned();
        }
        let result = Runner::run(&self.agent, args.input, config)
            .await
            .map_err(|e| ToolError::execution(format!("agent '{}' failed: {e}", self.agent.name)))?;
        Ok(result.output)
    }
}
