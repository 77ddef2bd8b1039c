//! Agent configuration types.
//!
//! An [`Agent`] describes *what* an agent is: its name, instructions, model,
//! tools, handoffs, output schema and policies. It contains no execution
//! logic; the [`Runner`](super::Runner) drives it.
//!
//! # Tool List Aliasing
//!
//! Cloning an agent shares its [`ToolList`]: adding a tool to the clone is
//! visible through the original. Use [`Agent::clone_with`] with
//! `share_tools = false`, or supply a fresh list with [`Agent::tools`], to get
//! an independent collection.
//!
//! # Example
//!
//! ```rust,ignore
//! use baton::prelude::*;
//!
//! let agent = Agent::new("Weather Assistant")
//!     .instructions("Answer weather questions using the tools.")
//!     .model("gpt-4o-mini")
//!     .provider(provider.clone())
//!     .tool(get_weather);
//!
//! let result = agent.run("Weather in Karachi?", RunConfig::default()).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use schemars::JsonSchema;
use serde_json::Value;

use crate::callback::{RunContext, SharedAgentHooks};
use crate::chat::{ModelSettings, SharedChatProvider};
use crate::error::Result;
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::handoff::Handoff;
use crate::schema::OutputSchema;
use crate::tool::{DynTool, SharedTool, ToolList};

use super::as_tool::AgentTool;
use super::result::{RunConfig, RunEvent, RunResult, ToolCallRecord, UserInput};

/// Instructions that become the system prompt.
#[derive(Clone)]
pub enum Instructions {
    /// Fixed instruction text.
    Static(String),
    /// Instructions computed fresh each turn from the run context and agent.
    Dynamic(Arc<dyn Fn(&RunContext, &Agent) -> String + Send + Sync>),
}

impl Instructions {
    /// Resolve the instructions for the current turn.
    #[must_use]
    pub fn resolve(&self, context: &RunContext, agent: &Agent) -> String {
        match self {
            Self::Static(s) => s.clone(),
            Self::Dynamic(f) => f(context, agent),
        }
    }
}

impl Default for Instructions {
    fn default() -> Self {
        Self::Static(String::new())
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(s) => f.debug_tuple("Static").field(s).finish(),
            Self::Dynamic(_) => f.debug_tuple("Dynamic").field(&"<closure>").finish(),
        }
    }
}

impl<S: Into<String>> From<S> for Instructions {
    fn from(s: S) -> Self {
        Self::Static(s.into())
    }
}

/// What the run loop does after a turn that executed tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolUseBehavior {
    /// Send the tool results back to the model.
    #[default]
    RunLlmAgain,
    /// Finish with the first call's output without another model call.
    StopOnFirstTool,
    /// Finish with the output of the first call (in call order) whose tool
    /// is listed; otherwise behave like [`RunLlmAgain`](Self::RunLlmAgain).
    StopAtTools(Vec<String>),
}

impl ToolUseBehavior {
    /// Stop at any of the named tools.
    #[must_use]
    pub fn stop_at<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StopAtTools(names.into_iter().map(Into::into).collect())
    }

    /// Pick the record whose output ends the run, if any.
    #[must_use]
    pub fn final_record<'a>(&self, records: &'a [ToolCallRecord]) -> Option<&'a ToolCallRecord> {
        match self {
            Self::RunLlmAgain => None,
            Self::StopOnFirstTool => records.first(),
            Self::StopAtTools(names) => records.iter().find(|r| names.contains(&r.name)),
        }
    }
}

/// A configured agent.
///
/// Fields are public so agents can be inspected and tweaked in place; the
/// builder methods cover the common cases.
#[derive(Clone)]
pub struct Agent {
    /// Unique name used for routing, logging and handoff tool names.
    pub name: String,
    /// System prompt source.
    pub instructions: Instructions,
    /// Shown to other agents when this agent is a handoff target.
    pub handoff_description: Option<String>,
    /// Model identifier; empty means the provider's default model.
    pub model: String,
    /// Backend; falls back to [`RunConfig::provider`] when unset.
    pub provider: Option<SharedChatProvider>,
    /// Tools, shared between clones.
    pub tools: ToolList,
    /// Agents this agent may transfer control to.
    pub handoffs: Vec<Handoff>,
    /// Per-agent lifecycle hooks.
    pub hooks: Option<SharedAgentHooks>,
    /// Schema the final output must satisfy.
    pub output_schema: Option<OutputSchema>,
    /// Sampling and tool-use settings.
    pub model_settings: ModelSettings,
    /// Policy applied after tool execution.
    pub tool_use_behavior: ToolUseBehavior,
    /// Drop the configured tool choice once this agent has run a tool, so a
    /// forced choice such as `required` cannot loop forever. On by default.
    pub reset_tool_choice: bool,
    /// Checks run on the input when this agent starts a run.
    pub input_guardrails: Vec<InputGuardrail>,
    /// Checks run on the final output when this agent produces it.
    pub output_guardrails: Vec<OutputGuardrail>,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            name: String::new(),
            instructions: Instructions::default(),
            handoff_description: None,
            model: String::new(),
            provider: None,
            tools: ToolList::default(),
            handoffs: Vec::new(),
            hooks: None,
            output_schema: None,
            model_settings: ModelSettings::default(),
            tool_use_behavior: ToolUseBehavior::default(),
            reset_tool_choice: true,
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("instructions", &self.instructions)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|p| p.provider_name()))
            .field("tools", &self.tools.names())
            .field(
                "handoffs",
                &self.handoffs.iter().map(Handoff::name).collect::<Vec<_>>(),
            )
            .field("hooks", &self.hooks.is_some())
            .field(
                "output_schema",
                &self.output_schema.as_ref().map(OutputSchema::name),
            )
            .field("model_settings", &self.model_settings)
            .field("tool_use_behavior", &self.tool_use_behavior)
            .field("reset_tool_choice", &self.reset_tool_choice)
            .field("input_guardrails", &self.input_guardrails)
            .field("output_guardrails", &self.output_guardrails)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent with the given name and default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Clone this agent, choosing whether the tool list is shared.
    ///
    /// `share_tools = true` behaves like [`Clone::clone`]; `false` copies the
    /// current tools into a new, independent list.
    #[must_use]
    pub fn clone_with(&self, share_tools: bool) -> Self {
        let mut agent = self.clone();
        if !share_tools {
            agent.tools = self.tools.deep_clone();
        }
        agent
    }

    /// Set static instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Instructions::Static(instructions.into());
        self
    }

    /// Set instructions computed each turn from the context and the agent.
    #[must_use]
    pub fn dynamic_instructions<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext, &Self) -> String + Send + Sync + 'static,
    {
        self.instructions = Instructions::Dynamic(Arc::new(f));
        self
    }

    /// Set the description used by handoff tools targeting this agent.
    #[must_use]
    pub fn handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the backend.
    #[must_use]
    pub fn provider(mut self, provider: SharedChatProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Add a tool, replacing any tool with the same name.
    ///
    /// The tool goes into the (possibly shared) existing list.
    #[must_use]
    pub fn tool(self, tool: impl DynTool + 'static) -> Self {
        self.tools.add(Arc::new(tool));
        self
    }

    /// Add an already shared tool.
    #[must_use]
    pub fn shared_tool(self, tool: SharedTool) -> Self {
        self.tools.add(tool);
        self
    }

    /// Replace the tools with a new, independent list.
    #[must_use]
    pub fn tools(mut self, tools: Vec<SharedTool>) -> Self {
        self.tools = ToolList::from_tools(tools);
        self
    }

    /// Add a handoff target.
    #[must_use]
    pub fn handoff(mut self, handoff: impl Into<Handoff>) -> Self {
        self.handoffs.push(handoff.into());
        self
    }

    /// Replace the handoff targets.
    #[must_use]
    pub fn handoffs(mut self, handoffs: Vec<Handoff>) -> Self {
        self.handoffs = handoffs;
        self
    }

    /// Set per-agent lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: SharedAgentHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Require structured output matching `schema`.
    #[must_use]
    pub fn output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Require structured output matching the schema of `T`.
    ///
    /// Read the output back with [`RunResult::parse`].
    #[must_use]
    pub fn output_type<T: JsonSchema>(self) -> Self {
        self.output_schema(OutputSchema::from_type::<T>())
    }

    /// Set model settings.
    #[must_use]
    pub fn model_settings(mut self, settings: ModelSettings) -> Self {
        self.model_settings = settings;
        self
    }

    /// Set the tool-use policy.
    #[must_use]
    pub fn tool_use_behavior(mut self, behavior: ToolUseBehavior) -> Self {
        self.tool_use_behavior = behavior;
        self
    }

    /// Choose whether the tool choice is dropped after this agent runs a tool.
    #[must_use]
    pub const fn reset_tool_choice(mut self, reset: bool) -> Self {
        self.reset_tool_choice = reset;
        self
    }

    /// Add an input guardrail.
    #[must_use]
    pub fn input_guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    /// Add an output guardrail.
    #[must_use]
    pub fn output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Resolve the system prompt for this turn; `None` when empty.
    #[must_use]
    pub fn resolve_instructions(&self, context: &RunContext) -> Option<String> {
        let text = self.instructions.resolve(context, self);
        (!text.is_empty()).then_some(text)
    }

    /// Tools visible this turn, in registration order.
    #[must_use]
    pub fn visible_tools(&self, context: &RunContext) -> Vec<SharedTool> {
        self.tools
            .snapshot()
            .into_iter()
            .filter(|t| t.is_enabled(context, self))
            .collect()
    }

    /// Handoffs visible this turn.
    #[must_use]
    pub fn visible_handoffs(&self, context: &RunContext) -> Vec<&Handoff> {
        self.handoffs
            .iter()
            .filter(|h| h.is_enabled(context, self))
            .collect()
    }

    /// Expose this agent as a tool of another agent.
    ///
    /// Unlike a handoff, the caller keeps control: the tool runs this agent
    /// in an isolated nested run on the given input and returns its output.
    #[must_use]
    pub fn as_tool(&self, name: impl Into<String>, description: impl Into<String>) -> AgentTool {
        AgentTool::new(self.clone(), name, description)
    }

    /// Run this agent to completion.
    ///
    /// Shorthand for [`Runner::run`](super::Runner::run).
    pub fn run<'a>(
        &'a self,
        input: impl Into<UserInput>,
        config: RunConfig,
    ) -> Pin<Box<dyn Future<Output = Result<RunResult>> + Send + 'a>> {
        super::Runner::run(self, input, config)
    }

    /// Run this agent, yielding events as the run progresses.
    ///
    /// Shorthand for [`Runner::run_streamed`](super::Runner::run_streamed).
    pub fn run_streamed<'a>(
        &'a self,
        input: impl Into<UserInput>,
        config: RunConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<RunEvent>> + Send + 'a>> {
        super::Runner::run_streamed(self, input, config)
    }
}

pub(crate) fn record_output(record: &ToolCallRecord) -> Value {
    record
        .output
        .clone()
        .unwrap_or_else(|| Value::String(record.result.clone()))
}
