//! Handoffs: transferring a run to another agent.
//!
//! A [`Handoff`] is exposed to the model as a tool named
//! `transfer_to_<agent>`. When the model calls it, the run loop validates the
//! payload, records the transfer in history, optionally rewrites the history
//! through an input filter, and continues with the target as the active
//! agent. Unlike [`Agent::as_tool`](crate::agent::Agent::as_tool), the target
//! sees the conversation so far.

use std::fmt;
use std::sync::Arc;

use convert_case::{Case, Casing};
use schemars::JsonSchema;
use serde_json::{Value, json};

use crate::agent::Agent;
use crate::callback::RunContext;
use crate::error::{Error, Result};
use crate::message::{Message, Role};
use crate::schema::{generate_json_schema, validate};
use crate::tool::{IsEnabled, ToolDefinition};

/// History handed to a handoff input filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandoffInputData {
    /// The input the run started from.
    pub input_history: Vec<Message>,
    /// Items generated before the turn that requested the handoff.
    pub pre_handoff_items: Vec<Message>,
    /// Items generated in the handoff turn, ending with the transfer result.
    pub new_items: Vec<Message>,
}

impl HandoffInputData {
    /// All items in causal order.
    #[must_use]
    pub fn all_items(&self) -> Vec<Message> {
        self.input_history
            .iter()
            .chain(&self.pre_handoff_items)
            .chain(&self.new_items)
            .cloned()
            .collect()
    }
}

/// Rewrites the history before the target agent sees it.
pub type InputFilter = Arc<dyn Fn(HandoffInputData) -> HandoffInputData + Send + Sync>;

type OnHandoff = Arc<dyn Fn(&RunContext, Option<&Value>) + Send + Sync>;

/// A delegation edge from one agent to another.
#[derive(Clone)]
pub struct Handoff {
    target: Arc<Agent>,
    tool_name: String,
    tool_description: String,
    input_schema: Option<Value>,
    input_filter: Option<InputFilter>,
    enabled: IsEnabled,
    on_handoff: Option<OnHandoff>,
}

impl Handoff {
    /// Create a handoff to `target` with default tool name and description.
    #[must_use]
    pub fn new(target: Agent) -> Self {
        let tool_name = default_tool_name(&target.name);
        let tool_description = default_tool_description(&target);
        Self {
            target: Arc::new(target),
            tool_name,
            tool_description,
            input_schema: None,
            input_filter: None,
            enabled: IsEnabled::default(),
            on_handoff: None,
        }
    }

    /// Override the tool name shown to the model.
    #[must_use]
    pub fn tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    /// Override the tool description shown to the model.
    #[must_use]
    pub fn tool_description(mut self, description: impl Into<String>) -> Self {
        self.tool_description = description.into();
        self
    }

    /// Require a payload matching the schema of `T`.
    #[must_use]
    pub fn input_type<T: JsonSchema>(self) -> Self {
        self.input_schema(generate_json_schema::<T>().1)
    }

    /// Require a payload matching `schema`.
    #[must_use]
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Rewrite the history handed to the target.
    #[must_use]
    pub fn input_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(HandoffInputData) -> HandoffInputData + Send + Sync + 'static,
    {
        self.input_filter = Some(Arc::new(f));
        self
    }

    /// Show or hide the handoff.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = IsEnabled::Static(enabled);
        self
    }

    /// Compute visibility per turn from the context and the source agent.
    #[must_use]
    pub fn enabled_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext, &Agent) -> bool + Send + Sync + 'static,
    {
        self.enabled = IsEnabled::Dynamic(Arc::new(f));
        self
    }

    /// Called with the validated payload when the transfer happens.
    #[must_use]
    pub fn on_handoff<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext, Option<&Value>) + Send + Sync + 'static,
    {
        self.on_handoff = Some(Arc::new(f));
        self
    }

    /// The agent control moves to.
    #[must_use]
    pub fn target(&self) -> &Agent {
        &self.target
    }

    /// The tool name the model calls.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.tool_name
    }

    /// The schema the payload must satisfy, if any.
    #[must_use]
    pub const fn schema(&self) -> Option<&Value> {
        self.input_schema.as_ref()
    }

    /// Returns `true` if an input filter is installed.
    #[must_use]
    pub const fn has_input_filter(&self) -> bool {
        self.input_filter.is_some()
    }

    /// The tool definition shown to the model.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        let parameters = self.input_schema.clone().unwrap_or_else(|| {
            json!({"type": "object", "properties": {}, "additionalProperties": false})
        });
        ToolDefinition::new(&self.tool_name, &self.tool_description, parameters)
    }

    /// Evaluate the enablement predicate against the source agent.
    #[must_use]
    pub fn is_enabled(&self, context: &RunContext, source: &Agent) -> bool {
        self.enabled.evaluate(context, source)
    }

    /// Check a payload against the input schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandoffPayloadInvalid`] if a schema is declared and
    /// the payload is missing or does not conform.
    pub fn validate_payload(&self, payload: Option<&Value>) -> Result<()> {
        let Some(schema) = &self.input_schema else {
            return Ok(());
        };
        let payload = payload.ok_or_else(|| {
            Error::handoff_payload(&self.target.name, "arguments are not valid JSON")
        })?;
        validate(schema, payload).map_err(|reason| Error::handoff_payload(&self.target.name, reason))
    }

    /// Apply the input filter; without one the history passes through.
    #[must_use]
    pub fn filter(&self, data: HandoffInputData) -> HandoffInputData {
        match &self.input_filter {
            Some(f) => f(data),
            None => data,
        }
    }

    pub(crate) fn notify(&self, context: &RunContext, payload: Option<&Value>) {
        if let Some(f) = &self.on_handoff {
            f(context, payload);
        }
    }
}

impl From<Agent> for Handoff {
    fn from(agent: Agent) -> Self {
        Self::new(agent)
    }
}

impl fmt::Debug for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handoff")
            .field("target", &self.target.name)
            .field("tool_name", &self.tool_name)
            .field("input_schema", &self.input_schema.is_some())
            .field("input_filter", &self.input_filter.is_some())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

fn default_tool_name(agent_name: &str) -> String {
    format!("transfer_to_{}", agent_name.to_case(Case::Snake))
}

fn default_tool_description(agent: &Agent) -> String {
    let mut description = format!("Handoff to the {} agent to handle the request.", agent.name);
    if let Some(extra) = &agent.handoff_description {
        description.push(' ');
        description.push_str(extra);
    }
    description
}

/// Built-in input filters.
pub mod filters {
    use super::{HandoffInputData, Message, Role};

    /// Drop tool calls and tool results from every part of the history.
    #[must_use]
    pub fn remove_tool_items(data: HandoffInputData) -> HandoffInputData {
        let keep = |items: Vec<Message>| -> Vec<Message> {
            items.into_iter().filter(|m| !m.is_tool_item()).collect()
        };
        HandoffInputData {
            input_history: keep(data.input_history),
            pre_handoff_items: keep(data.pre_handoff_items),
            new_items: keep(data.new_items),
        }
    }

    /// Keep only the most recent user message.
    #[must_use]
    pub fn latest_input_only(data: HandoffInputData) -> HandoffInputData {
        let latest = data
            .all_items()
            .into_iter()
            .rev()
            .find(|m| m.role == Role::User);
        HandoffInputData {
            input_history: latest.into_iter().collect(),
            pre_handoff_items: Vec::new(),
            new_items: Vec::new(),
        }
    }
}
