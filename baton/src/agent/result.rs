//! Run configuration, input, result and event types.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::callback::{NoopRunHooks, SharedRunHooks};
use crate::chat::{ModelSettings, SharedChatProvider};
use crate::error::Result;
use crate::guardrail::{
    InputGuardrail, InputGuardrailResult, OutputGuardrail, OutputGuardrailResult,
};
use crate::message::Message;
use crate::model::RetryPolicy;
use crate::usage::Usage;

/// Run-level configuration.
///
/// ```rust,ignore
/// let config = RunConfig::new()
///     .max_turns(5)
///     .context(UserInfo { name: "Zia".into(), uid: 123 })
///     .hooks(Arc::new(LoggingRunHooks::new()))
///     .workflow_name("Customer service");
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Maximum number of model calls before the run aborts.
    pub max_turns: usize,
    /// Run-level lifecycle hooks.
    pub hooks: SharedRunHooks,
    /// Caller value visible to tools, hooks and dynamic instructions.
    pub context: Option<Arc<dyn Any + Send + Sync>>,
    /// Backend used by agents that have none of their own.
    pub provider: Option<SharedChatProvider>,
    /// Extra input guardrails applied on top of the starting agent's.
    pub input_guardrails: Vec<InputGuardrail>,
    /// Extra output guardrails applied on top of the final agent's.
    pub output_guardrails: Vec<OutputGuardrail>,
    /// Settings that override every agent's own.
    pub model_settings: ModelSettings,
    /// Retry policy for transient backend failures.
    pub retry: RetryPolicy,
    /// Deadline for a single backend call.
    pub model_timeout: Option<Duration>,
    /// How many times an output that violates the schema is sent back to
    /// the model for correction. Zero makes violations fatal.
    pub schema_reprompts: usize,
    /// Name grouping this run in logs.
    pub workflow_name: Option<String>,
    /// Trace id; generated when unset.
    pub trace_id: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: Self::DEFAULT_MAX_TURNS,
            hooks: Arc::new(NoopRunHooks),
            context: None,
            provider: None,
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            model_settings: ModelSettings::default(),
            retry: RetryPolicy::default(),
            model_timeout: None,
            schema_reprompts: 0,
            workflow_name: None,
            trace_id: None,
        }
    }
}

impl RunConfig {
    /// Default turn ceiling.
    pub const DEFAULT_MAX_TURNS: usize = 10;

    /// Create a default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the turn ceiling.
    #[must_use]
    pub const fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Set run-level hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: SharedRunHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the caller context value.
    #[must_use]
    pub fn context<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.context = Some(Arc::new(value));
        self
    }

    /// Set an already shared caller context value.
    #[must_use]
    pub fn shared_context(mut self, value: Option<Arc<dyn Any + Send + Sync>>) -> Self {
        self.context = value;
        self
    }

    /// Set the fallback backend.
    #[must_use]
    pub fn provider(mut self, provider: SharedChatProvider) -> Self {
        self.provider = Some(provider);
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

    /// Override model settings for every agent in the run.
    #[must_use]
    pub fn model_settings(mut self, settings: ModelSettings) -> Self {
        self.model_settings = settings;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-call backend deadline.
    #[must_use]
    pub const fn model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = Some(timeout);
        self
    }

    /// Allow `n` corrective re-prompts for schema violations.
    #[must_use]
    pub const fn schema_reprompts(mut self, n: usize) -> Self {
        self.schema_reprompts = n;
        self
    }

    /// Set the workflow name.
    #[must_use]
    pub fn workflow_name(mut self, name: impl Into<String>) -> Self {
        self.workflow_name = Some(name.into());
        self
    }

    /// Set the trace id.
    #[must_use]
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_turns", &self.max_turns)
            .field("context", &self.context.is_some())
            .field("provider", &self.provider.as_ref().map(|p| p.provider_name()))
            .field("input_guardrails", &self.input_guardrails)
            .field("output_guardrails", &self.output_guardrails)
            .field("model_settings", &self.model_settings)
            .field("retry", &self.retry)
            .field("model_timeout", &self.model_timeout)
            .field("schema_reprompts", &self.schema_reprompts)
            .field("workflow_name", &self.workflow_name)
            .field("trace_id", &self.trace_id)
            .finish_non_exhaustive()
    }
}

/// Input to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// A single user message.
    Text(String),
    /// A full item list, such as [`RunResult::to_input_list`] from a previous run.
    Items(Vec<Message>),
}

impl UserInput {
    /// Convert to conversation items.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Text(text) => vec![Message::user(text)],
            Self::Items(items) => items,
        }
    }
}

impl From<&str> for UserInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for UserInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Message>> for UserInput {
    fn from(items: Vec<Message>) -> Self {
        Self::Items(items)
    }
}

/// Record of a single tool call made during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Call id assigned by the model.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Raw arguments as produced by the model.
    pub arguments: String,
    /// Output value on success.
    pub output: Option<Value>,
    /// Text sent back to the model.
    pub result: String,
    /// Error description on failure.
    pub error: Option<String>,
}

impl ToolCallRecord {
    /// Returns `true` if the call succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Final output: a JSON string for text, or the validated structured value.
    pub output: Value,
    /// Items the run started from.
    pub input: Vec<Message>,
    /// Items generated during the run, in causal order.
    pub new_items: Vec<Message>,
    /// Number of model calls made.
    pub turns: usize,
    /// Name of the agent that produced the output.
    pub last_agent: String,
    /// Accumulated token usage.
    pub usage: Usage,
    /// Every tool call executed, in order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Results of the input guardrails.
    pub input_guardrail_results: Vec<InputGuardrailResult>,
    /// Results of the output guardrails.
    pub output_guardrail_results: Vec<OutputGuardrailResult>,
    /// Trace id of the run.
    pub trace_id: String,
}

impl RunResult {
    /// The output as text, if it is a string.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.output.as_str()
    }

    /// Deserialize structured output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the output does not
    /// match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.output.clone())?)
    }

    /// The full conversation: input followed by the new items.
    #[must_use]
    pub fn history(&self) -> Vec<Message> {
        self.input.iter().chain(&self.new_items).cloned().collect()
    }

    /// The conversation as input for the next run.
    ///
    /// Append a new user message and pass the list back to continue a chat.
    #[must_use]
    pub fn to_input_list(&self) -> Vec<Message> {
        self.history()
    }
}

/// Events yielded by [`Runner::run_streamed`](super::Runner::run_streamed).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum RunEvent {
    /// The run passed its input guardrails and started.
    RunStarted {
        /// Starting agent.
        agent_name: String,
        /// Trace id of the run.
        trace_id: String,
    },
    /// A new turn began.
    TurnStarted {
        /// 1-based turn number.
        turn: usize,
        /// Active agent.
        agent_name: String,
    },
    /// Incremental model text.
    TextDelta(String),
    /// The model started a tool call.
    ToolCallStarted {
        /// Call id.
        id: String,
        /// Tool name.
        name: String,
    },
    /// A tool call finished.
    ///
    /// Follows every [`ToolCallStarted`](Self::ToolCallStarted). Calls
    /// answered by a handoff complete with the handoff acknowledgement, or
    /// with an error when the handoff skipped them.
    ToolCallCompleted(ToolCallRecord),
    /// Control moved to another agent.
    AgentSwitched {
        /// Agent that handed off.
        from: String,
        /// New active agent.
        to: String,
    },
    /// The run finished.
    RunCompleted(Box<RunResult>),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_with(output: Value) -> RunResult {
        RunResult {
            output,
            input: vec![Message::user("hi")],
            new_items: vec![Message::assistant("hello")],
            turns: 1,
            last_agent: "a".into(),
            usage: Usage::new(1, 1),
            tool_calls: Vec::new(),
            input_guardrail_results: Vec::new(),
            output_guardrail_results: Vec::new(),
            trace_id: "trace_1".into(),
        }
    }

    mod config {
        use super::*;

        #[test]
        fn defaults() {
            let config = RunConfig::default();
            assert_eq!(config.max_turns, 10);
            assert_eq!(config.schema_reprompts, 0);
            assert!(config.context.is_none());
            assert!(config.model_timeout.is_none());
        }

        #[test]
        fn builder() {
            let config = RunConfig::new()
                .max_turns(3)
                .context(42_u32)
                .schema_reprompts(1)
                .workflow_name("wf")
                .trace_id("t")
                .model_timeout(Duration::from_secs(5));
            assert_eq!(config.max_turns, 3);
            assert_eq!(
                config.context.unwrap().downcast_ref::<u32>(),
                Some(&42)
            );
            assert_eq!(config.workflow_name.as_deref(), Some("wf"));
            assert_eq!(config.model_timeout, Some(Duration::from_secs(5)));
        }
    }

    mod input {
        use super::*;

        #[test]
        fn text_becomes_user_message() {
            let items = UserInput::from("hello").into_messages();
            assert_eq!(items, vec![Message::user("hello")]);
        }

        #[test]
        fn items_pass_through() {
            let items = vec![Message::user("a"), Message::assistant("b")];
            assert_eq!(UserInput::from(items.clone()).into_messages(), items);
        }
    }

    mod run_result {
        use super::*;

        #[derive(Deserialize)]
        struct Recipe {
            title: String,
        }

        #[test]
        fn text_output() {
            let result = result_with(json!("done"));
            assert_eq!(result.text(), Some("done"));
        }

        #[test]
        fn parse_structured_output() {
            let result = result_with(json!({"title": "Biryani"}));
            let recipe: Recipe = result.parse().unwrap();
            assert_eq!(recipe.title, "Biryani");
            assert!(result.text().is_none());
        }

        #[test]
        fn input_list_round_trips() {
            let result = result_with(json!("hello"));
            let mut next = result.to_input_list();
            assert_eq!(next.len(), 2);
            next.push(Message::user("again"));
            let encoded = serde_json::to_string(&next).unwrap();
            let decoded: Vec<Message> = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, next);
        }
    }
}
