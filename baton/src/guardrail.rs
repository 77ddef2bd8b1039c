//! Guardrails: policy checks on run input and final output.
//!
//! - **[`InputGuardrail`]** inspects the input items before the first model
//!   call (off-topic detection, homework filters, content policy).
//! - **[`OutputGuardrail`]** inspects the final output before it is returned
//!   (PII detection, format or policy compliance).
//!
//! # Tripwire Mechanism
//!
//! Each check returns a [`GuardrailOutput`] carrying a `tripwire_triggered`
//! flag. A triggered input guardrail aborts the run with
//! [`Error::InputGuardrailTriggered`](crate::Error::InputGuardrailTriggered);
//! a triggered output guardrail aborts it with
//! [`Error::OutputGuardrailTriggered`](crate::Error::OutputGuardrailTriggered).
//! Guardrail checks never consume a turn.
//!
//! # Execution Modes
//!
//! Input guardrails run sequentially before the first model call unless
//! marked with [`InputGuardrail::run_in_parallel`], in which case they run
//! alongside the first call and a trip discards its reply. Output guardrails
//! run concurrently with each other.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use baton::prelude::*;
//!
//! let filter = InputGuardrail::from_fn("no-homework", |_ctx, _agent, input| {
//!     let text: String = input.iter().filter_map(Message::text).collect();
//!     if text.contains("homework") {
//!         GuardrailOutput::tripwire("homework request")
//!     } else {
//!         GuardrailOutput::pass()
//!     }
//! });
//!
//! let agent = Agent::new("tutor").input_guardrail(filter);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::{Agent, RunConfig, Runner};
use crate::callback::RunContext;
use crate::error::Result;
use crate::message::Message;

/// The verdict of a guardrail check.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailOutput {
    /// Whether the tripwire was triggered.
    ///
    /// If `true`, the run is halted and an error is returned to the caller.
    pub tripwire_triggered: bool,

    /// Structured information about the check (reasons, scores, the verdict
    /// of a checking agent). Carried into the tripwire error.
    pub output_info: Value,
}

impl GuardrailOutput {
    /// Create a passing output.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            tripwire_triggered: false,
            output_info: Value::Null,
        }
    }

    /// Create a triggered output.
    #[must_use]
    pub fn tripwire(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: true,
            output_info: info.into(),
        }
    }

    /// Create a passing output with diagnostic information.
    #[must_use]
    pub fn pass_with_info(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: false,
            output_info: info.into(),
        }
    }

    /// Returns `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.tripwire_triggered
    }
}

/// Check logic for an input guardrail.
#[async_trait]
pub trait InputGuardrailCheck: Send + Sync {
    /// Inspect the run input.
    ///
    /// `input` holds the items the run starts from: prior history followed
    /// by the new user input. Instructions are not included.
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        input: &[Message],
    ) -> Result<GuardrailOutput>;
}

/// Check logic for an output guardrail.
#[async_trait]
pub trait OutputGuardrailCheck: Send + Sync {
    /// Inspect the final output of the agent named `agent_name`.
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        output: &Value,
    ) -> Result<GuardrailOutput>;
}

struct FnInputCheck<F>(F);

#[async_trait]
impl<F> InputGuardrailCheck for FnInputCheck<F>
where
    F: Fn(&RunContext, &str, &[Message]) -> GuardrailOutput + Send + Sync,
{
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        input: &[Message],
    ) -> Result<GuardrailOutput> {
        Ok((self.0)(context, agent_name, input))
    }
}

struct FnOutputCheck<F>(F);

#[async_trait]
impl<F> OutputGuardrailCheck for FnOutputCheck<F>
where
    F: Fn(&RunContext, &str, &Value) -> GuardrailOutput + Send + Sync,
{
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        output: &Value,
    ) -> Result<GuardrailOutput> {
        Ok((self.0)(context, agent_name, output))
    }
}

/// An input guardrail attached to an [`Agent`] or a [`RunConfig`].
///
/// Only the starting agent's input guardrails run; they run once per run.
#[derive(Clone)]
pub struct InputGuardrail {
    name: String,
    run_in_parallel: bool,
    check: Arc<dyn InputGuardrailCheck>,
}

impl InputGuardrail {
    /// Create a sequential input guardrail.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl InputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            run_in_parallel: false,
            check: Arc::new(check),
        }
    }

    /// Create an input guardrail from a synchronous closure.
    #[must_use]
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RunContext, &str, &[Message]) -> GuardrailOutput + Send + Sync + 'static,
    {
        Self::new(name, FnInputCheck(f))
    }

    /// Run alongside the first model call instead of before it.
    ///
    /// A trip still aborts the run, but the first model call has already
    /// been made.
    #[must_use]
    pub const fn run_in_parallel(mut self, parallel: bool) -> Self {
        self.run_in_parallel = parallel;
        self
    }

    /// Returns the name of this guardrail.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether this guardrail runs alongside the first model call.
    #[must_use]
    pub const fn is_parallel(&self) -> bool {
        self.run_in_parallel
    }

    /// Execute the check.
    ///
    /// # Errors
    ///
    /// Propagates failures of the check itself; a triggered tripwire is a
    /// successful result.
    pub async fn run(
        &self,
        context: &RunContext,
        agent_name: &str,
        input: &[Message],
    ) -> Result<InputGuardrailResult> {
        let output = self.check.check(context, agent_name, input).await?;
        Ok(InputGuardrailResult {
            guardrail_name: self.name.clone(),
            output,
        })
    }
}

impl std::fmt::Debug for InputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGuardrail")
            .field("name", &self.name)
            .field("run_in_parallel", &self.run_in_parallel)
            .finish_non_exhaustive()
    }
}

/// The result of running an input guardrail.
#[derive(Debug, Clone)]
pub struct InputGuardrailResult {
    /// Name of the guardrail that produced this result.
    pub guardrail_name: String,
    /// The check's verdict.
    pub output: GuardrailOutput,
}

impl InputGuardrailResult {
    /// Returns `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.output.tripwire_triggered
    }
}

/// An output guardrail attached to an [`Agent`] or a [`RunConfig`].
///
/// Only the final agent's output guardrails run.
#[derive(Clone)]
pub struct OutputGuardrail {
    name: String,
    check: Arc<dyn OutputGuardrailCheck>,
}

impl OutputGuardrail {
    /// Create an output guardrail.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl OutputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Create an output guardrail from a synchronous closure.
    #[must_use]
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RunContext, &str, &Value) -> GuardrailOutput + Send + Sync + 'static,
    {
        Self::new(name, FnOutputCheck(f))
    }

    /// Returns the name of this guardrail.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the check.
    ///
    /// # Errors
    ///
    /// Propagates failures of the check itself.
    pub async fn run(
        &self,
        context: &RunContext,
        agent_name: &str,
        output: &Value,
    ) -> Result<OutputGuardrailResult> {
        let verdict = self.check.check(context, agent_name, output).await?;
        Ok(OutputGuardrailResult {
            guardrail_name: self.name.clone(),
            output: verdict,
        })
    }
}

impl std::fmt::Debug for OutputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The result of running an output guardrail.
#[derive(Debug, Clone)]
pub struct OutputGuardrailResult {
    /// Name of the guardrail that produced this result.
    pub guardrail_name: String,
    /// The check's verdict.
    pub output: GuardrailOutput,
}

impl OutputGuardrailResult {
    /// Returns `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.output.tripwire_triggered
    }
}

/// A check that delegates the verdict to a secondary agent.
///
/// The checking agent runs as an isolated nested run sharing the caller's
/// context value. Its final output should be a JSON object; the boolean at
/// `tripwire_field` (default `"tripwire_triggered"`) decides the verdict and
/// the whole object becomes the guardrail's `output_info`. Give the checking
/// agent an output schema so the verdict is structured.
///
/// ```rust,ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct HomeworkVerdict { is_homework: bool, reasoning: String }
///
/// let checker = Agent::new("Guardrail check")
///     .instructions("Check if the user is asking you to do their homework.")
///     .output_type::<HomeworkVerdict>();
/// let guardrail = InputGuardrail::new("homework", AgentCheck::new(checker).tripwire_field("is_homework"));
/// ```
#[derive(Debug, Clone)]
pub struct AgentCheck {
    agent: Agent,
    tripwire_field: String,
    max_turns: usize,
}

impl AgentCheck {
    /// Wrap a checking agent.
    #[must_use]
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            tripwire_field: "tripwire_triggered".to_owned(),
            max_turns: 3,
        }
    }

    /// Read the verdict from a different boolean field.
    #[must_use]
    pub fn tripwire_field(mut self, field: impl Into<String>) -> Self {
        self.tripwire_field = field.into();
        self
    }

    /// Bound the checking run.
    #[must_use]
    pub const fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    async fn verdict(&self, context: &RunContext, input: Vec<Message>) -> Result<GuardrailOutput> {
        let config = RunConfig::new()
            .max_turns(self.max_turns)
            .shared_context(context.shared());
        let result = Runner::run(&self.agent, input, config).await?;
        let triggered = result
            .output
            .get(&self.tripwire_field)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(GuardrailOutput {
            tripwire_triggered: triggered,
            output_info: result.output,
        })
    }
}

#[async_trait]
impl InputGuardrailCheck for AgentCheck {
    async fn check(
        &self,
        context: &RunContext,
        _agent_name: &str,
        input: &[Message],
    ) -> Result<GuardrailOutput> {
        self.verdict(context, input.to_vec()).await
    }
}

#[async_trait]
impl OutputGuardrailCheck for AgentCheck {
    async fn check(
        &self,
        context: &RunContext,
        _agent_name: &str,
        output: &Value,
    ) -> Result<GuardrailOutput> {
        let text = match output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.verdict(context, vec![Message::user(text)]).await
    }
}
