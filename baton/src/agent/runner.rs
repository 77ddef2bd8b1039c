//! Runner: the turn-taking state machine.
//!
//! The [`Runner`] drives an [`Agent`] through its loop:
//!
//! 1. Run the input guardrails of the starting agent and the run config
//! 2. Resolve instructions, visible tools and visible handoffs
//! 3. Call the model with the history and the merged model settings
//! 4. Branch on the reply: finish, execute tools, or hand off
//! 5. Repeat until a final output or the turn ceiling
//!
//! A final output passes schema validation and the output guardrails before
//! it is returned. A handoff target without its own provider keeps using the
//! provider of the agent that handed off.
//!
//! # Architecture
//!
//! All per-run state lives in [`RunState`], driven by either the blocking
//! ([`Runner::run`]) or the streaming ([`Runner::run_streamed`]) entry point.
//! Both share [`RunState::process`], so the two paths cannot drift apart.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt as _;
use futures::future::join_all;
use futures::stream::Stream;
use serde_json::{Value, json};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::callback::RunContext;
use crate::chat::{ChatRequest, SharedChatProvider};
use crate::error::{Error, Result, ToolError};
use crate::guardrail::{
    InputGuardrail, InputGuardrailResult, OutputGuardrail, OutputGuardrailResult,
};
use crate::handoff::{Handoff, HandoffInputData};
use crate::message::{Message, ToolCall};
use crate::model::{ModelClient, ModelReply, ModelResponse};
use crate::stream::{StreamAggregator, StreamChunk};
use crate::tool::{self, SharedTool, ToolDefinition};

use super::config::{Agent, record_output};
use super::hook::HookDispatcher;
use super::result::{RunConfig, RunEvent, RunResult, ToolCallRecord, UserInput};

/// A boxed stream of run events.
pub type RunEventStream<'a> = Pin<Box<dyn Stream<Item = Result<RunEvent>> + Send + 'a>>;

const SKIPPED_BY_HANDOFF: &str = "Skipped: control was handed to another agent in the same turn.";

/// What a processed turn led to.
enum TurnOutcome {
    /// The model produced the final output.
    Final(Value),
    /// Tools ran; `stop_output` is set when the tool-use policy ends the run.
    ToolsExecuted {
        records: Vec<ToolCallRecord>,
        stop_output: Option<Value>,
    },
    /// Control moved to another agent; `records` answer the turn's calls.
    HandedOff {
        from: String,
        to: String,
        records: Vec<ToolCallRecord>,
    },
    /// The output violated the schema and a correction was requested.
    Reprompted,
}

/// A model call ready to be sent.
struct PreparedTurn {
    client: ModelClient,
    request: ChatRequest,
}

/// Mutable state of a single run.
struct RunState {
    agent: Agent,
    config: RunConfig,
    hooks: HookDispatcher,
    context: RunContext,
    trace_id: String,
    input: Vec<Message>,
    new_items: Vec<Message>,
    turn_start: usize,
    turns: usize,
    tools_used: bool,
    reprompts_left: usize,
    visible_tools: Vec<SharedTool>,
    parallel_tools: bool,
    tool_calls: Vec<ToolCallRecord>,
    input_guardrail_results: Vec<InputGuardrailResult>,
    parallel_guardrails: Vec<InputGuardrail>,
}

impl RunState {
    fn new(agent: &Agent, input: UserInput, config: RunConfig) -> Self {
        let trace_id = config
            .trace_id
            .clone()
            .unwrap_or_else(|| format!("trace_{}", Uuid::new_v4().simple()));
        let mut context = RunContext::new()
            .with_shared(config.context.clone())
            .with_agent_name(&agent.name)
            .with_trace_id(&trace_id);
        if let Some(workflow) = &config.workflow_name {
            context = context.with_workflow_name(workflow);
        }
        Self {
            agent: agent.clone(),
            hooks: HookDispatcher::new(Arc::clone(&config.hooks)),
            reprompts_left: config.schema_reprompts,
            config,
            context,
            trace_id,
            input: input.into_messages(),
            new_items: Vec::new(),
            turn_start: 0,
            turns: 0,
            tools_used: false,
            visible_tools: Vec::new(),
            parallel_tools: false,
            tool_calls: Vec::new(),
            input_guardrail_results: Vec::new(),
            parallel_guardrails: Vec::new(),
        }
    }

    /// Run sequential input guardrails and announce the run.
    ///
    /// Guardrails marked parallel are kept for the first model call.
    async fn start(&mut self) -> Result<()> {
        let (parallel, sequential): (Vec<_>, Vec<_>) = self
            .agent
            .input_guardrails
            .iter()
            .chain(&self.config.input_guardrails)
            .cloned()
            .partition(InputGuardrail::is_parallel);
        self.parallel_guardrails = parallel;

        if !sequential.is_empty() {
            let results =
                Runner::run_input_guardrails(&sequential, &self.context, &self.agent.name, &self.input)
                    .await?;
            self.input_guardrail_results.extend(results);
        }

        info!(
            agent = %self.agent.name,
            trace_id = %self.trace_id,
            workflow = self.config.workflow_name.as_deref().unwrap_or_default(),
            input_items = self.input.len(),
            "Agent run started"
        );
        self.hooks.run_start(&self.context, &self.agent, &self.input).await;
        self.hooks.agent_start(&self.context, &self.agent).await;
        Ok(())
    }

    fn history(&self) -> Vec<Message> {
        self.input.iter().chain(&self.new_items).cloned().collect()
    }

    fn provider(&self) -> Result<SharedChatProvider> {
        self.agent
            .provider
            .clone()
            .or_else(|| self.config.provider.clone())
            .ok_or_else(|| {
                Error::agent(format!(
                    "Agent '{}' has no provider configured. Call .provider() on the agent or the run config.",
                    self.agent.name
                ))
            })
    }

    /// Begin a turn and build its request.
    ///
    /// Fails with [`Error::MaxTurnsExceeded`] before any model call once the
    /// ceiling is reached.
    fn prepare_turn(&mut self) -> Result<PreparedTurn> {
        if self.turns >= self.config.max_turns {
            return Err(Error::max_turns(self.config.max_turns));
        }
        self.turns += 1;
        self.context.advance_turn();
        self.turn_start = self.new_items.len();
        debug!(agent = %self.agent.name, turn = self.turns, "Starting turn");

        let provider = self.provider()?;
        self.context.set_provider(Arc::clone(&provider));
        let mut settings = self.agent.model_settings.resolve(&self.config.model_settings);
        if self.tools_used && self.agent.reset_tool_choice {
            settings.tool_choice = None;
        }
        self.parallel_tools =
            settings.parallel_tool_calls == Some(true) && provider.supports_parallel_tool_calls();
        self.visible_tools = self.agent.visible_tools(&self.context);

        let model = if self.agent.model.is_empty() {
            provider.default_model().to_owned()
        } else {
            self.agent.model.clone()
        };
        let mut request = ChatRequest::new(model)
            .messages(self.history())
            .tools(self.visible_tools.iter().map(|t| t.definition()).collect())
            .settings(settings);
        if let Some(instructions) = self.agent.resolve_instructions(&self.context) {
            request = request.instructions(instructions);
        }
        for handoff in self.agent.visible_handoffs(&self.context) {
            request = request.handoff(handoff.definition(), &handoff.target().name);
        }
        if let Some(schema) = &self.agent.output_schema {
            request = request.response_format(schema.to_response_format());
        }

        let tool_names: Vec<&str> = request.tools.iter().map(ToolDefinition::name).collect();
        tracing::Span::current().record("agent.tools", tracing::field::debug(&tool_names));

        let client = ModelClient::new(provider)
            .with_retry(self.config.retry)
            .with_timeout(self.config.model_timeout);
        Ok(PreparedTurn { client, request })
    }

    async fn llm_start(&self, request: &ChatRequest) {
        self.hooks
            .llm_start(
                &self.context,
                &self.agent,
                request.instructions.as_deref(),
                &request.messages,
            )
            .await;
    }

    /// Run parallel input guardrails alongside `call` on the first turn.
    async fn with_parallel_guardrails<F>(&mut self, call: F) -> Result<ModelReply>
    where
        F: Future<Output = Result<ModelReply>> + Send,
    {
        if self.turns != 1 || self.parallel_guardrails.is_empty() {
            return call.await;
        }
        let guardrails = mem::take(&mut self.parallel_guardrails);
        let checks =
            Runner::run_input_guardrails(&guardrails, &self.context, &self.agent.name, &self.input);
        let (checked, reply) = futures::future::join(checks, call).await;
        self.input_guardrail_results.extend(checked?);
        reply
    }

    async fn record_reply(&mut self, reply: &ModelReply) {
        self.context.add_usage(reply.raw.usage);
        self.hooks.llm_end(&self.context, &self.agent, &reply.raw).await;
    }

    /// Apply a classified reply to the run.
    async fn process(&mut self, reply: ModelReply) -> Result<TurnOutcome> {
        let ModelReply { response, raw } = reply;
        match response {
            ModelResponse::FinalMessage(output) => {
                let text = raw.text().unwrap_or_default().to_owned();
                self.new_items.push(raw.message);
                let Some(schema) = self.agent.output_schema.clone() else {
                    return Ok(TurnOutcome::Final(output.to_value()));
                };
                match schema.parse_text(&text) {
                    Ok(value) => Ok(TurnOutcome::Final(value)),
                    Err(reason) if self.reprompts_left > 0 => {
                        self.reprompts_left -= 1;
                        warn!(
                            agent = %self.agent.name,
                            schema = schema.name(),
                            reason = %reason,
                            "Output does not match schema, asking for a correction"
                        );
                        self.new_items.push(Message::user(format!(
                            "Your previous reply did not match the required output schema '{}': {reason}. \
                             Reply again with only JSON that matches the schema.",
                            schema.name()
                        )));
                        Ok(TurnOutcome::Reprompted)
                    }
                    Err(reason) => Err(Error::schema_violation(schema.name(), reason)),
                }
            }

            ModelResponse::ToolCalls(calls) => {
                self.new_items.push(raw.message);
                let records = Runner::execute_tool_calls(
                    &calls,
                    &self.visible_tools,
                    &self.agent,
                    &self.context,
                    &self.hooks,
                    self.parallel_tools,
                )
                .await;
                for record in &records {
                    self.new_items
                        .push(Message::tool(&record.id, &record.result).with_name(&record.name));
                }
                self.tool_calls.extend(records.iter().cloned());
                self.tools_used = true;
                let stop_output = self
                    .agent
                    .tool_use_behavior
                    .final_record(&records)
                    .map(record_output);
                Ok(TurnOutcome::ToolsExecuted {
                    records,
                    stop_output,
                })
            }

            ModelResponse::HandoffRequested {
                target_agent,
                payload,
                call,
                ignored_calls: _,
            } => {
                let handoff = self
                    .agent
                    .handoffs
                    .iter()
                    .find(|h| h.name() == call.name)
                    .cloned()
                    .ok_or_else(|| {
                        Error::agent(format!(
                            "Agent '{}' has no handoff named '{}'",
                            self.agent.name, call.name
                        ))
                    })?;
                handoff.validate_payload(payload.as_ref())?;

                let all_calls = raw.message.tool_calls.clone();
                self.new_items.push(raw.message);
                let records = self.push_handoff_results(&all_calls, &call, &target_agent);
                self.apply_input_filter(&handoff);
                handoff.notify(&self.context, payload.as_ref());

                let mut target = handoff.target().clone();
                if target.provider.is_none() {
                    target.provider.clone_from(&self.agent.provider);
                }
                let from = mem::replace(&mut self.agent, target);
                self.tools_used = false;
                info!(from = %from.name, to = %self.agent.name, turn = self.turns, "Agent handoff");
                self.context.set_agent_name(&self.agent.name);
                self.hooks.handoff(&self.context, &from, &self.agent).await;
                self.hooks.agent_start(&self.context, &self.agent).await;
                Ok(TurnOutcome::HandedOff {
                    from: from.name,
                    to: self.agent.name.clone(),
                    records,
                })
            }
        }
    }

    /// Answer every call of the handoff turn so the history stays well formed.
    fn push_handoff_results(
        &mut self,
        calls: &[ToolCall],
        handoff_call: &ToolCall,
        target: &str,
    ) -> Vec<ToolCallRecord> {
        calls
            .iter()
            .map(|c| {
                let (output, error) = if c.id == handoff_call.id {
                    (Some(json!({ "assistant": target })), None)
                } else {
                    (None, Some(SKIPPED_BY_HANDOFF.to_owned()))
                };
                let result = output
                    .as_ref()
                    .map_or_else(|| SKIPPED_BY_HANDOFF.to_owned(), Value::to_string);
                self.new_items.push(Message::tool(&c.id, &result).with_name(&c.name));
                ToolCallRecord {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    arguments: c.arguments.clone(),
                    output,
                    result,
                    error,
                }
            })
            .collect()
    }

    fn apply_input_filter(&mut self, handoff: &Handoff) {
        if !handoff.has_input_filter() {
            return;
        }
        let current = self.new_items.split_off(self.turn_start);
        let data = HandoffInputData {
            input_history: mem::take(&mut self.input),
            pre_handoff_items: mem::take(&mut self.new_items),
            new_items: current,
        };
        let filtered = handoff.filter(data);
        self.input = filtered.input_history;
        self.new_items = filtered.pre_handoff_items;
        self.new_items.extend(filtered.new_items);
    }

    /// Run output guardrails and assemble the result.
    async fn finish(&mut self, output: Value) -> Result<RunResult> {
        let guardrails: Vec<OutputGuardrail> = self
            .agent
            .output_guardrails
            .iter()
            .chain(&self.config.output_guardrails)
            .cloned()
            .collect();
        let output_guardrail_results =
            Runner::run_output_guardrails(&guardrails, &self.context, &self.agent.name, &output)
                .await?;

        self.hooks.agent_end(&self.context, &self.agent, &output).await;
        self.hooks.run_end(&self.context, &self.agent, &output).await;

        let usage = *self.context.usage();
        tracing::Span::current().record("run.turns", self.turns);
        info!(
            agent = %self.agent.name,
            turns = self.turns,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Agent run completed"
        );

        Ok(RunResult {
            output,
            input: mem::take(&mut self.input),
            new_items: mem::take(&mut self.new_items),
            turns: self.turns,
            last_agent: self.agent.name.clone(),
            usage,
            tool_calls: mem::take(&mut self.tool_calls),
            input_guardrail_results: mem::take(&mut self.input_guardrail_results),
            output_guardrail_results,
            trace_id: self.trace_id.clone(),
        })
    }

    /// Log a failure and notify hooks.
    async fn fail(&self, err: &Error) {
        if err.is_guardrail_tripwire() {
            warn!(error = %err, agent = %self.agent.name, turn = self.turns, "Guardrail tripwire triggered");
        } else {
            error!(error = %err, agent = %self.agent.name, turn = self.turns, "Agent run failed");
        }
        tracing::Span::current().record("error", tracing::field::display(err));
        self.hooks.error(&self.context, &self.agent, err).await;
    }

    /// Pass `result` through, notifying hooks on failure.
    async fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.fail(err).await;
        }
        result
    }

    async fn run_to_completion(&mut self) -> Result<RunResult> {
        self.start().await?;
        loop {
            let PreparedTurn { client, request } = self.prepare_turn()?;
            self.llm_start(&request).await;
            let reply = self.with_parallel_guardrails(client.send(&request)).await?;
            self.record_reply(&reply).await;

            match self.process(reply).await? {
                TurnOutcome::Final(output)
                | TurnOutcome::ToolsExecuted {
                    stop_output: Some(output),
                    ..
                } => return self.finish(output).await,
                TurnOutcome::ToolsExecuted { .. }
                | TurnOutcome::HandedOff { .. }
                | TurnOutcome::Reprompted => {}
            }
        }
    }
}

/// Stateless execution engine.
///
/// `Runner` owns no state; every run gets its own [`RunState`], so runs of
/// the same agent may proceed concurrently. They share only what the caller
/// aliased, such as a tool list shared between agent clones.
#[derive(Debug, Clone, Copy)]
pub struct Runner;

impl Runner {
    /// Run an agent to completion.
    ///
    /// # Errors
    ///
    /// - [`Error::InputGuardrailTriggered`] / [`Error::OutputGuardrailTriggered`]
    ///   when a tripwire fires
    /// - [`Error::MaxTurnsExceeded`] when the turn ceiling is reached
    /// - [`Error::OutputSchemaViolation`] / [`Error::HandoffPayloadInvalid`]
    /// - [`Error::Llm`] for backend failures that survived retries
    /// - [`Error::Agent`] when no provider is configured
    ///
    /// Tool failures never end a run; they are reported to the model.
    pub fn run<'a>(
        agent: &'a Agent,
        input: impl Into<UserInput>,
        config: RunConfig,
    ) -> Pin<Box<dyn Future<Output = Result<RunResult>> + Send + 'a>> {
        let input = input.into();
        let span = info_span!(
            "agent",
            agent.name = %agent.name,
            agent.model = %agent.model,
            gen_ai.system = "baton",
            run.max_turns = config.max_turns,
            agent.tools = tracing::field::Empty,
            run.turns = tracing::field::Empty,
            error = tracing::field::Empty,
        );
        Box::pin(Self::run_inner(agent, input, config).instrument(span))
    }

    async fn run_inner(agent: &Agent, input: UserInput, config: RunConfig) -> Result<RunResult> {
        let mut state = RunState::new(agent, input, config);
        let result = state.run_to_completion().await;
        state.guard(result).await
    }

    /// Run an agent, yielding [`RunEvent`]s as the run progresses.
    ///
    /// The stream is lazy and single-pass. Dropping it cancels the pending
    /// model call and schedules no further turns. Providers without native
    /// streaming are replayed as synthetic chunks.
    pub fn run_streamed<'a>(
        agent: &'a Agent,
        input: impl Into<UserInput>,
        config: RunConfig,
    ) -> RunEventStream<'a> {
        let input = input.into();
        Box::pin(Self::run_streamed_inner(agent, input, config))
    }

    // `tail_expr_drop_order` fires inside the `try_stream!` expansion.
    #[allow(tail_expr_drop_order)]
    fn run_streamed_inner(
        agent: &Agent,
        input: UserInput,
        config: RunConfig,
    ) -> impl Stream<Item = Result<RunEvent>> + Send + '_ {
        async_stream::try_stream! {
            let mut state = RunState::new(agent, input, config);
            let started = state.start().await;
            state.guard(started).await?;
            yield RunEvent::RunStarted {
                agent_name: state.agent.name.clone(),
                trace_id: state.trace_id.clone(),
            };

            loop {
                let prepared = state.prepare_turn();
                let PreparedTurn { client, request } = state.guard(prepared).await?;
                yield RunEvent::TurnStarted {
                    turn: state.turns,
                    agent_name: state.agent.name.clone(),
                };
                state.llm_start(&request).await;

                // Parallel guardrails run before the stream opens; a stream
                // cannot be forked alongside them.
                if state.turns == 1 && !state.parallel_guardrails.is_empty() {
                    let guardrails = mem::take(&mut state.parallel_guardrails);
                    let checked = Self::run_input_guardrails(
                        &guardrails,
                        &state.context,
                        &state.agent.name,
                        &state.input,
                    )
                    .await;
                    let results = state.guard(checked).await?;
                    state.input_guardrail_results.extend(results);
                }

                let opened = client.stream(&request).await;
                let mut chunks = state.guard(opened).await?;
                let mut aggregator = StreamAggregator::new();
                while let Some(chunk) = chunks.next().await {
                    let chunk = state.guard(chunk).await?;
                    match &chunk {
                        StreamChunk::Text { delta } => {
                            yield RunEvent::TextDelta(delta.clone());
                        }
                        StreamChunk::ToolUseStart { id, name, .. } => {
                            yield RunEvent::ToolCallStarted {
                                id: id.clone(),
                                name: name.clone(),
                            };
                        }
                        _ => {}
                    }
                    aggregator.apply(&chunk);
                }

                let reply = ModelReply::new(&request, aggregator.into_chat_response());
                state.record_reply(&reply).await;

                let processed = state.process(reply).await;
                let final_output = match state.guard(processed).await? {
                    TurnOutcome::Final(output) => Some(output),
                    TurnOutcome::ToolsExecuted { records, stop_output } => {
                        for record in records {
                            yield RunEvent::ToolCallCompleted(record);
                        }
                        stop_output
                    }
                    TurnOutcome::HandedOff { from, to, records } => {
                        for record in records {
                            yield RunEvent::ToolCallCompleted(record);
                        }
                        yield RunEvent::AgentSwitched { from, to };
                        None
                    }
                    TurnOutcome::Reprompted => None,
                };

                if let Some(output) = final_output {
                    let finished = state.finish(output).await;
                    let result = state.guard(finished).await?;
                    yield RunEvent::RunCompleted(Box::new(result));
                    break;
                }
            }
        }
    }
}

impl Runner {
    /// Execute tool calls and return their records in call order.
    ///
    /// Calls run concurrently when `parallel` is set, otherwise one after
    /// another in the order the model returned them.
    async fn execute_tool_calls(
        calls: &[ToolCall],
        visible: &[SharedTool],
        agent: &Agent,
        context: &RunContext,
        hooks: &HookDispatcher,
        parallel: bool,
    ) -> Vec<ToolCallRecord> {
        if parallel {
            let futs = calls
                .iter()
                .map(|call| Self::execute_single_tool(call, visible, agent, context, hooks));
            return join_all(futs).await;
        }
        let mut records = Vec::with_capacity(calls.len());
        for call in calls {
            records.push(Self::execute_single_tool(call, visible, agent, context, hooks).await);
        }
        records
    }

    /// Execute a single tool call with lifecycle hooks.
    ///
    /// A call to a tool that is not visible this turn is answered with a
    /// "not found" error.
    async fn execute_single_tool(
        call: &ToolCall,
        visible: &[SharedTool],
        agent: &Agent,
        context: &RunContext,
        hooks: &HookDispatcher,
    ) -> ToolCallRecord {
        let tool_span = info_span!(
            "tool",
            tool.name = %call.name,
            tool.id = %call.id,
            tool.input = %call.arguments,
            tool.output = tracing::field::Empty,
            tool.success = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        async {
            hooks.tool_start(context, agent, &call.name).await;

            let outcome = match visible.iter().find(|t| t.name() == call.name) {
                Some(tool) => tool::invoke(tool.as_ref(), &call.arguments, context).await,
                None => {
                    warn!(tool = %call.name, "Tool not found");
                    Err(ToolError::not_found(&call.name))
                }
            };
            let result = tool::render_result(&outcome);

            let current = tracing::Span::current();
            current.record("tool.success", outcome.is_ok());
            current.record("tool.output", result.as_str());
            if let Err(e) = &outcome {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                current.record("error", tracing::field::display(e));
            }
            hooks.tool_end(context, agent, &call.name, &result).await;

            let (output, error) = match outcome {
                Ok(value) => (Some(value), None),
                Err(e) => (None, Some(e.to_string())),
            };
            ToolCallRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                output,
                result,
                error,
            }
        }
        .instrument(tool_span)
        .await
    }

    /// Run input guardrails in order, stopping at the first tripwire.
    async fn run_input_guardrails(
        guardrails: &[InputGuardrail],
        context: &RunContext,
        agent_name: &str,
        input: &[Message],
    ) -> Result<Vec<InputGuardrailResult>> {
        let mut results = Vec::with_capacity(guardrails.len());
        for guardrail in guardrails {
            let result = guardrail.run(context, agent_name, input).await?;
            if result.is_triggered() {
                return Err(Error::input_guardrail(
                    &result.guardrail_name,
                    result.output.output_info,
                ));
            }
            results.push(result);
        }
        Ok(results)
    }

    /// Run output guardrails concurrently.
    ///
    /// The first tripwire in declaration order wins.
    async fn run_output_guardrails(
        guardrails: &[OutputGuardrail],
        context: &RunContext,
        agent_name: &str,
        output: &Value,
    ) -> Result<Vec<OutputGuardrailResult>> {
        if guardrails.is_empty() {
            return Ok(Vec::new());
        }
        let all = join_all(guardrails.iter().map(|g| g.run(context, agent_name, output))).await;
        let mut results = Vec::with_capacity(all.len());
        for r in all {
            let result = r?;
            if result.is_triggered() {
                return Err(Error::output_guardrail(
                    &result.guardrail_name,
                    result.output.output_info,
                ));
            }
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use schemars::JsonSchema;
    use serde::Deserialize;

    use crate::agent::ToolUseBehavior;
    use crate::chat::ModelSettings;
    use crate::error::LlmError;
    use crate::providers::MockProvider;
    use crate::tool::FunctionTool;

    #[derive(Deserialize, JsonSchema)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    fn add_tool() -> FunctionTool {
        FunctionTool::new("add", "Add two integers", |args: AddArgs, _ctx: &RunContext| {
            Ok::<_, ToolError>(args.a + args.b)
        })
    }

    fn agent_with(provider: &Arc<MockProvider>) -> Agent {
        Agent::new("calc")
            .instructions("You add numbers.")
            .provider(Arc::clone(provider) as SharedChatProvider)
            .tool(add_tool())
    }

    mod blocking {
        use super::*;

        #[tokio::test]
        async fn text_reply_finishes_in_one_turn() {
            let provider = Arc::new(MockProvider::new().push_text("hello"));
            let result = Runner::run(&agent_with(&provider), "hi", RunConfig::default())
                .await
                .unwrap();
            assert_eq!(result.text(), Some("hello"));
            assert_eq!(result.turns, 1);
            assert_eq!(result.last_agent, "calc");
            assert_eq!(result.new_items.len(), 1);
            assert!(result.trace_id.starts_with("trace_"));

            let request = &provider.requests()[0];
            assert_eq!(request.instructions.as_deref(), Some("You add numbers."));
            assert_eq!(request.tools.len(), 1);
            assert_eq!(request.model, "mock-model");
        }

        #[tokio::test]
        async fn tool_results_are_sent_back() {
            let provider = Arc::new(
                MockProvider::new()
                    .push_tool_call("add", json!({"a": 2, "b": 3}))
                    .push_text("2 + 3 = 5"),
            );
            let result = Runner::run(&agent_with(&provider), "add 2 and 3", RunConfig::default())
                .await
                .unwrap();
            assert_eq!(result.text(), Some("2 + 3 = 5"));
            assert_eq!(result.turns, 2);
            assert_eq!(result.tool_calls.len(), 1);
            assert_eq!(result.tool_calls[0].output, Some(json!(5)));

            let second = &provider.requests()[1];
            let tool_msg = second.messages.last().unwrap();
            assert_eq!(tool_msg.text(), Some("5"));
            assert_eq!(tool_msg.tool_call_id.as_deref(), Some(result.tool_calls[0].id.as_str()));
        }

        #[tokio::test]
        async fn stop_on_first_tool_returns_raw_output() {
            let provider = Arc::new(MockProvider::new().push_tool_call("add", json!({"a": 1, "b": 1})));
            let agent = agent_with(&provider).tool_use_behavior(ToolUseBehavior::StopOnFirstTool);
            let result = Runner::run(&agent, "1+1", RunConfig::default()).await.unwrap();
            assert_eq!(result.output, json!(2));
            assert_eq!(provider.call_count(), 1);
        }

        #[tokio::test]
        async fn missing_provider_is_an_agent_error() {
            let err = Runner::run(&Agent::new("lonely"), "hi", RunConfig::default())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Agent(_)));
        }

        #[tokio::test]
        async fn run_config_provider_is_a_fallback() {
            let provider = Arc::new(MockProvider::new().push_text("fallback"));
            let config = RunConfig::new().provider(provider);
            let result = Runner::run(&Agent::new("a"), "hi", config).await.unwrap();
            assert_eq!(result.text(), Some("fallback"));
        }

        #[tokio::test]
        async fn unknown_tool_is_reported_to_model() {
            let provider = Arc::new(
                MockProvider::new()
                    .push_tool_call("nope", json!({}))
                    .push_text("sorry"),
            );
            let result = Runner::run(&agent_with(&provider), "x", RunConfig::default())
                .await
                .unwrap();
            assert!(!result.tool_calls[0].is_success());
            assert!(result.tool_calls[0].result.contains("not found"));
        }

        #[tokio::test]
        async fn run_settings_override_agent_settings() {
            let provider = Arc::new(MockProvider::new().push_text("ok"));
            let agent = agent_with(&provider)
                .model_settings(ModelSettings::new().temperature(0.2).max_tokens(50));
            let config = RunConfig::new().model_settings(ModelSettings::new().temperature(0.9));
            Runner::run(&agent, "x", config).await.unwrap();
            let settings = &provider.requests()[0].settings;
            assert_eq!(settings.temperature, Some(0.9));
            assert_eq!(settings.max_tokens, Some(50));
        }

        #[tokio::test]
        async fn non_transient_model_errors_propagate() {
            let provider = Arc::new(MockProvider::new().push_error(LlmError::invalid_request("bad")));
            let err = Runner::run(&agent_with(&provider), "x", RunConfig::default())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Llm(_)));
            assert_eq!(provider.call_count(), 1);
        }
    }

    mod turn_limit {
        use super::*;

        #[tokio::test]
        async fn zero_turns_makes_no_call() {
            let provider = Arc::new(MockProvider::new().push_text("never"));
            let err = Runner::run(&agent_with(&provider), "x", RunConfig::new().max_turns(0))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::MaxTurnsExceeded { max_turns: 0 }));
            assert_eq!(provider.call_count(), 0);
        }
    }

    mod schema_output {
        use super::*;
        use crate::schema::OutputSchema;

        fn schema() -> OutputSchema {
            OutputSchema::new(
                "Answer",
                json!({
                    "type": "object",
                    "properties": {"value": {"type": "integer"}},
                    "required": ["value"]
                }),
            )
        }

        #[tokio::test]
        async fn valid_output_is_structured() {
            let provider = Arc::new(MockProvider::new().push_text(r#"{"value": 4}"#));
            let agent = agent_with(&provider).output_schema(schema());
            let result = Runner::run(&agent, "x", RunConfig::default()).await.unwrap();
            assert_eq!(result.output, json!({"value": 4}));
            assert!(provider.requests()[0].response_format.is_some());
        }

        #[tokio::test]
        async fn violation_is_fatal_by_default() {
            let provider = Arc::new(MockProvider::new().push_text(r#"{"value": "four"}"#));
            let agent = agent_with(&provider).output_schema(schema());
            let err = Runner::run(&agent, "x", RunConfig::default()).await.unwrap_err();
            assert!(matches!(err, Error::OutputSchemaViolation { ref schema, .. } if schema == "Answer"));
        }

        #[tokio::test]
        async fn reprompt_consumes_a_turn() {
            let provider = Arc::new(
                MockProvider::new()
                    .push_text("four")
                    .push_text(r#"{"value": 4}"#),
            );
            let agent = agent_with(&provider).output_schema(schema());
            let result = Runner::run(&agent, "x", RunConfig::new().schema_reprompts(1))
                .await
                .unwrap();
            assert_eq!(result.output, json!({"value": 4}));
            assert_eq!(result.turns, 2);
            let correction = provider.requests()[1].messages.last().unwrap().clone();
            assert!(correction.text().unwrap().contains("Answer"));
        }
    }
}
