//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use baton::prelude::*;
//! ```

pub use crate::agent::{
    Agent, AgentTool, AgentToolArgs, Instructions, RunConfig, RunEvent, RunEventStream,
    RunResult, Runner, ToolCallRecord, ToolUseBehavior, UserInput,
};
pub use crate::callback::{
    AgentHooks, BoxedAgentHooks, BoxedRunHooks, LogLevel, LoggingAgentHooks, LoggingRunHooks,
    NoopAgentHooks, NoopRunHooks, RunContext, RunHooks, SharedAgentHooks, SharedRunHooks,
};
pub use crate::chat::{
    BoxedChatProvider, ChatProvider, ChatRequest, ChatResponse, ChunkStream, ModelSettings,
    ResponseFormat, SharedChatProvider, ToolChoice,
};
pub use crate::error::{Error, LlmError, LlmErrorKind, Result, ToolError};
pub use crate::guardrail::{
    AgentCheck, GuardrailOutput, InputGuardrail, InputGuardrailCheck, InputGuardrailResult,
    OutputGuardrail, OutputGuardrailCheck, OutputGuardrailResult,
};
pub use crate::handoff::{Handoff, HandoffInputData, InputFilter, filters};
pub use crate::message::{Message, Role, ToolCall};
pub use crate::model::{FinalOutput, ModelClient, ModelReply, ModelResponse, RetryPolicy};
pub use crate::providers::MockProvider;
pub use crate::schema::OutputSchema;
pub use crate::stream::{StreamAggregator, StreamChunk};
pub use crate::tool::{
    BoxedTool, DynTool, FunctionTool, IsEnabled, SharedTool, Tool, ToolDefinition, ToolList,
    ToolResult,
};
pub use crate::usage::Usage;
