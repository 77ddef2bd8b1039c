//! Backend request/response types and the [`ChatProvider`] trait.
//!
//! This module provides:
//! - [`ChatRequest`]: everything a backend needs for one model call
//! - [`ChatResponse`]: the raw reply from a backend
//! - [`ModelSettings`]: sampling and tool-use knobs shared by agents and runs
//! - [`ChatProvider`]: the seam every model backend implements
//!
//! The runtime never talks to a provider directly; calls go through
//! [`ModelClient`](crate::model::ModelClient), which adds retries, timeouts
//! and response classification.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::message::Message;
use crate::stream::StreamChunk;
use crate::tool::ToolDefinition;
use crate::usage::Usage;

/// Controls how the model uses tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides whether to use tools.
    #[default]
    Auto,
    /// Model must use at least one tool.
    Required,
    /// Model cannot use any tools.
    None,
    /// Model must call the named tool.
    Function(String),
}

impl From<&str> for ToolChoice {
    fn from(s: &str) -> Self {
        match s {
            "auto" => Self::Auto,
            "required" => Self::Required,
            "none" => Self::None,
            name => Self::Function(name.to_owned()),
        }
    }
}

/// Model tuning parameters.
///
/// Every field is optional; unset fields fall back to the backend default.
/// An agent carries its own settings and a run may override them through
/// [`RunConfig::model_settings`](crate::agent::RunConfig::model_settings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling probability mass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Tool selection policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Allow the model to request several tool calls that run concurrently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

impl ModelSettings {
    /// Create empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output token ceiling.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the nucleus sampling probability mass.
    #[must_use]
    pub const fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the tool selection policy.
    #[must_use]
    pub fn tool_choice(mut self, choice: impl Into<ToolChoice>) -> Self {
        self.tool_choice = Some(choice.into());
        self
    }

    /// Enable or disable concurrent tool calls.
    #[must_use]
    pub const fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = Some(enabled);
        self
    }

    /// Merge `overrides` on top of these settings.
    ///
    /// Fields set in `overrides` win; unset fields keep the value from `self`.
    #[must_use]
    pub fn resolve(&self, overrides: &Self) -> Self {
        Self {
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
            tool_choice: overrides
                .tool_choice
                .clone()
                .or_else(|| self.tool_choice.clone()),
            parallel_tool_calls: overrides.parallel_tool_calls.or(self.parallel_tool_calls),
        }
    }
}

/// Response format specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain text response.
    Text,
    /// JSON response with schema (structured outputs).
    JsonSchema {
        /// Schema definition.
        json_schema: JsonSchemaSpec,
    },
}

impl ResponseFormat {
    /// Creates a JSON schema format.
    #[must_use]
    pub fn json_schema(name: impl Into<String>, schema: Value, strict: bool) -> Self {
        Self::JsonSchema {
            json_schema: JsonSchemaSpec {
                name: name.into(),
                schema,
                strict: Some(strict),
            },
        }
    }
}

/// JSON schema specification for structured outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchemaSpec {
    /// Schema name.
    pub name: String,
    /// JSON Schema definition.
    pub schema: Value,
    /// Whether to enforce strict validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// A single model call as seen by a backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,

    /// System instructions, resolved for this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Conversation history.
    pub messages: Vec<Message>,

    /// Tools (including handoff tools) visible to the model.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Maps handoff tool names to target agent names.
    #[serde(skip)]
    pub handoff_routes: HashMap<String, String>,

    /// Sampling and tool-use settings.
    #[serde(flatten)]
    pub settings: ModelSettings,

    /// Structured output format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    /// Whether the caller consumes the reply incrementally.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new request for the given model.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the system instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Replace the conversation history.
    #[must_use]
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Append a user message.
    #[must_use]
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Set the visible tools.
    #[must_use]
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Register a handoff tool and the agent it routes to.
    #[must_use]
    pub fn handoff(mut self, definition: ToolDefinition, target_agent: impl Into<String>) -> Self {
        self.handoff_routes
            .insert(definition.name.clone(), target_agent.into());
        self.tools.push(definition);
        self
    }

    /// Set the model settings.
    #[must_use]
    pub fn settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the response format.
    #[must_use]
    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Returns the agent a handoff tool routes to, if `tool_name` is one.
    #[must_use]
    pub fn handoff_target(&self, tool_name: &str) -> Option<&str> {
        self.handoff_routes.get(tool_name).map(String::as_str)
    }

    /// Returns the text of the most recent user message.
    #[must_use]
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::User)
            .and_then(Message::text)
    }
}

/// A reply from a model backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant message.
    pub message: Message,

    /// Token usage for this call.
    #[serde(default)]
    pub usage: Usage,

    /// Model that produced the reply, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatResponse {
    /// Create a response wrapping an assistant message.
    #[must_use]
    pub const fn new(message: Message) -> Self {
        Self {
            message,
            usage: Usage::zero(),
            model: None,
        }
    }

    /// Create a plain text response.
    #[must_use]
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(Message::assistant(content))
    }

    /// Set the usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Get the text content.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.message.text()
    }

    /// Returns `true` if the reply requests tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.message.has_tool_calls()
    }
}

/// A boxed stream of chunks produced by [`ChatProvider::chat_stream`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Trait for model backends.
///
/// Implementations report failures as [`Error::Llm`](crate::Error::Llm);
/// errors whose kind is transient (rate limiting, timeouts) are retried by
/// the model client.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a request and receive a complete response.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Send a request and receive the reply incrementally.
    ///
    /// The default implementation reports that streaming is not supported.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let _ = request;
        Err(LlmError::not_supported("streaming").into())
    }

    /// Get the name of this provider.
    ///
    /// Used for error messages and logging.
    fn provider_name(&self) -> &'static str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Check if this provider supports streaming.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Check if this provider can return several tool calls for concurrent
    /// execution.
    fn supports_parallel_tool_calls(&self) -> bool {
        true
    }
}

/// Type alias for a boxed chat provider.
pub type BoxedChatProvider = Box<dyn ChatProvider>;

/// Type alias for a shared chat provider.
pub type SharedChatProvider = Arc<dyn ChatProvider>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod model_settings {
        use super::*;

        #[test]
        fn resolve_prefers_overrides() {
            let agent = ModelSettings::new()
                .temperature(0.2)
                .max_tokens(100)
                .tool_choice("required");
            let run = ModelSettings::new().temperature(0.9).parallel_tool_calls(true);
            let merged = agent.resolve(&run);
            assert_eq!(merged.temperature, Some(0.9));
            assert_eq!(merged.max_tokens, Some(100));
            assert_eq!(merged.tool_choice, Some(ToolChoice::Required));
            assert_eq!(merged.parallel_tool_calls, Some(true));
            assert_eq!(merged.top_p, None);
        }

        #[test]
        fn deserializes_partial_config() {
            let settings: ModelSettings =
                serde_json::from_value(json!({"temperature": 0.5, "tool_choice": "required"}))
                    .unwrap();
            assert_eq!(settings.temperature, Some(0.5));
            assert_eq!(settings.tool_choice, Some(ToolChoice::Required));
            assert_eq!(settings.max_tokens, None);
        }

        #[test]
        fn tool_choice_from_str() {
            assert_eq!(ToolChoice::from("auto"), ToolChoice::Auto);
            assert_eq!(ToolChoice::from("none"), ToolChoice::None);
            assert_eq!(
                ToolChoice::from("get_weather"),
                ToolChoice::Function("get_weather".into())
            );
        }
    }

    mod chat_request {
        use super::*;

        #[test]
        fn settings_are_flattened() {
            let request = ChatRequest::new("mock-model")
                .user("hi")
                .settings(ModelSettings::new().temperature(0.1));
            let value = serde_json::to_value(&request).unwrap();
            assert_eq!(value["model"], "mock-model");
            assert!((value["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
            assert!(value.get("stream").is_none());
            assert!(value.get("tools").is_none());
        }

        #[test]
        fn handoff_registers_route() {
            let def = ToolDefinition::new("transfer_to_billing", "Billing", json!({}));
            let request = ChatRequest::new("m").handoff(def, "Billing");
            assert_eq!(request.tools.len(), 1);
            assert_eq!(request.handoff_target("transfer_to_billing"), Some("Billing"));
            assert_eq!(request.handoff_target("other"), None);
        }

        #[test]
        fn last_user_text() {
            let request = ChatRequest::new("m").messages(vec![
                Message::user("first"),
                Message::assistant("ok"),
                Message::user("second"),
            ]);
            assert_eq!(request.last_user_text(), Some("second"));
        }
    }

    mod chat_response {
        use super::*;

        #[test]
        fn from_text() {
            let response = ChatResponse::from_text("hello").with_model("m");
            assert_eq!(response.text(), Some("hello"));
            assert_eq!(response.model.as_deref(), Some("m"));
            assert!(!response.has_tool_calls());
        }
    }
}
