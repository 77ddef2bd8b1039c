//! Error types for the baton runtime.
//!
//! Errors fall into three groups:
//! - model backend failures ([`LlmError`]), some of which are retried
//! - tool failures ([`ToolError`]), which are recovered locally and fed back
//!   to the model as text
//! - run-level failures (turn limit, guardrail tripwires, schema violations)
//!   that abort a run

use std::fmt;

use serde_json::Value;

/// Result type alias for baton operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the baton runtime.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Model backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool error that escaped local recovery.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Misconfigured agent or runtime invariant violation.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The run used up its turn budget without producing a final output.
    #[error("Maximum turns ({max_turns}) exceeded without final output")]
    MaxTurnsExceeded {
        /// The configured turn ceiling.
        max_turns: usize,
    },

    /// An input guardrail tripwire fired before the agent ran.
    #[error("Input guardrail '{guardrail}' triggered")]
    InputGuardrailTriggered {
        /// Name of the guardrail that fired.
        guardrail: String,
        /// Diagnostic information reported by the check.
        info: Value,
    },

    /// An output guardrail tripwire fired on the final output.
    #[error("Output guardrail '{guardrail}' triggered")]
    OutputGuardrailTriggered {
        /// Name of the guardrail that fired.
        guardrail: String,
        /// Diagnostic information reported by the check.
        info: Value,
    },

    /// The final output does not conform to the agent's output schema.
    #[error("Output does not match schema '{schema}': {reason}")]
    OutputSchemaViolation {
        /// Name of the declared output schema.
        schema: String,
        /// Validation failure description.
        reason: String,
    },

    /// A handoff payload does not conform to the handoff's input schema.
    #[error("Invalid handoff payload for '{target}': {reason}")]
    HandoffPayloadInvalid {
        /// Name of the agent the handoff targeted.
        target: String,
        /// Validation failure description.
        reason: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an agent error with a message.
    #[must_use]
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Create a max turns error.
    #[must_use]
    pub const fn max_turns(max_turns: usize) -> Self {
        Self::MaxTurnsExceeded { max_turns }
    }

    /// Create an input guardrail error.
    #[must_use]
    pub fn input_guardrail(guardrail: impl Into<String>, info: Value) -> Self {
        Self::InputGuardrailTriggered {
            guardrail: guardrail.into(),
            info,
        }
    }

    /// Create an output guardrail error.
    #[must_use]
    pub fn output_guardrail(guardrail: impl Into<String>, info: Value) -> Self {
        Self::OutputGuardrailTriggered {
            guardrail: guardrail.into(),
            info,
        }
    }

    /// Create an output schema violation error.
    #[must_use]
    pub fn schema_violation(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OutputSchemaViolation {
            schema: schema.into(),
            reason: reason.into(),
        }
    }

    /// Create a handoff payload error.
    #[must_use]
    pub fn handoff_payload(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HandoffPayloadInvalid {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error was raised by a guardrail tripwire.
    #[must_use]
    pub const fn is_guardrail_tripwire(&self) -> bool {
        matches!(
            self,
            Self::InputGuardrailTriggered { .. } | Self::OutputGuardrailTriggered { .. }
        )
    }

    /// Returns `true` if retrying the failed operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Error type for model backend operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmError {
    /// The error kind.
    pub kind: LlmErrorKind,
    /// The provider name (e.g., "mock").
    pub provider: Option<String>,
    /// Additional error message.
    pub message: String,
    /// Optional error code from the provider.
    pub code: Option<String>,
}

/// Categories of model backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LlmErrorKind {
    /// Authentication or authorization failure.
    Auth,
    /// Rate limit exceeded.
    RateLimited,
    /// The call did not complete within its deadline.
    Timeout,
    /// Context length exceeded.
    ContextExceeded,
    /// Invalid request parameters.
    InvalidRequest,
    /// Response could not be interpreted.
    ResponseFormat,
    /// Streaming error.
    Stream,
    /// Provider-specific error.
    Provider,
    /// Internal error.
    Internal,
    /// Feature not supported.
    NotSupported,
}

impl LlmError {
    const fn with_kind(kind: LlmErrorKind, message: String) -> Self {
        Self {
            kind,
            provider: None,
            message,
            code: None,
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Auth, message.into()).with_provider(provider)
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self::with_kind(
            LlmErrorKind::RateLimited,
            "Rate limit exceeded. Please retry after some time.".into(),
        )
        .with_provider(provider)
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Timeout, message.into())
    }

    /// Create a context exceeded error.
    #[must_use]
    pub fn context_exceeded(used: usize, max: usize) -> Self {
        Self::with_kind(
            LlmErrorKind::ContextExceeded,
            format!("Context length exceeded: used {used}, max {max}"),
        )
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::InvalidRequest, message.into())
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::with_kind(
            LlmErrorKind::ResponseFormat,
            format!("Expected {}, got {}", expected.into(), got.into()),
        )
    }

    /// Create a streaming error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Stream, message.into())
    }

    /// Create a provider-specific error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Provider, message.into()).with_provider(provider)
    }

    /// Create a provider error with an error code.
    #[must_use]
    pub fn provider_code(
        provider: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut err = Self::provider(provider, message);
        err.code = Some(code.into());
        err
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Internal, message.into())
    }

    /// Create a not supported error.
    #[must_use]
    pub fn not_supported(feature: impl Into<String>) -> Self {
        Self::with_kind(
            LlmErrorKind::NotSupported,
            format!("Feature not supported: {}", feature.into()),
        )
    }

    /// Attach the provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Check if this is a transient error that the model client retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, LlmErrorKind::RateLimited | LlmErrorKind::Timeout)
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmError {}

/// Error type for tool invocation failures.
///
/// Tool errors never abort a run by themselves: the invoker turns them into
/// a textual tool result so the model can react.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The tool body failed or panicked.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Arguments did not match the tool's parameter schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// No enabled tool with this name is visible to the agent.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Generic error.
    #[error("Tool error: {0}")]
    Other(String),
}

impl ToolError {
    /// Create an execution error.
    #[must_use]
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create an invalid arguments error.
    #[must_use]
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }
}

impl From<String> for ToolError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for ToolError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    mod error {
        use super::*;

        #[test]
        fn agent_creates_error() {
            let err = Error::agent("something went wrong");
            assert!(matches!(err, Error::Agent(_)));
            assert!(err.to_string().contains("something went wrong"));
        }

        #[test]
        fn max_turns_creates_error() {
            let err = Error::max_turns(10);
            assert!(matches!(err, Error::MaxTurnsExceeded { max_turns: 10 }));
            assert!(err.to_string().contains("10"));
        }

        #[test]
        fn guardrail_errors_are_tripwires() {
            let input = Error::input_guardrail("math", json!({"reason": "homework"}));
            let output = Error::output_guardrail("pii", Value::Null);
            assert!(input.is_guardrail_tripwire());
            assert!(output.is_guardrail_tripwire());
            assert!(input.to_string().contains("math"));
            assert!(!Error::max_turns(1).is_guardrail_tripwire());
        }

        #[test]
        fn schema_violation_display() {
            let err = Error::schema_violation("Recipe", "missing field `title`");
            assert!(err.to_string().contains("Recipe"));
            assert!(err.to_string().contains("title"));
        }

        #[test]
        fn handoff_payload_display() {
            let err = Error::handoff_payload("Billing", "expected object");
            assert!(err.to_string().contains("Billing"));
        }

        #[test]
        fn from_llm_error() {
            let err: Error = LlmError::timeout("slow").into();
            assert!(matches!(err, Error::Llm(_)));
            assert!(err.is_retryable());
        }

        #[test]
        fn from_tool_error() {
            let err: Error = ToolError::not_found("my_tool").into();
            assert!(matches!(err, Error::Tool(_)));
            assert!(!err.is_retryable());
        }

        #[test]
        fn from_json_error() {
            let json_err = serde_json::from_str::<i32>("invalid").unwrap_err();
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    mod llm_error {
        use super::*;

        #[test]
        fn rate_limited_creates_error() {
            let err = LlmError::rate_limited("mock");
            assert_eq!(err.kind, LlmErrorKind::RateLimited);
            assert_eq!(err.provider.as_deref(), Some("mock"));
            assert!(err.message.contains("Rate limit"));
        }

        #[test]
        fn retryable_kinds() {
            assert!(LlmError::rate_limited("mock").is_retryable());
            assert!(LlmError::timeout("deadline").is_retryable());
            assert!(!LlmError::auth("mock", "bad key").is_retryable());
            assert!(!LlmError::internal("bug").is_retryable());
            assert!(!LlmError::invalid_request("bad").is_retryable());
        }

        #[test]
        fn provider_code_creates_error() {
            let err = LlmError::provider_code("mock", "model_not_found", "no such model");
            assert_eq!(err.kind, LlmErrorKind::Provider);
            assert_eq!(err.code.as_deref(), Some("model_not_found"));
        }

        #[test]
        fn display_with_provider_and_code() {
            let err = LlmError::provider_code("mock", "E42", "boom");
            assert_eq!(err.to_string(), "[mock] boom (code: E42)");
        }

        #[test]
        fn display_without_provider() {
            let err = LlmError::internal("boom");
            assert_eq!(err.to_string(), "boom");
        }
    }

    mod tool_error {
        use super::*;

        #[test]
        fn constructors() {
            assert!(matches!(ToolError::execution("x"), ToolError::Execution(_)));
            assert!(matches!(
                ToolError::invalid_args("x"),
                ToolError::InvalidArguments(_)
            ));
            assert!(matches!(ToolError::not_found("x"), ToolError::NotFound(_)));
        }

        #[test]
        fn from_strings() {
            assert!(matches!(ToolError::from("x"), ToolError::Other(_)));
            assert!(matches!(
                ToolError::from(String::from("x")),
                ToolError::Other(_)
            ));
        }

        #[test]
        fn from_json_error_is_invalid_args() {
            let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
            assert!(matches!(
                ToolError::from(json_err),
                ToolError::InvalidArguments(_)
            ));
        }
    }
}
