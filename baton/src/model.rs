//! Model client adapter.
//!
//! [`ModelClient`] sits between the run loop and a [`ChatProvider`]. It
//! retries transient failures with exponential backoff, enforces an optional
//! per-call deadline, and classifies each reply into a [`ModelResponse`] the
//! run loop can branch on.

use std::future::Future;
use std::pin::pin;
use std::time::{Duration, Instant};

use futures::StreamExt as _;
use futures::future::{self, Either};
use futures_timer::Delay;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::chat::{ChatRequest, ChatResponse, ChunkStream, ResponseFormat, SharedChatProvider};
use crate::error::{LlmError, Result};
use crate::message::ToolCall;
use crate::stream::chunks_from_response;

/// The final answer of a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalOutput {
    /// Free-form text.
    Text(String),
    /// JSON requested through a structured response format.
    Structured(Value),
}

impl FinalOutput {
    /// Convert to a JSON value; text becomes a JSON string.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Structured(value) => value.clone(),
        }
    }
}

/// What the model asked the runtime to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelResponse {
    /// The model produced its answer.
    FinalMessage(FinalOutput),
    /// The model requested one or more tool calls, in order.
    ToolCalls(Vec<ToolCall>),
    /// The model called a handoff tool.
    HandoffRequested {
        /// Name of the agent to transfer to.
        target_agent: String,
        /// Parsed handoff arguments, when they are valid JSON.
        payload: Option<Value>,
        /// The handoff tool call itself.
        call: ToolCall,
        /// Other calls in the same reply; they are answered but not executed.
        ignored_calls: Vec<ToolCall>,
    },
}

impl ModelResponse {
    /// Classify a raw reply.
    ///
    /// A call to a handoff tool wins over ordinary tool calls; only the first
    /// handoff in a reply is honoured.
    #[must_use]
    pub fn classify(request: &ChatRequest, response: &ChatResponse) -> Self {
        let calls = &response.message.tool_calls;
        if calls.is_empty() {
            let text = response.message.text().unwrap_or_default().to_owned();
            return Self::FinalMessage(classify_final(request, text));
        }

        let handoff = calls
            .iter()
            .enumerate()
            .find_map(|(i, c)| request.handoff_target(&c.name).map(|t| (i, t)));
        match handoff {
            Some((index, target)) => {
                let call = calls[index].clone();
                let payload = call.parse_arguments().ok();
                let ignored_calls = calls
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .map(|(_, c)| c.clone())
                    .collect();
                Self::HandoffRequested {
                    target_agent: target.to_owned(),
                    payload,
                    call,
                    ignored_calls,
                }
            }
            None => Self::ToolCalls(calls.clone()),
        }
    }
}

fn classify_final(request: &ChatRequest, text: String) -> FinalOutput {
    if matches!(request.response_format, Some(ResponseFormat::JsonSchema { .. })) {
        if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
            return FinalOutput::Structured(value);
        }
    }
    FinalOutput::Text(text)
}

/// A classified reply together with the raw backend response.
#[derive(Debug, Clone)]
pub struct ModelReply {
    /// What the model asked for.
    pub response: ModelResponse,
    /// The raw reply, kept for history, usage and hooks.
    pub raw: ChatResponse,
}

impl ModelReply {
    /// Classify `raw` in the context of `request`.
    #[must_use]
    pub fn new(request: &ChatRequest, raw: ChatResponse) -> Self {
        Self {
            response: ModelResponse::classify(request, &raw),
            raw,
        }
    }
}

/// Retry policy for transient model failures.
///
/// Only errors whose kind is transient ([`LlmError::is_retryable`]) are
/// retried. The delay before retry `n` (1-based) is
/// `initial_delay_ms * backoff_multiplier^(n-1)`, capped at `max_delay_ms`,
/// scaled into `[50%, 100%]` when jitter is on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Whether to randomize delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the total number of attempts.
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        let scaled = if self.jitter {
            capped * fastrand::f64().mul_add(0.5, 0.5)
        } else {
            capped
        };
        Duration::from_millis(scaled as u64)
    }
}

/// Provider wrapper that adds retries, timeouts and classification.
#[derive(Clone)]
pub struct ModelClient {
    provider: SharedChatProvider,
    retry: RetryPolicy,
    timeout: Option<Duration>,
}

impl ModelClient {
    /// Wrap a provider with the default retry policy and no timeout.
    #[must_use]
    pub fn new(provider: SharedChatProvider) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            timeout: None,
        }
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-call deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The wrapped provider.
    #[must_use]
    pub const fn provider(&self) -> &SharedChatProvider {
        &self.provider
    }

    /// Send a request and classify the reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Llm`](crate::Error::Llm) once retries are exhausted
    /// or on the first non-transient failure.
    pub async fn send(&self, request: &ChatRequest) -> Result<ModelReply> {
        let raw = self.chat_with_retry(request).await?;
        Ok(ModelReply::new(request, raw))
    }

    /// Open a chunk stream for a request.
    ///
    /// Opening the stream is retried like [`send`](Self::send); failures after
    /// the first chunk are passed through. Providers that cannot stream are
    /// called once and their reply is replayed as chunks.
    ///
    /// The per-call deadline covers the whole call, from opening the stream
    /// to its last chunk. A stream still open when it expires yields a
    /// timeout error and ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Llm`](crate::Error::Llm) if the stream cannot be opened.
    pub async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        if !self.provider.supports_streaming() {
            let raw = self.chat_with_retry(request).await?;
            let chunks = chunks_from_response(&raw).into_iter().map(Ok);
            return Ok(Box::pin(futures::stream::iter(chunks)));
        }
        let mut request = request.clone();
        request.stream = true;
        let (provider, request) = (&self.provider, &request);
        let (chunks, started) = self
            .retrying(|| async move {
                let started = Instant::now();
                let chunks = provider.chat_stream(request).await?;
                Ok::<_, crate::Error>((chunks, started))
            })
            .await?;
        Ok(match self.timeout {
            Some(limit) => self.bounded(chunks, limit, limit.saturating_sub(started.elapsed())),
            None => chunks,
        })
    }

    /// End `chunks` with a timeout error once `remaining` has elapsed.
    // `tail_expr_drop_order` fires inside the `stream!` expansion.
    #[allow(tail_expr_drop_order)]
    fn bounded(&self, mut chunks: ChunkStream, limit: Duration, remaining: Duration) -> ChunkStream {
        let provider = self.provider.provider_name();
        Box::pin(async_stream::stream! {
            let mut timer = Delay::new(remaining);
            loop {
                match future::select(chunks.next(), &mut timer).await {
                    Either::Left((Some(chunk), _)) => yield chunk,
                    Either::Left((None, _)) => break,
                    Either::Right(((), _)) => {
                        yield Err(LlmError::timeout(format!(
                            "model stream exceeded {}ms",
                            limit.as_millis()
                        ))
                        .with_provider(provider)
                        .into());
                        break;
                    }
                }
            }
        })
    }

    async fn chat_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.retrying(|| self.provider.chat(request)).await
    }

    async fn retrying<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let provider = self.provider.provider_name();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.deadline(op()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        provider,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient model error, retrying"
                    );
                    Delay::new(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn deadline<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let Some(limit) = self.timeout else {
            return call.await;
        };
        match future::select(pin!(call), Delay::new(limit)).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => Err(LlmError::timeout(format!(
                "model call exceeded {}ms",
                limit.as_millis()
            ))
            .with_provider(self.provider.provider_name())
            .into()),
        }
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("provider", &self.provider.provider_name())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures::StreamExt;
    use serde_json::json;

    use crate::error::{Error, LlmErrorKind};
    use crate::message::Message;
    use crate::providers::MockProvider;
    use crate::stream::{StreamAggregator, StreamChunk};
    use crate::tool::ToolDefinition;

    /// Streams one chunk, then never finishes.
    struct StallingProvider;

    #[async_trait::async_trait]
    impl crate::chat::ChatProvider for StallingProvider {
        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse::from_text("unused"))
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> Result<ChunkStream> {
            let head = futures::stream::iter([Ok::<_, Error>(StreamChunk::text("partial"))]);
            Ok(Box::pin(head.chain(futures::stream::pending())))
        }

        fn provider_name(&self) -> &'static str {
            "stalling"
        }

        fn default_model(&self) -> &str {
            "stalling-1"
        }

        fn supports_streaming(&self) -> bool {
            true
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default()
            .initial_delay(Duration::from_millis(1))
            .jitter(false)
    }

    mod classification {
        use super::*;

        #[test]
        fn text_is_final() {
            let request = ChatRequest::new("m");
            let response = ChatResponse::from_text("hello");
            assert_eq!(
                ModelResponse::classify(&request, &response),
                ModelResponse::FinalMessage(FinalOutput::Text("hello".into()))
            );
        }

        #[test]
        fn json_with_schema_format_is_structured() {
            let request = ChatRequest::new("m")
                .response_format(ResponseFormat::json_schema("X", json!({}), true));
            let response = ChatResponse::from_text(r#"{"a": 1}"#);
            assert_eq!(
                ModelResponse::classify(&request, &response),
                ModelResponse::FinalMessage(FinalOutput::Structured(json!({"a": 1})))
            );
        }

        #[test]
        fn prose_with_schema_format_stays_text() {
            let request = ChatRequest::new("m")
                .response_format(ResponseFormat::json_schema("X", json!({}), true));
            let response = ChatResponse::from_text("sorry, no JSON");
            assert!(matches!(
                ModelResponse::classify(&request, &response),
                ModelResponse::FinalMessage(FinalOutput::Text(_))
            ));
        }

        #[test]
        fn tool_calls_keep_order() {
            let request = ChatRequest::new("m");
            let response = ChatResponse::new(Message::assistant_tool_calls(vec![
                ToolCall::new("1", "a", "{}"),
                ToolCall::new("2", "b", "{}"),
            ]));
            match ModelResponse::classify(&request, &response) {
                ModelResponse::ToolCalls(calls) => {
                    assert_eq!(calls[0].name, "a");
                    assert_eq!(calls[1].name, "b");
                }
                other => panic!("unexpected: {other:?}"),
            }
        }

        #[test]
        fn handoff_wins_over_tools() {
            let request = ChatRequest::new("m").handoff(
                ToolDefinition::new("transfer_to_billing", "", json!({})),
                "Billing",
            );
            let response = ChatResponse::new(Message::assistant_tool_calls(vec![
                ToolCall::new("1", "lookup", "{}"),
                ToolCall::new("2", "transfer_to_billing", r#"{"reason":"refund"}"#),
            ]));
            match ModelResponse::classify(&request, &response) {
                ModelResponse::HandoffRequested {
                    target_agent,
                    payload,
                    call,
                    ignored_calls,
                } => {
                    assert_eq!(target_agent, "Billing");
                    assert_eq!(payload, Some(json!({"reason": "refund"})));
                    assert_eq!(call.id, "2");
                    assert_eq!(ignored_calls.len(), 1);
                    assert_eq!(ignored_calls[0].name, "lookup");
                }
                other => panic!("unexpected: {other:?}"),
            }
        }

        #[test]
        fn final_output_to_value() {
            assert_eq!(FinalOutput::Text("x".into()).to_value(), json!("x"));
            assert_eq!(FinalOutput::Structured(json!([1])).to_value(), json!([1]));
        }
    }

    mod retry_policy {
        use super::*;

        #[test]
        fn exponential_without_jitter() {
            let policy = RetryPolicy {
                initial_delay_ms: 100,
                backoff_multiplier: 2.0,
                max_delay_ms: 1000,
                jitter: false,
                max_attempts: 5,
            };
            assert_eq!(policy.delay_for(1), Duration::from_millis(100));
            assert_eq!(policy.delay_for(2), Duration::from_millis(200));
            assert_eq!(policy.delay_for(3), Duration::from_millis(400));
            assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        }

        #[test]
        fn jitter_stays_in_range() {
            let policy = RetryPolicy {
                initial_delay_ms: 100,
                jitter: true,
                ..RetryPolicy::default()
            };
            for _ in 0..100 {
                let delay = policy.delay_for(1);
                assert!(delay >= Duration::from_millis(50));
                assert!(delay <= Duration::from_millis(100));
            }
        }

        #[test]
        fn deserializes_with_defaults() {
            let policy: RetryPolicy = serde_json::from_value(json!({"max_attempts": 5})).unwrap();
            assert_eq!(policy.max_attempts, 5);
            assert_eq!(policy.initial_delay_ms, 500);
            assert_eq!(RetryPolicy::none().max_attempts, 1);
        }
    }

    mod client {
        use super::*;

        #[tokio::test]
        async fn retries_rate_limits_then_succeeds() {
            let provider = Arc::new(
                MockProvider::new()
                    .push_error(LlmError::rate_limited("mock"))
                    .push_error(LlmError::timeout("slow"))
                    .push_text("finally"),
            );
            let client = ModelClient::new(provider.clone()).with_retry(fast_retry());
            let reply = client.send(&ChatRequest::new("m")).await.unwrap();
            assert_eq!(reply.raw.text(), Some("finally"));
            assert_eq!(provider.call_count(), 3);
        }

        #[tokio::test]
        async fn gives_up_after_max_attempts() {
            let provider = Arc::new(
                MockProvider::new()
                    .push_error(LlmError::rate_limited("mock"))
                    .push_error(LlmError::rate_limited("mock"))
                    .push_error(LlmError::rate_limited("mock"))
                    .push_text("never"),
            );
            let client = ModelClient::new(provider.clone()).with_retry(fast_retry());
            let err = client.send(&ChatRequest::new("m")).await.unwrap_err();
            assert!(matches!(err, Error::Llm(ref e) if e.kind == LlmErrorKind::RateLimited));
            assert_eq!(provider.call_count(), 3);
        }

        #[tokio::test]
        async fn non_transient_errors_are_not_retried() {
            let provider = Arc::new(
                MockProvider::new()
                    .push_error(LlmError::auth("mock", "bad key"))
                    .push_text("unreachable"),
            );
            let client = ModelClient::new(provider.clone()).with_retry(fast_retry());
            assert!(client.send(&ChatRequest::new("m")).await.is_err());
            assert_eq!(provider.call_count(), 1);
        }

        #[tokio::test]
        async fn slow_calls_time_out() {
            let provider = Arc::new(
                MockProvider::new()
                    .latency(Duration::from_millis(200))
                    .push_text("late"),
            );
            let client = ModelClient::new(provider)
                .with_retry(RetryPolicy::none())
                .with_timeout(Some(Duration::from_millis(10)));
            let err = client.send(&ChatRequest::new("m")).await.unwrap_err();
            assert!(matches!(err, Error::Llm(ref e) if e.kind == LlmErrorKind::Timeout));
        }

        #[tokio::test]
        async fn stream_falls_back_to_synthesized_chunks() {
            let provider = Arc::new(MockProvider::new().push_text("one two three"));
            let client = ModelClient::new(provider);
            let mut stream = client.stream(&ChatRequest::new("m")).await.unwrap();
            let mut agg = StreamAggregator::new();
            let mut deltas = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.unwrap();
                if chunk.as_text().is_some() {
                    deltas += 1;
                }
                agg.apply(&chunk);
            }
            assert_eq!(deltas, 3);
            assert_eq!(agg.text(), "one two three");
        }

        #[tokio::test]
        async fn stalled_stream_hits_the_deadline() {
            let client = ModelClient::new(Arc::new(StallingProvider))
                .with_retry(RetryPolicy::none())
                .with_timeout(Some(Duration::from_millis(20)));
            let mut stream = client.stream(&ChatRequest::new("m")).await.unwrap();

            let first = stream.next().await.unwrap().unwrap();
            assert_eq!(first.as_text(), Some("partial"));

            let second = tokio::time::timeout(Duration::from_secs(2), stream.next())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(second, Err(Error::Llm(ref e)) if e.kind == LlmErrorKind::Timeout));
            assert!(stream.next().await.is_none());
        }

        #[tokio::test]
        async fn native_stream_is_used_when_supported() {
            let provider = Arc::new(MockProvider::new().streaming(true).push_text("a b"));
            let client = ModelClient::new(provider.clone());
            let stream = client.stream(&ChatRequest::new("m")).await.unwrap();
            let chunks: Vec<_> = stream.collect().await;
            assert!(chunks.iter().all(Result::is_ok));
            assert!(provider.requests()[0].stream);
        }
    }
}
