//! Scripted provider for tests and offline examples.
//!
//! [`MockProvider`] replays a queue of canned replies in order and records
//! every request it receives, so tests can assert on exactly what the run
//! loop sent. A responder closure can be installed instead of (or after) the
//! script to compute replies from the request.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_timer::Delay;
use serde_json::Value;

use crate::chat::{ChatProvider, ChatRequest, ChatResponse, ChunkStream};
use crate::error::{LlmError, Result};
use crate::message::{Message, ToolCall};
use crate::stream::chunks_from_response;
use crate::usage::Usage;

type Responder = Arc<dyn Fn(&ChatRequest) -> std::result::Result<ChatResponse, LlmError> + Send + Sync>;

/// A provider that returns scripted replies.
///
/// Replies are consumed front to back. Once the script is empty the
/// responder is used; without one the call fails with a provider error.
///
/// # Example
///
/// ```rust,ignore
/// use baton::providers::MockProvider;
/// use serde_json::json;
///
/// let provider = MockProvider::new()
///     .push_tool_call("get_weather", json!({"city": "Tokyo"}))
///     .push_text("It is sunny in Tokyo.");
/// ```
pub struct MockProvider {
    model: String,
    script: Mutex<VecDeque<std::result::Result<ChatResponse, LlmError>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
    streaming: bool,
    parallel_tool_calls: bool,
    latency: Option<Duration>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a provider with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_owned(),
            script: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            streaming: false,
            parallel_tool_calls: true,
            latency: None,
        }
    }

    /// Set the model identifier reported by the provider.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Queue a reply.
    #[must_use]
    pub fn push_response(self, response: ChatResponse) -> Self {
        self.enqueue(Ok(response));
        self
    }

    /// Queue a plain text reply.
    #[must_use]
    pub fn push_text(self, text: impl Into<String>) -> Self {
        let response = ChatResponse::from_text(text).with_usage(Usage::new(10, 5));
        self.push_response(response)
    }

    /// Queue a reply requesting a single tool call.
    #[must_use]
    pub fn push_tool_call(self, name: impl Into<String>, arguments: Value) -> Self {
        let call = ToolCall::from_value(name, &arguments);
        self.push_tool_calls(vec![call])
    }

    /// Queue a reply requesting several tool calls.
    #[must_use]
    pub fn push_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        let response =
            ChatResponse::new(Message::assistant_tool_calls(calls)).with_usage(Usage::new(10, 5));
        self.push_response(response)
    }

    /// Queue a failure.
    #[must_use]
    pub fn push_error(self, error: LlmError) -> Self {
        self.enqueue(Err(error));
        self
    }

    /// Compute replies from requests once the script is exhausted.
    #[must_use]
    pub fn responder<F>(mut self, f: F) -> Self
    where
        F: Fn(&ChatRequest) -> std::result::Result<ChatResponse, LlmError> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(f));
        self
    }

    /// Report native streaming support.
    #[must_use]
    pub const fn streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    /// Report support for concurrent tool calls.
    #[must_use]
    pub const fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    /// Delay every reply.
    #[must_use]
    pub const fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of scripted replies not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn enqueue(&self, item: std::result::Result<ChatResponse, LlmError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
    }

    async fn next_reply(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(latency) = self.latency {
            Delay::new(latency).await;
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let reply = match (scripted, &self.responder) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(request),
            (None, None) => Err(LlmError::provider("mock", "no scripted response left")),
        };
        reply
            .map(|r| {
                if r.model.is_none() {
                    r.with_model(self.model.clone())
                } else {
                    r
                }
            })
            .map_err(Into::into)
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.next_reply(request).await
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        if !self.streaming {
            return Err(LlmError::not_supported("streaming").with_provider("mock").into());
        }
        let response = self.next_reply(request).await?;
        let chunks = chunks_from_response(&response).into_iter().map(Ok);
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn supports_parallel_tool_calls(&self) -> bool {
        self.parallel_tool_calls
    }
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("model", &self.model)
            .field("remaining", &self.remaining())
            .field("calls", &self.call_count())
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    use crate::error::{Error, LlmErrorKind};

    #[tokio::test]
    async fn replays_script_in_order() {
        let provider = MockProvider::new().push_text("first").push_text("second");
        let request = ChatRequest::new("m").user("hi");
        let r1 = provider.chat(&request).await.unwrap();
        let r2 = provider.chat(&request).await.unwrap();
        assert_eq!(r1.text(), Some("first"));
        assert_eq!(r2.text(), Some("second"));
        assert_eq!(r1.model.as_deref(), Some("mock-model"));
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_script_fails() {
        let provider = MockProvider::new();
        let err = provider.chat(&ChatRequest::new("m")).await.unwrap_err();
        assert!(matches!(err, Error::Llm(ref e) if e.kind == LlmErrorKind::Provider));
    }

    #[tokio::test]
    async fn responder_sees_request() {
        let provider = MockProvider::new().responder(|req| {
            Ok(ChatResponse::from_text(format!(
                "echo: {}",
                req.last_user_text().unwrap_or_default()
            )))
        });
        let reply = provider
            .chat(&ChatRequest::new("m").user("ping"))
            .await
            .unwrap();
        assert_eq!(reply.text(), Some("echo: ping"));
    }

    #[tokio::test]
    async fn records_requests() {
        let provider = MockProvider::new().push_tool_call("add", json!({"a": 1}));
        let reply = provider
            .chat(&ChatRequest::new("m").instructions("be brief"))
            .await
            .unwrap();
        assert_eq!(reply.message.tool_calls[0].name, "add");
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].instructions.as_deref(), Some("be brief"));
    }

    #[tokio::test]
    async fn streams_when_enabled() {
        let provider = MockProvider::new().streaming(true).push_text("a b c");
        let stream = provider.chat_stream(&ChatRequest::new("m")).await.unwrap();
        let chunks: Vec<_> = stream.collect().await;
        let text: String = chunks
            .iter()
            .filter_map(|c| c.as_ref().ok().and_then(|c| c.as_text().map(str::to_owned)))
            .collect();
        assert_eq!(text, "a b c");
    }

    #[tokio::test]
    async fn stream_refused_when_disabled() {
        let provider = MockProvider::new().push_text("x");
        assert!(provider.chat_stream(&ChatRequest::new("m")).await.is_err());
        assert_eq!(provider.remaining(), 1);
    }
}
