//! Incremental model output.
//!
//! Providers that support streaming emit [`StreamChunk`]s; the run loop
//! folds them back into a complete [`ChatResponse`] with a
//! [`StreamAggregator`]. Providers that cannot stream are adapted with
//! [`chunks_from_response`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chat::ChatResponse;
use crate::message::{Message, ToolCall};
use crate::usage::Usage;

/// A chunk of streaming output from a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum StreamChunk {
    /// Text content chunk.
    Text {
        /// The text fragment.
        delta: String,
    },

    /// Start of a tool call.
    ToolUseStart {
        /// Index of this tool call in the response.
        index: usize,
        /// Unique identifier for this tool call.
        id: String,
        /// Name of the tool being called.
        name: String,
    },

    /// Partial arguments for an in-progress tool call.
    ToolUseDelta {
        /// Index of the tool call being updated.
        index: usize,
        /// Partial JSON arguments.
        partial_json: String,
    },

    /// Token usage information.
    Usage(Usage),

    /// Stream is complete.
    Done,
}

impl StreamChunk {
    /// Creates a text chunk.
    #[must_use]
    pub fn text(delta: impl Into<String>) -> Self {
        Self::Text {
            delta: delta.into(),
        }
    }

    /// Returns the text fragment if this is a text chunk.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { delta } => Some(delta),
            _ => None,
        }
    }
}

/// Aggregator for building a complete response from stream chunks.
#[derive(Debug, Clone, Default)]
pub struct StreamAggregator {
    text: String,
    tool_calls: BTreeMap<usize, ToolCall>,
    usage: Option<Usage>,
    done: bool,
}

impl StreamAggregator {
    /// Creates a new aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a stream chunk to the aggregator.
    pub fn apply(&mut self, chunk: &StreamChunk) {
        match chunk {
            StreamChunk::Text { delta } => self.text.push_str(delta),
            StreamChunk::ToolUseStart { index, id, name } => {
                self.tool_calls
                    .insert(*index, ToolCall::new(id.as_str(), name.as_str(), ""));
            }
            StreamChunk::ToolUseDelta {
                index,
                partial_json,
            } => {
                if let Some(tc) = self.tool_calls.get_mut(index) {
                    tc.arguments.push_str(partial_json);
                }
            }
            StreamChunk::Usage(usage) => self.usage = Some(*usage),
            StreamChunk::Done => self.done = true,
        }
    }

    /// Returns the current accumulated text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns `true` once a [`StreamChunk::Done`] chunk was applied.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Converts the accumulated chunks into a [`ChatResponse`].
    #[must_use]
    pub fn into_chat_response(self) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = self.tool_calls.into_values().collect();
        let message = if tool_calls.is_empty() {
            Message::assistant(self.text)
        } else {
            let mut msg = Message::assistant_tool_calls(tool_calls);
            if !self.text.is_empty() {
                msg.content = Some(self.text);
            }
            msg
        };
        let response = ChatResponse::new(message);
        match self.usage {
            Some(usage) => response.with_usage(usage),
            None => response,
        }
    }
}

/// Splits a complete response into the chunk sequence a streaming provider
/// would have produced.
///
/// Text is emitted word by word (whitespace kept attached to the preceding
/// word) so consumers observe several deltas.
#[must_use]
pub fn chunks_from_response(response: &ChatResponse) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    if let Some(text) = response.message.text() {
        chunks.extend(text.split_inclusive(' ').map(StreamChunk::text));
    }
    for (index, call) in response.message.tool_calls.iter().enumerate() {
        chunks.push(StreamChunk::ToolUseStart {
            index,
            id: call.id.clone(),
            name: call.name.clone(),
        });
        chunks.push(StreamChunk::ToolUseDelta {
            index,
            partial_json: call.arguments.clone(),
        });
    }
    if !response.usage.is_empty() {
        chunks.push(StreamChunk::Usage(response.usage));
    }
    chunks.push(StreamChunk::Done);
    chunks
}
