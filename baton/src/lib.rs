//! Baton - a minimal local agent orchestration runtime
//!
//! Agents call a chat model, invoke typed tools, hand control to one another,
//! and are checked by guardrails before and after they run. Runs can be
//! awaited to completion or consumed as a stream of events.
//!
//! The model backend is a trait ([`chat::ChatProvider`]); the crate ships a
//! scripted [`providers::MockProvider`] for tests and demos.

pub mod agent;
pub mod callback;
pub mod chat;
pub mod error;
pub mod guardrail;
pub mod handoff;
pub mod message;
pub mod model;
pub mod prelude;
pub mod providers;
pub mod schema;
pub mod stream;
pub mod tool;
pub mod usage;

pub use error::{Error, LlmError, LlmErrorKind, Result, ToolError};
