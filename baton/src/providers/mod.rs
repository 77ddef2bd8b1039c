//! Model backends.
//!
//! Real backends implement [`ChatProvider`](crate::chat::ChatProvider) out of
//! tree; this crate ships a scripted [`MockProvider`] for tests and examples.

mod mock;

pub use mock::MockProvider;
