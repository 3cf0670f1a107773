//! Request and response translation between dialects.
//!
//! Request direction (client dialect -> upstream dialect):
//! - [`anthropic_to_chat`], [`anthropic_to_responses`], [`chat_to_responses`]
//!
//! Response direction (upstream dialect -> client dialect, non-streaming):
//! - [`chat_to_anthropic`], [`responses_to_anthropic`], [`responses_to_chat`]
//!
//! All functions are pure; streaming translation lives in [`crate::stream`].

pub mod anthropic_to_chat;
pub mod anthropic_to_responses;
pub mod arguments;
pub mod chat_to_anthropic;
pub mod chat_to_responses;
pub mod model;
pub mod responses_to_anthropic;
pub mod responses_to_chat;
