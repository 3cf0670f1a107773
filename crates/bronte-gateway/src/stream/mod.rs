//! Streaming translation (SSE).
//!
//! Each submodule owns one upstream/client pairing:
//! - [`responses_to_anthropic`]: Responses events -> Anthropic SSE
//! - [`responses_to_chat`]: Responses events -> Chat Completions chunks
//! - [`chat_to_anthropic`]: Chat Completions chunks -> Anthropic SSE
//!
//! Chat-Completions-upstream to Chat-Completions-client streams pass through
//! untranslated at the handler level.
//!
//! The translators are single-consumer state machines: state is created when
//! the stream opens, mutated only by the generator driving the upstream
//! response, and dropped on close. Back-pressure flows through the stream
//! pipeline naturally; a slow client stalls the upstream read.

pub mod chat_to_anthropic;
pub mod responses_to_anthropic;
pub mod responses_to_chat;
pub mod sse;
