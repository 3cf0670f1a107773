//! bronte - HTTP gateway between LLM wire protocols and a Copilot upstream.
//!
//! Clients speak one of three dialects: OpenAI `chat/completions`, Anthropic
//! `/v1/messages`, or OpenAI `/v1/responses`. The upstream natively speaks
//! either `chat/completions` or `responses`, depending on the model. This
//! crate exposes all three client surfaces and translates requests,
//! responses and SSE streams in both directions.
//!
//! Design goals:
//! - Accept traffic in any of the three dialects (including Claude Code).
//! - Route per model capability to the Responses or Chat Completions upstream.
//! - Preserve tool calls, images, reasoning blocks, usage counters and
//!   finish-reason semantics across the translation.
//! - Never abort a stream on malformed content: recover and keep going.

pub mod catalog;
pub mod dialect;
pub mod error;
pub mod server;
pub mod stream;
pub mod tokenizer;
pub mod translate;
pub mod upstream;

pub use error::GatewayError;
pub use server::serve;
