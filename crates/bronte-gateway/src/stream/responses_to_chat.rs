//! Responses event stream -> Chat Completions chunks.
//!
//! Much simpler than the Anthropic direction: chunks carry deltas without a
//! block lifecycle, so most events map one-to-one. Reasoning deltas go out
//! under `reasoning_content`, the field name chat clients actually read.

use crate::stream::sse;
use anyhow::Result;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tracing::warn;

/// Per-stream state for the chunk mapper.
#[derive(Debug)]
pub struct ResponsesChatState {
    requested_model: String,
    response_id: Option<String>,
    model: Option<String>,
    completed: bool,
    failed: bool,
}

impl ResponsesChatState {
    pub fn new(requested_model: impl Into<String>) -> Self {
        Self {
            requested_model: requested_model.into(),
            response_id: None,
            model: None,
            completed: false,
            failed: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Translate one upstream event into zero or one chunk.
    pub fn handle_event(&mut self, raw: &Value) -> Option<Value> {
        let kind = raw.get("type").and_then(|v| v.as_str())?;

        match kind {
            "response.created" => {
                if let Some(response) = raw.get("response") {
                    self.response_id = response
                        .get("id")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string());
                    self.model = response
                        .get("model")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string());
                }
                None
            }
            "response.output_text.delta" => {
                let delta = raw.get("delta").and_then(|v| v.as_str())?;
                Some(self.chunk(json!({"content": delta}), None))
            }
            "response.reasoning_summary_text.delta" => {
                let delta = raw.get("delta").and_then(|v| v.as_str())?;
                Some(self.chunk(json!({"reasoning_content": delta}), None))
            }
            "response.output_item.added" => {
                let item = raw.get("item")?;
                if item.get("type").and_then(|v| v.as_str()) != Some("function_call") {
                    return None;
                }
                let id = item
                    .get("call_id")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .or_else(|| item.get("id").and_then(|v| v.as_str()))
                    .unwrap_or_default();
                let name = item.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                Some(self.chunk(
                    json!({"tool_calls": [{
                        "index": 0,
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": ""}
                    }]}),
                    None,
                ))
            }
            "response.function_call_arguments.delta" => {
                let delta = raw.get("delta").and_then(|v| v.as_str())?;
                Some(self.chunk(
                    json!({"tool_calls": [{
                        "index": 0,
                        "function": {"arguments": delta}
                    }]}),
                    None,
                ))
            }
            "response.completed" | "response.incomplete" => {
                self.completed = true;
                let usage = raw
                    .get("response")
                    .and_then(|r| r.get("usage"))
                    .map(|u| {
                        let input = u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
                        let output = u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
                        json!({
                            "prompt_tokens": input,
                            "completion_tokens": output,
                            "total_tokens": input + output,
                        })
                    });
                let mut chunk = self.chunk(json!({}), Some("stop"));
                if let Some(usage) = usage {
                    chunk["usage"] = usage;
                }
                Some(chunk)
            }
            "response.failed" | "error" => {
                // Chat clients get no synthetic chunks on failure; the stream
                // simply ends.
                self.completed = true;
                self.failed = true;
                None
            }
            _ => None,
        }
    }

    fn chunk(&self, delta: Value, finish_reason: Option<&str>) -> Value {
        json!({
            "id": self.response_id.as_deref().unwrap_or("chatcmpl-unknown"),
            "object": "chat.completion.chunk",
            "model": self.model.as_deref().unwrap_or(&self.requested_model),
            "choices": [{
                "index": 0,
                "delta": delta,
                "finish_reason": finish_reason,
            }],
        })
    }
}

/// Drive an upstream Responses SSE body and yield Chat Completions SSE
/// frames terminated by `data: [DONE]`.
pub fn sse_stream(
    response: reqwest::Response,
    requested_model: String,
) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut state = ResponsesChatState::new(requested_model);
        let mut buffer = String::new();
        let mut upstream = response.bytes_stream();

        'read: while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some((frame, rest)) = sse::split_frame(&buffer) {
                        buffer = rest;
                        let Some(data) = sse::extract_data(&frame) else {
                            continue;
                        };
                        if data.trim().is_empty() || data.trim() == "[DONE]" {
                            continue;
                        }
                        match serde_json::from_str::<Value>(&data) {
                            Ok(event) => {
                                if let Some(chunk) = state.handle_event(&event) {
                                    yield sse::chat_frame(&chunk);
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "skipping unparseable Responses event");
                            }
                        }
                    }
                    if state.is_complete() {
                        break 'read;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "upstream stream error, ending chat stream");
                    state.completed = true;
                    state.failed = true;
                    break 'read;
                }
            }
        }

        if !state.is_failed() {
            yield sse::DONE_FRAME.to_string();
        }
    }
}
