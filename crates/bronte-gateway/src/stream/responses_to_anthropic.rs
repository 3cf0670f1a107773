//! Responses event stream -> Anthropic SSE.
//!
//! The upstream emits typed events (`response.output_text.delta`,
//! `response.function_call_arguments.delta`, ...) that must be reshaped into
//! Anthropic's content-block lifecycle: `content_block_start` precedes any
//! delta for an index, every opened block is stopped, and `message_delta` /
//! `message_stop` terminate the stream.
//!
//! Events are handled as generic JSON: the same event may carry
//! `output_index` or only `item_id`, and unknown event types must be ignored,
//! so typed deserialization would buy little here.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::dialect::anthropic::{
    ContentBlock, ContentDelta, MessageDelta, MessagesResponse, Role, StreamEvent, StreamError,
    Usage,
};
use crate::dialect::responses::{IncompleteDetails, ResponsesUsage};
use crate::stream::sse;
use crate::translate::responses_to_anthropic::stop_reason_from_status;
use anyhow::Result;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-stream translation state. Created on stream open, driven by a single
/// consumer, dropped on close.
#[derive(Debug)]
pub struct ResponsesAnthropicState {
    requested_model: String,

    message_start_sent: bool,
    message_completed: bool,

    /// Next client-facing block index; assigned first-touch-wins.
    next_block_index: usize,
    /// `(output_index, content_index)` -> client block index.
    block_index_by_key: HashMap<(u64, u64), usize>,
    open_blocks: BTreeSet<usize>,
    block_has_delta: HashSet<usize>,

    response_id: Option<String>,
    model: Option<String>,
    initial_input_tokens: u64,
    initial_cached_tokens: Option<u64>,

    /// Active function-call blocks keyed by `output_index`.
    function_calls: HashMap<u64, FunctionCallState>,
    /// Resolves events that carry only `item_id` back to an `output_index`.
    output_index_by_item_id: HashMap<String, u64>,
}

#[derive(Debug)]
struct FunctionCallState {
    block_index: usize,
    tool_call_id: String,
    name: String,
}

impl ResponsesAnthropicState {
    pub fn new(requested_model: impl Into<String>) -> Self {
        Self {
            requested_model: requested_model.into(),
            message_start_sent: false,
            message_completed: false,
            next_block_index: 0,
            block_index_by_key: HashMap::new(),
            open_blocks: BTreeSet::new(),
            block_has_delta: HashSet::new(),
            response_id: None,
            model: None,
            initial_input_tokens: 0,
            initial_cached_tokens: None,
            function_calls: HashMap::new(),
            output_index_by_item_id: HashMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.message_completed
    }

    /// Translate one upstream event into zero or more client events.
    pub fn handle_event(&mut self, raw: &Value) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        let Some(kind) = raw.get("type").and_then(|v| v.as_str()) else {
            return out;
        };

        match kind {
            "response.created" => {
                self.cache_response_metadata(raw.get("response"));
                self.ensure_message_start(&mut out);
            }
            "response.output_item.added" => self.on_output_item_added(raw, &mut out),
            "response.output_item.done" => self.on_output_item_done(raw, &mut out),
            "response.output_text.delta" => self.on_text_delta(raw, &mut out),
            "response.output_text.done" => self.on_text_done(raw, &mut out),
            "response.reasoning_summary_text.delta" => self.on_thinking_delta(raw, &mut out),
            "response.reasoning_summary_part.done" => self.on_thinking_part_done(raw, &mut out),
            "response.function_call_arguments.delta" => self.on_arguments_delta(raw, &mut out),
            "response.function_call_arguments.done" => self.on_arguments_done(raw, &mut out),
            "response.completed" | "response.incomplete" => self.on_terminal(raw, &mut out),
            "response.failed" => self.on_failed(raw, &mut out),
            "error" => {
                self.ensure_message_start(&mut out);
                out.push(StreamEvent::Error {
                    error: StreamError::api_error(error_message(
                        raw,
                        "Responses stream reported an error",
                    )),
                });
                self.message_completed = true;
            }
            other => debug!(event = other, "ignoring unknown Responses event"),
        }

        out
    }

    /// Terminal events for a stream that ended without completion.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if !self.message_completed {
            self.ensure_message_start(&mut out);
            out.push(StreamEvent::Error {
                error: StreamError::api_error("Responses stream ended without completion"),
            });
            self.message_completed = true;
        }
        out
    }

    /// Terminal events for a transport-level failure.
    pub fn transport_error(&mut self, message: impl Into<String>) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if !self.message_completed {
            self.ensure_message_start(&mut out);
            out.push(StreamEvent::Error {
                error: StreamError::api_error(message),
            });
            self.message_completed = true;
        }
        out
    }

    fn cache_response_metadata(&mut self, response: Option<&Value>) {
        let Some(response) = response else { return };
        if let Some(id) = response.get("id").and_then(|v| v.as_str()) {
            self.response_id = Some(id.to_string());
        }
        if let Some(model) = response.get("model").and_then(|v| v.as_str()) {
            self.model = Some(model.to_string());
        }
        if let Some(usage) = response.get("usage") {
            if let Some(input) = usage.get("input_tokens").and_then(|v| v.as_u64()) {
                self.initial_input_tokens = input;
            }
            self.initial_cached_tokens = usage
                .get("input_tokens_details")
                .and_then(|d| d.get("cached_tokens"))
                .and_then(|v| v.as_u64());
        }
    }

    fn ensure_message_start(&mut self, out: &mut Vec<StreamEvent>) {
        if self.message_start_sent {
            return;
        }
        self.message_start_sent = true;

        let cached = self.initial_cached_tokens;
        out.push(StreamEvent::MessageStart {
            message: MessagesResponse {
                id: self
                    .response_id
                    .clone()
                    .unwrap_or_else(|| format!("msg_{}", Uuid::new_v4())),
                kind: "message".to_string(),
                role: Role::Assistant,
                content: vec![],
                model: self
                    .model
                    .clone()
                    .unwrap_or_else(|| self.requested_model.clone()),
                stop_reason: None,
                stop_sequence: None,
                usage: Usage {
                    input_tokens: self
                        .initial_input_tokens
                        .saturating_sub(cached.unwrap_or(0)),
                    output_tokens: 0,
                    cache_read_input_tokens: None,
                    cache_creation_input_tokens: cached,
                },
            },
        });
    }

    /// First-touch block allocation for a `(output_index, content_index)` key.
    fn open_keyed_block(
        &mut self,
        key: (u64, u64),
        make_block: impl FnOnce() -> ContentBlock,
        out: &mut Vec<StreamEvent>,
    ) -> usize {
        if let Some(&index) = self.block_index_by_key.get(&key) {
            if !self.open_blocks.contains(&index) {
                self.open_blocks.insert(index);
                out.push(StreamEvent::ContentBlockStart {
                    index,
                    content_block: make_block(),
                });
            }
            return index;
        }
        let index = self.next_block_index;
        self.next_block_index += 1;
        self.block_index_by_key.insert(key, index);
        self.open_blocks.insert(index);
        out.push(StreamEvent::ContentBlockStart {
            index,
            content_block: make_block(),
        });
        index
    }

    fn close_block(&mut self, index: usize, out: &mut Vec<StreamEvent>) {
        if self.open_blocks.remove(&index) {
            out.push(StreamEvent::ContentBlockStop { index });
        }
    }

    fn close_all_open(&mut self, out: &mut Vec<StreamEvent>) {
        let open: Vec<usize> = self.open_blocks.iter().copied().collect();
        for index in open {
            self.close_block(index, out);
        }
    }

    fn on_output_item_added(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        let Some(item) = raw.get("item") else { return };
        if item.get("type").and_then(|v| v.as_str()) != Some("function_call") {
            return;
        }
        self.ensure_message_start(out);

        let output_index = raw.get("output_index").and_then(|v| v.as_u64()).unwrap_or(0);
        if self.function_calls.contains_key(&output_index) {
            return;
        }

        if let Some(item_id) = item.get("id").and_then(|v| v.as_str()) {
            self.output_index_by_item_id
                .insert(item_id.to_string(), output_index);
        }

        let index = self.next_block_index;
        self.next_block_index += 1;
        self.open_blocks.insert(index);

        let tool_call_id = item
            .get("call_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .or_else(|| item.get("id").and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("tool_call_{index}"));
        let name = item
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        out.push(StreamEvent::ContentBlockStart {
            index,
            content_block: ContentBlock::ToolUse {
                id: tool_call_id.clone(),
                name: name.clone(),
                input: serde_json::json!({}),
            },
        });

        // Some upstreams deliver the full arguments in the initial item.
        if let Some(args) = item.get("arguments").and_then(|v| v.as_str()) {
            if !args.is_empty() {
                self.block_has_delta.insert(index);
                out.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::InputJsonDelta {
                        partial_json: args.to_string(),
                    },
                });
            }
        }

        self.function_calls.insert(
            output_index,
            FunctionCallState {
                block_index: index,
                tool_call_id,
                name,
            },
        );
    }

    fn on_output_item_done(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        let Some(item) = raw.get("item") else { return };
        if item.get("type").and_then(|v| v.as_str()) != Some("reasoning") {
            return;
        }
        self.ensure_message_start(out);

        let output_index = raw.get("output_index").and_then(|v| v.as_u64()).unwrap_or(0);
        let index = self.open_keyed_block((output_index, 0), thinking_block, out);

        if let Some(signature) = item.get("encrypted_content").and_then(|v| v.as_str()) {
            if !signature.is_empty() {
                out.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::SignatureDelta {
                        signature: signature.to_string(),
                    },
                });
            }
        }

        self.close_block(index, out);
    }

    fn on_text_delta(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        let Some(delta) = raw.get("delta").and_then(|v| v.as_str()) else {
            return;
        };
        if delta.is_empty() {
            return;
        }
        self.ensure_message_start(out);

        let key = text_key(raw);
        let index = self.open_keyed_block(key, text_block, out);
        self.block_has_delta.insert(index);
        out.push(StreamEvent::ContentBlockDelta {
            index,
            delta: ContentDelta::TextDelta {
                text: delta.to_string(),
            },
        });
    }

    fn on_text_done(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        self.ensure_message_start(out);

        let key = text_key(raw);
        let index = self.open_keyed_block(key, text_block, out);

        // A block closed by `done` alone still owes the client its text.
        if !self.block_has_delta.contains(&index) {
            if let Some(text) = raw.get("text").and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    self.block_has_delta.insert(index);
                    out.push(StreamEvent::ContentBlockDelta {
                        index,
                        delta: ContentDelta::TextDelta {
                            text: text.to_string(),
                        },
                    });
                }
            }
        }

        self.close_block(index, out);
    }

    fn on_thinking_delta(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        let Some(delta) = raw.get("delta").and_then(|v| v.as_str()) else {
            return;
        };
        self.ensure_message_start(out);

        let output_index = raw.get("output_index").and_then(|v| v.as_u64()).unwrap_or(0);
        let index = self.open_keyed_block((output_index, 0), thinking_block, out);
        self.block_has_delta.insert(index);
        out.push(StreamEvent::ContentBlockDelta {
            index,
            delta: ContentDelta::ThinkingDelta {
                thinking: delta.to_string(),
            },
        });
    }

    fn on_thinking_part_done(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        self.ensure_message_start(out);

        let output_index = raw.get("output_index").and_then(|v| v.as_u64()).unwrap_or(0);
        let index = self.open_keyed_block((output_index, 0), thinking_block, out);

        if !self.block_has_delta.contains(&index) {
            if let Some(text) = raw
                .get("part")
                .and_then(|p| p.get("text"))
                .and_then(|v| v.as_str())
            {
                if !text.is_empty() {
                    self.block_has_delta.insert(index);
                    out.push(StreamEvent::ContentBlockDelta {
                        index,
                        delta: ContentDelta::ThinkingDelta {
                            thinking: text.to_string(),
                        },
                    });
                }
            }
        }
    }

    /// Resolve a function-call event to its `output_index`, falling back to
    /// the `item_id` map for upstreams that omit `output_index`.
    fn function_call_output_index(&self, raw: &Value) -> Option<u64> {
        raw.get("output_index")
            .and_then(|v| v.as_u64())
            .filter(|oi| self.function_calls.contains_key(oi))
            .or_else(|| {
                raw.get("item_id")
                    .and_then(|v| v.as_str())
                    .and_then(|id| self.output_index_by_item_id.get(id).copied())
            })
    }

    fn on_arguments_delta(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        self.ensure_message_start(out);
        let Some(output_index) = self.function_call_output_index(raw) else {
            warn!("function_call_arguments.delta without a matching function call");
            return;
        };
        let Some(state) = self.function_calls.get(&output_index) else {
            return;
        };
        let index = state.block_index;

        if let Some(delta) = raw.get("delta").and_then(|v| v.as_str()) {
            if !delta.is_empty() {
                self.block_has_delta.insert(index);
                out.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::InputJsonDelta {
                        partial_json: delta.to_string(),
                    },
                });
            }
        }
    }

    fn on_arguments_done(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        self.ensure_message_start(out);
        let Some(output_index) = self.function_call_output_index(raw) else {
            return;
        };
        let Some(state) = self.function_calls.get(&output_index) else {
            return;
        };
        let index = state.block_index;

        if !self.block_has_delta.contains(&index) {
            if let Some(args) = raw.get("arguments").and_then(|v| v.as_str()) {
                if !args.is_empty() {
                    self.block_has_delta.insert(index);
                    out.push(StreamEvent::ContentBlockDelta {
                        index,
                        delta: ContentDelta::InputJsonDelta {
                            partial_json: args.to_string(),
                        },
                    });
                }
            }
        }

        self.close_block(index, out);
        if let Some(state) = self.function_calls.remove(&output_index) {
            debug!(tool_call = %state.tool_call_id, name = %state.name, "function call complete");
        }
    }

    fn on_terminal(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        self.ensure_message_start(out);
        self.close_all_open(out);

        match raw.get("response") {
            Some(response) => {
                let status = response
                    .get("status")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .or_else(|| {
                        raw.get("type").and_then(|v| v.as_str()).map(|t| {
                            t.trim_start_matches("response.").to_string()
                        })
                    });
                let incomplete: Option<IncompleteDetails> = response
                    .get("incomplete_details")
                    .and_then(|v| serde_json::from_value(v.clone()).ok());
                let usage: Option<ResponsesUsage> = response
                    .get("usage")
                    .and_then(|v| serde_json::from_value(v.clone()).ok());

                out.push(StreamEvent::MessageDelta {
                    delta: MessageDelta {
                        stop_reason: stop_reason_from_status(
                            status.as_deref(),
                            incomplete.as_ref(),
                        ),
                        stop_sequence: None,
                    },
                    usage: usage.map(|u| Usage {
                        input_tokens: u.input_tokens,
                        output_tokens: u.output_tokens,
                        cache_read_input_tokens: None,
                        cache_creation_input_tokens: None,
                    }),
                });
            }
            None => {
                out.push(StreamEvent::MessageDelta {
                    delta: MessageDelta::default(),
                    usage: None,
                });
            }
        }

        out.push(StreamEvent::MessageStop);
        self.message_completed = true;
    }

    fn on_failed(&mut self, raw: &Value, out: &mut Vec<StreamEvent>) {
        self.ensure_message_start(out);
        self.close_all_open(out);
        out.push(StreamEvent::Error {
            error: StreamError::api_error(error_message(raw, "Responses stream failed")),
        });
        self.message_completed = true;
    }
}

fn text_key(raw: &Value) -> (u64, u64) {
    (
        raw.get("output_index").and_then(|v| v.as_u64()).unwrap_or(0),
        raw.get("content_index").and_then(|v| v.as_u64()).unwrap_or(0),
    )
}

fn text_block() -> ContentBlock {
    ContentBlock::Text {
        text: String::new(),
    }
}

fn thinking_block() -> ContentBlock {
    ContentBlock::Thinking {
        thinking: String::new(),
        signature: String::new(),
    }
}

/// Failure events carry an error as an object, a bare string, or nested under
/// `response.error`.
fn error_message(raw: &Value, default: &str) -> String {
    let candidates = [
        raw.get("error"),
        raw.get("response").and_then(|r| r.get("error")),
        raw.get("message"),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Some(s) = candidate.as_str() {
            return s.to_string();
        }
        if let Some(s) = candidate.get("message").and_then(|v| v.as_str()) {
            return s.to_string();
        }
    }
    default.to_string()
}

/// Drive an upstream Responses SSE body and yield Anthropic SSE frames.
pub fn sse_stream(
    response: reqwest::Response,
    requested_model: String,
) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut state = ResponsesAnthropicState::new(requested_model);
        let mut buffer = String::new();
        let mut upstream = response.bytes_stream();

        while let Some(chunk) = upstream.next().await {
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
                                for ev in state.handle_event(&event) {
                                    yield sse::anthropic_frame(&ev);
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "skipping unparseable Responses event");
                            }
                        }
                    }
                    if state.is_complete() {
                        break;
                    }
                }
                Err(e) => {
                    for ev in state.transport_error(format!("upstream stream error: {e}")) {
                        yield sse::anthropic_frame(&ev);
                    }
                    break;
                }
            }
        }

        for ev in state.finish() {
            yield sse::anthropic_frame(&ev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn drive(state: &mut ResponsesAnthropicState, events: &[Value]) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        for ev in events {
            out.extend(state.handle_event(ev));
        }
        out
    }

    fn assert_block_lifecycle(events: &[StreamEvent]) {
        let mut open: HashSet<usize> = HashSet::new();
        let mut starts = 0usize;
        let mut stops = 0usize;
        for ev in events {
            match ev {
                StreamEvent::ContentBlockStart { index, .. } => {
                    assert!(open.insert(*index), "index {index} started twice");
                    starts += 1;
                }
                StreamEvent::ContentBlockDelta { index, .. } => {
                    assert!(open.contains(index), "delta for unopened index {index}");
                }
                StreamEvent::ContentBlockStop { index } => {
                    assert!(open.remove(index), "stop without start for index {index}");
                    stops += 1;
                }
                _ => {}
            }
        }
        assert_eq!(starts, stops, "unbalanced start/stop");
        assert!(open.is_empty());
    }

    #[test]
    fn tool_call_scenario_end_to_end() {
        let mut state = ResponsesAnthropicState::new("claude-sonnet-4");
        let events = drive(
            &mut state,
            &[
                json!({"type": "response.created", "response": {"id": "resp_1", "model": "gpt-5.1-codex"}}),
                json!({"type": "response.output_item.added", "output_index": 0, "item": {
                    "type": "function_call", "id": "fc_1", "call_id": "c1",
                    "name": "getWeather", "arguments": ""
                }}),
                json!({"type": "response.function_call_arguments.delta", "output_index": 0, "delta": "{\"ci"}),
                json!({"type": "response.function_call_arguments.delta", "output_index": 0, "delta": "ty\":\""}),
                json!({"type": "response.function_call_arguments.delta", "output_index": 0, "delta": "SF\"}"}),
                json!({"type": "response.function_call_arguments.done", "output_index": 0, "arguments": "{\"city\":\"SF\"}"}),
                json!({"type": "response.completed", "response": {
                    "status": "completed",
                    "usage": {"input_tokens": 10, "output_tokens": 4}
                }}),
            ],
        );

        assert_block_lifecycle(&events);
        assert!(matches!(events[0], StreamEvent::MessageStart { .. }));
        match &events[1] {
            StreamEvent::ContentBlockStart { index: 0, content_block } => {
                assert!(matches!(content_block, ContentBlock::ToolUse { id, name, .. }
                    if id == "c1" && name == "getWeather"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        let json_deltas: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ContentBlockDelta {
                    delta: ContentDelta::InputJsonDelta { partial_json },
                    ..
                } => Some(partial_json.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(json_deltas, vec!["{\"ci", "ty\":\"", "SF\"}"]);
        match &events[events.len() - 2] {
            StreamEvent::MessageDelta { delta, usage } => {
                assert_eq!(delta.stop_reason.as_deref(), Some("end_turn"));
                let usage = usage.unwrap();
                assert_eq!(usage.input_tokens, 10);
                assert_eq!(usage.output_tokens, 4);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(events.last(), Some(StreamEvent::MessageStop)));
        assert!(state.is_complete());
    }

    #[test]
    fn reasoning_then_text_scenario() {
        let mut state = ResponsesAnthropicState::new("m");
        let events = drive(
            &mut state,
            &[
                json!({"type": "response.created", "response": {"id": "resp_2", "model": "m"}}),
                json!({"type": "response.reasoning_summary_text.delta", "output_index": 0, "delta": "let me "}),
                json!({"type": "response.reasoning_summary_text.delta", "output_index": 0, "delta": "think"}),
                json!({"type": "response.reasoning_summary_part.done", "output_index": 0, "part": {"text": "let me think"}}),
                json!({"type": "response.output_item.done", "output_index": 0, "item": {
                    "type": "reasoning", "encrypted_content": "sig"
                }}),
                json!({"type": "response.output_text.delta", "output_index": 1, "content_index": 0, "delta": "hello"}),
                json!({"type": "response.output_text.done", "output_index": 1, "content_index": 0, "text": "hello"}),
                json!({"type": "response.completed", "response": {"status": "completed"}}),
            ],
        );

        assert_block_lifecycle(&events);
        let thinking_deltas: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: ContentDelta::ThinkingDelta { thinking },
                } => Some(thinking.as_str()),
                _ => None,
            })
            .collect();
        // part.done must not duplicate already-streamed deltas.
        assert_eq!(thinking_deltas, vec!["let me ", "think"]);
        assert!(events.iter().any(|e| matches!(e,
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: ContentDelta::SignatureDelta { signature }
            } if signature == "sig")));
        assert!(events.iter().any(|e| matches!(e,
            StreamEvent::ContentBlockDelta {
                index: 1,
                delta: ContentDelta::TextDelta { text }
            } if text == "hello")));
    }

    #[test]
    fn zero_delta_text_block_synthesizes_from_done() {
        let mut state = ResponsesAnthropicState::new("m");
        let events = drive(
            &mut state,
            &[
                json!({"type": "response.output_text.done", "output_index": 0, "content_index": 0, "text": "all at once"}),
                json!({"type": "response.completed", "response": {"status": "completed"}}),
            ],
        );
        assert_block_lifecycle(&events);
        assert!(events.iter().any(|e| matches!(e,
            StreamEvent::ContentBlockDelta {
                delta: ContentDelta::TextDelta { text }, ..
            } if text == "all at once")));
    }

    #[test]
    fn arguments_resolved_via_item_id_fallback() {
        let mut state = ResponsesAnthropicState::new("m");
        let events = drive(
            &mut state,
            &[
                json!({"type": "response.output_item.added", "output_index": 3, "item": {
                    "type": "function_call", "id": "fc_9", "call_id": "c9", "name": "f", "arguments": ""
                }}),
                json!({"type": "response.function_call_arguments.delta", "item_id": "fc_9", "delta": "{}"}),
                json!({"type": "response.function_call_arguments.done", "item_id": "fc_9"}),
                json!({"type": "response.completed", "response": {"status": "completed"}}),
            ],
        );
        assert_block_lifecycle(&events);
        assert!(events.iter().any(|e| matches!(e,
            StreamEvent::ContentBlockDelta {
                delta: ContentDelta::InputJsonDelta { partial_json }, ..
            } if partial_json == "{}")));
    }

    #[test]
    fn arguments_in_initial_item_payload_need_no_deltas() {
        let mut state = ResponsesAnthropicState::new("m");
        let events = drive(
            &mut state,
            &[
                json!({"type": "response.output_item.added", "output_index": 0, "item": {
                    "type": "function_call", "call_id": "c1", "name": "f",
                    "arguments": "{\"x\":1}"
                }}),
                json!({"type": "response.function_call_arguments.done", "output_index": 0, "arguments": "{\"x\":1}"}),
                json!({"type": "response.completed", "response": {"status": "completed"}}),
            ],
        );
        assert_block_lifecycle(&events);
        let json_deltas: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ContentBlockDelta {
                    delta: ContentDelta::InputJsonDelta { partial_json },
                    ..
                } => Some(partial_json.as_str()),
                _ => None,
            })
            .collect();
        // The initial payload already carried everything; done adds nothing.
        assert_eq!(json_deltas, vec!["{\"x\":1}"]);
    }

    #[test]
    fn premature_eof_emits_synthetic_error() {
        let mut state = ResponsesAnthropicState::new("m");
        let mut events = drive(
            &mut state,
            &[json!({"type": "response.created", "response": {"id": "resp_4", "model": "m"}})],
        );
        events.extend(state.finish());

        assert!(matches!(events[0], StreamEvent::MessageStart { .. }));
        match &events[1] {
            StreamEvent::Error { error } => {
                assert_eq!(error.kind, "api_error");
                assert_eq!(error.message, "Responses stream ended without completion");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        // finish() is idempotent once completed.
        assert!(state.finish().is_empty());
    }

    #[test]
    fn failed_event_closes_blocks_then_errors() {
        let mut state = ResponsesAnthropicState::new("m");
        let events = drive(
            &mut state,
            &[
                json!({"type": "response.output_text.delta", "output_index": 0, "content_index": 0, "delta": "par"}),
                json!({"type": "response.failed", "response": {"error": {"message": "boom"}}}),
            ],
        );
        assert!(events.iter().any(|e| matches!(e, StreamEvent::ContentBlockStop { .. })));
        assert!(matches!(events.last(),
            Some(StreamEvent::Error { error }) if error.message == "boom"));
        assert!(state.is_complete());
    }

    #[test]
    fn message_start_carries_cache_adjusted_usage() {
        let mut state = ResponsesAnthropicState::new("m");
        let events = drive(
            &mut state,
            &[json!({"type": "response.created", "response": {
                "id": "resp_5", "model": "m",
                "usage": {"input_tokens": 12, "input_tokens_details": {"cached_tokens": 5}}
            }})],
        );
        match &events[0] {
            StreamEvent::MessageStart { message } => {
                assert_eq!(message.usage.input_tokens, 7);
                assert_eq!(message.usage.cache_creation_input_tokens, Some(5));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_events_are_ignored() {
        let mut state = ResponsesAnthropicState::new("m");
        assert!(state
            .handle_event(&json!({"type": "response.queued"}))
            .is_empty());
        assert!(state.handle_event(&json!({"no_type": true})).is_empty());
    }

    #[test]
    fn incomplete_without_details_has_null_stop_reason() {
        let mut state = ResponsesAnthropicState::new("m");
        let events = drive(
            &mut state,
            &[json!({"type": "response.incomplete", "response": {"status": "incomplete"}})],
        );
        assert!(events.iter().any(|e| matches!(e,
            StreamEvent::MessageDelta { delta, .. } if delta.stop_reason.is_none())));
    }
}
