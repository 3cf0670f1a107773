//! Chat Completions chunk stream -> Anthropic SSE.
//!
//! A lighter state machine than the Responses direction: chunks interleave
//! text, reasoning and tool-call deltas on a single choice, so one content
//! block is open at a time and switching kinds closes the previous block.
//! Stop reason and usage can arrive on different chunks (usage trails the
//! finish chunk when `stream_options.include_usage` is set), so the terminal
//! `message_delta`/`message_stop` pair is emitted when the upstream stream
//! ends.

use std::collections::HashMap;

use crate::dialect::anthropic::{
    ContentBlock, ContentDelta, MessageDelta, MessagesResponse, Role, StreamEvent, StreamError,
    Usage,
};
use crate::stream::sse;
use crate::translate::chat_to_anthropic::map_finish_reason;
use anyhow::Result;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Thinking,
    /// Tool block for the upstream tool-call index it belongs to.
    Tool(u64),
}

/// Per-stream translation state.
#[derive(Debug)]
pub struct ChatAnthropicState {
    requested_model: String,

    message_start_sent: bool,
    message_completed: bool,

    next_block_index: usize,
    open_block: Option<(BlockKind, usize)>,
    /// Upstream tool-call index -> client block index.
    tool_block_by_index: HashMap<u64, usize>,

    message_id: Option<String>,
    model: Option<String>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl ChatAnthropicState {
    pub fn new(requested_model: impl Into<String>) -> Self {
        Self {
            requested_model: requested_model.into(),
            message_start_sent: false,
            message_completed: false,
            next_block_index: 0,
            open_block: None,
            tool_block_by_index: HashMap::new(),
            message_id: None,
            model: None,
            finish_reason: None,
            usage: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.message_completed
    }

    /// Translate one upstream chunk into zero or more client events.
    pub fn handle_chunk(&mut self, chunk: &Value) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        if self.message_id.is_none() {
            self.message_id = chunk
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }
        if self.model.is_none() {
            self.model = chunk
                .get("model")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }
        if let Some(usage) = extract_usage(chunk) {
            self.usage = Some(usage);
        }

        self.ensure_message_start(&mut out);

        let Some(choice) = chunk
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
        else {
            return out;
        };
        let delta = choice.get("delta");

        // Reasoning deltas arrive as `reasoning_text` or `reasoning_content`
        // depending on the upstream.
        let reasoning = delta
            .and_then(|d| d.get("reasoning_text").or_else(|| d.get("reasoning_content")))
            .and_then(|v| v.as_str());
        if let Some(reasoning) = reasoning {
            if !reasoning.is_empty() {
                let index = self.open_block(BlockKind::Thinking, &mut out);
                out.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::ThinkingDelta {
                        thinking: reasoning.to_string(),
                    },
                });
            }
        }

        if let Some(text) = delta
            .and_then(|d| d.get("content"))
            .and_then(|v| v.as_str())
        {
            if !text.is_empty() {
                let index = self.open_block(BlockKind::Text, &mut out);
                out.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::TextDelta {
                        text: text.to_string(),
                    },
                });
            }
        }

        if let Some(tool_calls) = delta
            .and_then(|d| d.get("tool_calls"))
            .and_then(|v| v.as_array())
        {
            for call in tool_calls {
                self.handle_tool_call_delta(call, &mut out);
            }
        }

        if let Some(reason) = choice.get("finish_reason").and_then(|v| v.as_str()) {
            self.finish_reason = Some(reason.to_string());
        }

        out
    }

    /// Close open blocks and terminate the message. Called when the upstream
    /// stream ends (`[DONE]` or EOF).
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.message_completed {
            return out;
        }
        self.ensure_message_start(&mut out);
        self.close_open_block(&mut out);

        out.push(StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: self
                    .finish_reason
                    .as_deref()
                    .map(map_finish_reason)
                    .or(Some("end_turn".to_string())),
                stop_sequence: None,
            },
            usage: self.usage,
        });
        out.push(StreamEvent::MessageStop);
        self.message_completed = true;
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

    fn handle_tool_call_delta(&mut self, call: &Value, out: &mut Vec<StreamEvent>) {
        let upstream_index = call.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
        let id = call.get("id").and_then(|v| v.as_str());
        let name = call
            .get("function")
            .and_then(|f| f.get("name"))
            .and_then(|v| v.as_str());

        if let (Some(id), Some(name)) = (id, name) {
            if !self.tool_block_by_index.contains_key(&upstream_index) {
                self.close_open_block(out);
                let index = self.next_block_index;
                self.next_block_index += 1;
                self.tool_block_by_index.insert(upstream_index, index);
                self.open_block = Some((BlockKind::Tool(upstream_index), index));
                out.push(StreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlock::ToolUse {
                        id: id.to_string(),
                        name: name.to_string(),
                        input: serde_json::json!({}),
                    },
                });
            }
        }

        if let Some(args) = call
            .get("function")
            .and_then(|f| f.get("arguments"))
            .and_then(|v| v.as_str())
        {
            if args.is_empty() {
                return;
            }
            match (self.open_block, self.tool_block_by_index.get(&upstream_index)) {
                (Some((BlockKind::Tool(open_idx), index)), Some(&mapped))
                    if open_idx == upstream_index && index == mapped =>
                {
                    out.push(StreamEvent::ContentBlockDelta {
                        index,
                        delta: ContentDelta::InputJsonDelta {
                            partial_json: args.to_string(),
                        },
                    });
                }
                _ => warn!(
                    tool_call_index = upstream_index,
                    "dropping arguments for a tool call whose block is closed"
                ),
            }
        }
    }

    fn ensure_message_start(&mut self, out: &mut Vec<StreamEvent>) {
        if self.message_start_sent {
            return;
        }
        self.message_start_sent = true;
        out.push(StreamEvent::MessageStart {
            message: MessagesResponse {
                id: self
                    .message_id
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
                usage: self.usage.map(|u| Usage { output_tokens: 0, ..u }).unwrap_or_default(),
            },
        });
    }

    /// Open (or reuse) the text/thinking block of the given kind. Tool
    /// blocks are opened in `handle_tool_call_delta` where the id and name
    /// are at hand.
    fn open_block(&mut self, kind: BlockKind, out: &mut Vec<StreamEvent>) -> usize {
        if let Some((open_kind, index)) = self.open_block {
            if open_kind == kind {
                return index;
            }
            self.close_open_block(out);
        }
        let index = self.next_block_index;
        self.next_block_index += 1;
        self.open_block = Some((kind, index));
        let content_block = if kind == BlockKind::Thinking {
            ContentBlock::Thinking {
                thinking: String::new(),
                signature: String::new(),
            }
        } else {
            ContentBlock::Text {
                text: String::new(),
            }
        };
        out.push(StreamEvent::ContentBlockStart {
            index,
            content_block,
        });
        index
    }

    fn close_open_block(&mut self, out: &mut Vec<StreamEvent>) {
        if let Some((_, index)) = self.open_block.take() {
            out.push(StreamEvent::ContentBlockStop { index });
        }
    }
}

/// Usage with the cached prefix split out, mirroring the non-streaming
/// translator.
fn extract_usage(chunk: &Value) -> Option<Usage> {
    let usage = chunk.get("usage")?;
    if usage.is_null() {
        return None;
    }
    let prompt = usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
    let completion = usage
        .get("completion_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let cached = usage
        .get("prompt_tokens_details")
        .and_then(|d| d.get("cached_tokens"))
        .and_then(|v| v.as_u64());
    Some(Usage {
        input_tokens: prompt.saturating_sub(cached.unwrap_or(0)),
        output_tokens: completion,
        cache_read_input_tokens: cached,
        cache_creation_input_tokens: None,
    })
}

/// Drive an upstream Chat Completions SSE body and yield Anthropic SSE
/// frames.
pub fn sse_stream(
    response: reqwest::Response,
    requested_model: String,
) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut state = ChatAnthropicState::new(requested_model);
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
                        if data.trim().is_empty() {
                            continue;
                        }
                        if data.trim() == "[DONE]" {
                            break 'read;
                        }
                        match serde_json::from_str::<Value>(&data) {
                            Ok(chunk) => {
                                for ev in state.handle_chunk(&chunk) {
                                    yield sse::anthropic_frame(&ev);
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "skipping unparseable chat chunk");
                            }
                        }
                    }
                }
                Err(e) => {
                    // transport_error marks the message completed, so the
                    // trailing finish() is a no-op.
                    for ev in state.transport_error(format!("upstream stream error: {e}")) {
                        yield sse::anthropic_frame(&ev);
                    }
                    break 'read;
                }
            }
        }

        for ev in state.finish() {
            yield sse::anthropic_frame(&ev);
        }
    }
}
