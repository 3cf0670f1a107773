//! Chat Completions response -> Anthropic Messages response.

use crate::dialect::anthropic::{ContentBlock, MessagesResponse, Role, Usage};
use crate::dialect::chat::{ChatContent, ChatResponse};
use crate::translate::arguments::parse_function_call_arguments;
use uuid::Uuid;

/// Translate a non-streaming Chat Completions response into an Anthropic
/// response.
///
/// Each choice contributes blocks in canonical order (thinking, text,
/// tool_use); multiple choices are concatenated. A choice finishing with
/// `tool_calls` wins the stop-reason over the first choice's value.
pub fn translate_response(resp: &ChatResponse, requested_model: &str) -> MessagesResponse {
    let mut content: Vec<ContentBlock> = Vec::new();
    let mut finish_reason: Option<String> = None;
    let mut saw_tool_calls = false;

    for choice in &resp.choices {
        let msg = &choice.message;

        if msg.reasoning_text.is_some() || msg.reasoning_opaque.is_some() {
            // An opaque signature without visible text still needs a block.
            content.push(ContentBlock::Thinking {
                thinking: msg.reasoning_text.clone().unwrap_or_default(),
                signature: msg.reasoning_opaque.clone().unwrap_or_default(),
            });
        }

        match &msg.content {
            Some(ChatContent::String(s)) if !s.is_empty() => {
                content.push(ContentBlock::Text { text: s.clone() });
            }
            Some(ChatContent::Parts(_)) => {
                let text = msg.content.as_ref().unwrap().to_plaintext();
                if !text.is_empty() {
                    content.push(ContentBlock::Text { text });
                }
            }
            _ => {}
        }

        for call in msg.tool_calls.as_deref().unwrap_or_default() {
            saw_tool_calls = true;
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: parse_function_call_arguments(&call.function.arguments),
            });
        }

        if finish_reason.is_none() {
            finish_reason = choice.finish_reason.clone();
        }
    }

    let stop_reason = if saw_tool_calls {
        Some("tool_use".to_string())
    } else {
        finish_reason.as_deref().map(map_finish_reason)
    };

    let usage = resp.usage.map(translate_usage).unwrap_or_default();

    MessagesResponse {
        id: if resp.id.is_empty() {
            format!("msg_{}", Uuid::new_v4())
        } else {
            resp.id.clone()
        },
        kind: "message".to_string(),
        role: Role::Assistant,
        content,
        model: if resp.model.is_empty() {
            requested_model.to_string()
        } else {
            resp.model.clone()
        },
        stop_reason,
        stop_sequence: None,
        usage,
    }
}

/// `input_tokens` excludes the cached prefix; cached tokens surface as
/// `cache_read_input_tokens` when the upstream reports them.
pub fn translate_usage(usage: crate::dialect::chat::ChatUsage) -> Usage {
    let cached = usage.cached_tokens();
    Usage {
        input_tokens: usage.prompt_tokens.saturating_sub(cached.unwrap_or(0)),
        output_tokens: usage.completion_tokens,
        cache_read_input_tokens: cached,
        cache_creation_input_tokens: None,
    }
}

pub fn map_finish_reason(reason: &str) -> String {
    match reason {
        "stop" => "end_turn",
        "length" => "max_tokens",
        "tool_calls" => "tool_use",
        "content_filter" => "content_filter",
        other => return other.to_string(),
    }
    .to_string()
}
