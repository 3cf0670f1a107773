//! Responses result -> Chat Completions response.

use crate::dialect::chat::{
    ChatContent, ChatMessage, ChatResponse, ChatUsage, Choice, FunctionCall, PromptTokensDetails,
    ToolCall,
};
use crate::dialect::responses::{OutputItem, ResponsesResponse};
use crate::translate::responses_to_anthropic::{message_text, reasoning_text};

/// Translate a non-streaming Responses result into a Chat Completions
/// response with a single choice.
pub fn translate_response(resp: &ResponsesResponse) -> ChatResponse {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for item in &resp.output {
        match item {
            OutputItem::Message { content, .. } => {
                text.push_str(&message_text(content));
            }
            OutputItem::FunctionCall {
                id,
                call_id,
                name,
                arguments,
            } => tool_calls.push(ToolCall {
                id: call_id
                    .clone()
                    .or_else(|| id.clone())
                    .unwrap_or_default(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: arguments.clone(),
                },
            }),
            OutputItem::Reasoning { .. } => {
                let t = reasoning_text(item);
                if !t.is_empty() {
                    if !reasoning.is_empty() {
                        reasoning.push('\n');
                    }
                    reasoning.push_str(&t);
                }
            }
            _ => {}
        }
    }

    let finish_reason = if tool_calls.is_empty() {
        "stop"
    } else {
        "tool_calls"
    };

    ChatResponse {
        id: resp.id.clone(),
        model: resp.model.clone(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(ChatContent::String(text)),
                name: None,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
                reasoning_text: (!reasoning.is_empty()).then_some(reasoning),
                reasoning_opaque: None,
            },
            finish_reason: Some(finish_reason.to_string()),
        }],
        usage: resp.usage.map(|u| ChatUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            prompt_tokens_details: u.cached_tokens().map(|cached| PromptTokensDetails {
                cached_tokens: Some(cached),
            }),
        }),
    }
}
