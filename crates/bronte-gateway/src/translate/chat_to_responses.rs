//! Chat Completions request -> Responses request.

use crate::dialect::chat::{ChatContent, ChatMessage, ChatRequest, ContentPart};
use crate::dialect::responses::{
    InputItem, ItemContent, ItemContentPart, ReasoningConfig, ResponsesRequest, ResponsesTool,
};
use bronte_config::ReasoningEffort;
use serde_json::json;

/// Build a Responses payload from a Chat Completions request.
///
/// `effort` comes from the per-model config lookup (default `high`).
pub fn translate_request(req: &ChatRequest, effort: ReasoningEffort) -> ResponsesRequest {
    let mut input: Vec<InputItem> = Vec::new();
    let mut instructions: Option<String> = None;

    for msg in &req.messages {
        match msg.role.as_str() {
            // The first string-form system message becomes `instructions`;
            // any further system messages stay in the item list.
            "system" if instructions.is_none() => {
                if let Some(ChatContent::String(s)) = &msg.content {
                    instructions = Some(s.clone());
                } else {
                    input.push(message_item(msg));
                }
            }
            "tool" => input.push(InputItem::FunctionCallOutput {
                call_id: msg.tool_call_id.clone().unwrap_or_default(),
                output: tool_output(msg),
                status: Some("completed".to_string()),
            }),
            "assistant" if msg.tool_calls.is_some() => {
                let has_content = msg
                    .content
                    .as_ref()
                    .is_some_and(|c| !c.to_plaintext().is_empty());
                if has_content {
                    input.push(message_item(msg));
                }
                for call in msg.tool_calls.as_deref().unwrap_or_default() {
                    input.push(InputItem::FunctionCall {
                        call_id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                        status: Some("completed".to_string()),
                    });
                }
            }
            _ => input.push(message_item(msg)),
        }
    }

    ResponsesRequest {
        model: req.model.clone(),
        input,
        instructions,
        max_output_tokens: req.max_tokens,
        temperature: req.temperature,
        top_p: req.top_p,
        stream: req.stream,
        tools: req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| ResponsesTool {
                    kind: "function".to_string(),
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    parameters: t.function.parameters.clone(),
                })
                .collect()
        }),
        tool_choice: req.tool_choice.as_ref().map(translate_tool_choice),
        store: None,
        parallel_tool_calls: Some(true),
        reasoning: Some(ReasoningConfig {
            effort: effort.as_str().to_string(),
            summary: Some("detailed".to_string()),
        }),
        include: Some(vec!["reasoning.encrypted_content".to_string()]),
        safety_identifier: None,
        prompt_cache_key: None,
    }
}

fn message_item(msg: &ChatMessage) -> InputItem {
    let content = match &msg.content {
        Some(ChatContent::String(s)) => ItemContent::String(s.clone()),
        Some(ChatContent::Parts(parts)) => ItemContent::Parts(
            parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => {
                        if msg.role == "assistant" {
                            ItemContentPart::OutputText { text: text.clone() }
                        } else {
                            ItemContentPart::InputText { text: text.clone() }
                        }
                    }
                    ContentPart::ImageUrl { image_url } => ItemContentPart::InputImage {
                        image_url: image_url.url.clone(),
                    },
                    ContentPart::Other(v) => ItemContentPart::Other(v.clone()),
                })
                .collect(),
        ),
        None => ItemContent::String(String::new()),
    };
    InputItem::Message {
        role: msg.role.clone(),
        content,
    }
}

/// Tool message content stringified when it is not already a string.
fn tool_output(msg: &ChatMessage) -> String {
    match &msg.content {
        Some(ChatContent::String(s)) => s.clone(),
        Some(other) => serde_json::to_value(other)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        None => String::new(),
    }
}

/// Chat tool_choice is already near the Responses shape; only the named form
/// needs flattening from `{function: {name}}` to `{name}`.
fn translate_tool_choice(choice: &serde_json::Value) -> serde_json::Value {
    if let Some(name) = choice
        .get("function")
        .and_then(|f| f.get("name"))
        .and_then(|n| n.as_str())
    {
        return json!({"type": "function", "name": name});
    }
    choice.clone()
}
