//! Anthropic Messages request -> Chat Completions request.

use crate::dialect::anthropic::{
    ContentBlock, MessagesRequest, Role, SystemPrompt, ToolChoice,
};
use crate::dialect::chat::{
    ChatContent, ChatMessage, ChatRequest, ChatTool, ContentPart, FunctionCall, FunctionDef,
    ImageUrl, ToolCall,
};
use crate::translate::model::rewrite_model_name;
use serde_json::json;

/// Build a Chat Completions payload from an Anthropic Messages request.
pub fn translate_request(req: &MessagesRequest) -> ChatRequest {
    let mut messages: Vec<ChatMessage> = Vec::new();

    if let Some(system) = &req.system {
        let text = system_to_plaintext(system);
        if !text.is_empty() {
            messages.push(ChatMessage::text("system", text));
        }
    }

    for msg in &req.messages {
        match msg.role {
            Role::User => messages.extend(translate_user_message(&msg.content.as_blocks())),
            Role::Assistant => {
                if let Some(m) = translate_assistant_message(&msg.content.as_blocks()) {
                    messages.push(m);
                }
            }
        }
    }

    let stream = req.stream.unwrap_or(false);

    ChatRequest {
        model: rewrite_model_name(&req.model),
        messages,
        max_tokens: Some(req.max_tokens),
        stop: req
            .stop_sequences
            .as_ref()
            .map(|s| serde_json::to_value(s).unwrap_or_default()),
        stream: req.stream,
        stream_options: stream.then(|| json!({"include_usage": true})),
        temperature: req.temperature,
        top_p: req.top_p,
        tools: req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| ChatTool {
                    kind: "function".to_string(),
                    function: FunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect()
        }),
        tool_choice: req.tool_choice.as_ref().map(translate_tool_choice),
        user: req.user_id().map(|s| s.to_string()),
    }
}

pub fn system_to_plaintext(system: &SystemPrompt) -> String {
    match system {
        SystemPrompt::String(s) => s.clone(),
        SystemPrompt::Blocks(blocks) => blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn translate_tool_choice(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Any => json!("required"),
        ToolChoice::Tool { name } => json!({"type": "function", "function": {"name": name}}),
        ToolChoice::None => json!("none"),
    }
}

/// A user turn splits into `role=tool` messages for every tool_result block,
/// ordered before a single `role=user` message carrying the rest. The
/// protocol requires tool results to directly follow the tool calls.
fn translate_user_message(blocks: &[ContentBlock]) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    let mut remainder: Vec<&ContentBlock> = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => out.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(ChatContent::String(content.to_plaintext())),
                name: None,
                tool_calls: None,
                tool_call_id: Some(tool_use_id.clone()),
                reasoning_text: None,
                reasoning_opaque: None,
            }),
            other => remainder.push(other),
        }
    }

    if let Some(content) = user_content(&remainder) {
        out.push(ChatMessage {
            role: "user".to_string(),
            content: Some(content),
            name: None,
            tool_calls: None,
            tool_call_id: None,
            reasoning_text: None,
            reasoning_opaque: None,
        });
    }

    out
}

/// Flatten user blocks to a plain string when no image is present, otherwise
/// to an ordered part list.
fn user_content(blocks: &[&ContentBlock]) -> Option<ChatContent> {
    let has_image = blocks
        .iter()
        .any(|b| matches!(b, ContentBlock::Image { .. }));

    if !has_image {
        let text = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        if text.is_empty() {
            return None;
        }
        return Some(ChatContent::String(text));
    }

    let mut parts = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Text { text } => parts.push(ContentPart::Text { text: text.clone() }),
            ContentBlock::Image { source } => parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: source.to_data_url(),
                },
            }),
            _ => {}
        }
    }
    (!parts.is_empty()).then_some(ChatContent::Parts(parts))
}

/// Assistant turn: thinking blocks aggregate into `reasoning_text` (and the
/// first non-empty signature into `reasoning_opaque`), tool_use blocks become
/// `tool_calls`, text blocks become the message content.
fn translate_assistant_message(blocks: &[ContentBlock]) -> Option<ChatMessage> {
    let mut texts: Vec<&str> = Vec::new();
    let mut thinking: Vec<&str> = Vec::new();
    let mut signature: Option<String> = None;
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::Thinking {
                thinking: t,
                signature: sig,
            } => {
                thinking.push(t);
                if signature.is_none() && !sig.is_empty() {
                    signature = Some(sig.clone());
                }
            }
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string()),
                },
            }),
            _ => {}
        }
    }

    let content = texts.join("\n\n");
    let reasoning = thinking.join("\n\n");

    if content.is_empty() && reasoning.is_empty() && signature.is_none() && tool_calls.is_empty() {
        return None;
    }

    Some(ChatMessage {
        role: "assistant".to_string(),
        content: (!content.is_empty()).then_some(ChatContent::String(content)),
        name: None,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
        reasoning_text: (!reasoning.is_empty()).then_some(reasoning),
        reasoning_opaque: signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::anthropic::{Content, ImageSource, Message, Tool, ToolResultContent};
    use serde_json::json;

    fn request(messages: Vec<Message>) -> MessagesRequest {
        MessagesRequest {
            model: "claude-sonnet-4".to_string(),
            messages,
            max_tokens: 64,
            system: None,
            stream: None,
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: None,
            tools: None,
            tool_choice: None,
            thinking: None,
            metadata: None,
        }
    }

    #[test]
    fn system_blocks_join_with_blank_line() {
        let mut req = request(vec![]);
        req.system = Some(
            serde_json::from_value(json!([
                {"type": "text", "text": "one"},
                {"type": "text", "text": "two"}
            ]))
            .unwrap(),
        );
        let out = translate_request(&req);
        assert_eq!(out.messages[0].role, "system");
        assert_eq!(
            out.messages[0].content.as_ref().unwrap().to_plaintext(),
            "one\n\ntwo"
        );
    }

    #[test]
    fn tool_results_precede_user_content() {
        let req = request(vec![Message {
            role: Role::User,
            content: Content::Blocks(vec![
                ContentBlock::Text {
                    text: "and here is more".to_string(),
                },
                ContentBlock::ToolResult {
                    tool_use_id: "toolu_1".to_string(),
                    content: ToolResultContent::String("result".to_string()),
                    is_error: None,
                },
            ]),
        }]);
        let out = translate_request(&req);
        assert_eq!(out.messages[0].role, "tool");
        assert_eq!(out.messages[0].tool_call_id.as_deref(), Some("toolu_1"));
        assert_eq!(out.messages[1].role, "user");
    }

    #[test]
    fn image_switches_to_multipart() {
        let req = request(vec![Message {
            role: Role::User,
            content: Content::Blocks(vec![
                ContentBlock::Text {
                    text: "what is this".to_string(),
                },
                ContentBlock::Image {
                    source: ImageSource {
                        kind: "base64".to_string(),
                        media_type: "image/png".to_string(),
                        data: "abcd".to_string(),
                    },
                },
            ]),
        }]);
        let out = translate_request(&req);
        match out.messages[0].content.as_ref().unwrap() {
            ChatContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                match &parts[1] {
                    ContentPart::ImageUrl { image_url } => {
                        assert_eq!(image_url.url, "data:image/png;base64,abcd")
                    }
                    other => panic!("unexpected part: {other:?}"),
                }
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn assistant_thinking_becomes_reasoning_fields() {
        let req = request(vec![Message {
            role: Role::Assistant,
            content: Content::Blocks(vec![
                ContentBlock::Thinking {
                    thinking: "step one".to_string(),
                    signature: String::new(),
                },
                ContentBlock::Thinking {
                    thinking: "step two".to_string(),
                    signature: "sig_abc".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_9".to_string(),
                    name: "getWeather".to_string(),
                    input: json!({"city": "SF"}),
                },
            ]),
        }]);
        let out = translate_request(&req);
        let assistant = &out.messages[0];
        assert_eq!(assistant.reasoning_text.as_deref(), Some("step one\n\nstep two"));
        assert_eq!(assistant.reasoning_opaque.as_deref(), Some("sig_abc"));
        let calls = assistant.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "toolu_9");
        assert_eq!(calls[0].function.arguments, "{\"city\":\"SF\"}");
    }

    #[test]
    fn maps_tools_and_tool_choice() {
        let mut req = request(vec![]);
        req.model = "claude-opus-4-20250514".to_string();
        req.tools = Some(vec![Tool {
            name: "getWeather".to_string(),
            description: Some("weather".to_string()),
            input_schema: json!({"type": "object"}),
        }]);
        req.tool_choice = Some(ToolChoice::Any);
        let out = translate_request(&req);
        assert_eq!(out.model, "claude-opus-4");
        assert_eq!(out.tools.as_ref().unwrap()[0].function.name, "getWeather");
        assert_eq!(out.tool_choice.unwrap(), json!("required"));
    }
}
