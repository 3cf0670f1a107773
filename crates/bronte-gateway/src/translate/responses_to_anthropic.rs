//! Responses result -> Anthropic Messages response.

use crate::dialect::anthropic::{ContentBlock, MessagesResponse, Role, Usage};
use crate::dialect::responses::{
    IncompleteDetails, ItemContent, ItemContentPart, OutputItem, ResponsesResponse,
};
use crate::translate::arguments::parse_function_call_arguments;
use uuid::Uuid;

/// Translate a non-streaming Responses result into an Anthropic response.
///
/// Walks `output` in order; each item kind maps to one content block. If the
/// walk yields nothing, the aggregate `output_text` becomes a single text
/// block so the client always sees content.
pub fn translate_response(resp: &ResponsesResponse, requested_model: &str) -> MessagesResponse {
    let mut content: Vec<ContentBlock> = Vec::new();

    for item in &resp.output {
        match item {
            OutputItem::Reasoning { .. } => {
                let thinking = reasoning_text(item);
                content.push(ContentBlock::Thinking {
                    thinking,
                    signature: reasoning_signature(item),
                });
            }
            OutputItem::FunctionCall {
                id,
                call_id,
                name,
                arguments,
            } => {
                content.push(ContentBlock::ToolUse {
                    id: call_id
                        .clone()
                        .or_else(|| id.clone())
                        .unwrap_or_else(|| format!("tool_call_{}", Uuid::new_v4())),
                    name: name.clone(),
                    input: parse_function_call_arguments(arguments),
                });
            }
            OutputItem::FunctionCallOutput { output, .. } => {
                if let Some(s) = output.as_str() {
                    if !s.is_empty() {
                        content.push(ContentBlock::Text {
                            text: s.to_string(),
                        });
                    }
                }
            }
            OutputItem::Message { content: c, .. } => {
                content.push(ContentBlock::Text {
                    text: message_text(c),
                });
            }
            OutputItem::Other(_) => {}
        }
    }

    if content.is_empty() {
        content.push(ContentBlock::Text {
            text: resp.output_text.clone().unwrap_or_default(),
        });
    }

    let model = if resp.model.is_empty() {
        requested_model.to_string()
    } else {
        resp.model.clone()
    };

    MessagesResponse {
        id: if resp.id.is_empty() {
            format!("msg_{}", Uuid::new_v4())
        } else {
            resp.id.clone()
        },
        kind: "message".to_string(),
        role: Role::Assistant,
        content,
        model,
        stop_reason: stop_reason_from_status(
            resp.status.as_deref(),
            resp.incomplete_details.as_ref(),
        ),
        stop_sequence: None,
        usage: resp
            .usage
            .map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                cache_read_input_tokens: None,
                cache_creation_input_tokens: None,
            })
            .unwrap_or_default(),
    }
}

/// Map a Responses terminal status to an Anthropic stop reason.
pub fn stop_reason_from_status(
    status: Option<&str>,
    incomplete: Option<&IncompleteDetails>,
) -> Option<String> {
    match status {
        Some("completed") => Some("end_turn".to_string()),
        Some("incomplete") => match incomplete.and_then(|d| d.reason.as_deref()) {
            Some("max_output_tokens") => Some("max_tokens".to_string()),
            Some("content_filter") => Some("end_turn".to_string()),
            Some("tool_use") => Some("tool_use".to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Aggregate reasoning text from a reasoning item: `summary[].text`, entries
/// of `content` (under `text`/`thinking`/`reasoning` keys), and loose
/// top-level `thinking`/`text` fields, joined and trimmed.
pub fn reasoning_text(item: &OutputItem) -> String {
    let OutputItem::Reasoning {
        summary,
        content,
        extra,
        ..
    } = item
    else {
        return String::new();
    };

    let mut pieces: Vec<String> = Vec::new();

    for part in summary {
        if !part.text.is_empty() {
            pieces.push(part.text.clone());
        }
    }

    if let Some(entries) = content {
        for entry in entries {
            for key in ["text", "thinking", "reasoning"] {
                if let Some(s) = entry.get(key).and_then(|v| v.as_str()) {
                    if !s.is_empty() {
                        pieces.push(s.to_string());
                    }
                }
            }
        }
    }

    for key in ["thinking", "text"] {
        if let Some(s) = extra.get(key).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                pieces.push(s.to_string());
            }
        }
    }

    pieces.join("\n").trim().to_string()
}

/// One aggregated text per message item: `output_text` and `refusal` parts
/// sum in order.
pub fn message_text(content: &ItemContent) -> String {
    match content {
        ItemContent::String(s) => s.clone(),
        ItemContent::Parts(parts) => {
            let mut text = String::new();
            for part in parts {
                match part {
                    ItemContentPart::OutputText { text: t } => text.push_str(t),
                    ItemContentPart::Refusal { refusal } => text.push_str(refusal),
                    _ => {}
                }
            }
            text
        }
    }
}

fn reasoning_signature(item: &OutputItem) -> String {
    match item {
        OutputItem::Reasoning {
            encrypted_content, ..
        } => encrypted_content.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::responses::ResponsesUsage;
    use serde_json::json;

    fn response(output: Vec<OutputItem>) -> ResponsesResponse {
        ResponsesResponse {
            id: "resp_1".to_string(),
            model: "gpt-5.1-codex".to_string(),
            status: Some("completed".to_string()),
            incomplete_details: None,
            output,
            output_text: None,
            usage: Some(ResponsesUsage {
                input_tokens: 10,
                output_tokens: 4,
                input_tokens_details: None,
                output_tokens_details: None,
            }),
        }
    }

    #[test]
    fn walks_output_in_order() {
        let resp = response(vec![
            serde_json::from_value(json!({
                "type": "reasoning",
                "summary": [{"type": "summary_text", "text": "thought"}],
                "encrypted_content": "sig"
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "type": "message",
                "content": [
                    {"type": "output_text", "text": "hello "},
                    {"type": "refusal", "refusal": "but no"}
                ]
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "type": "function_call",
                "call_id": "c1",
                "name": "getWeather",
                "arguments": "{\"city\":\"SF\"}"
            }))
            .unwrap(),
        ]);

        let out = translate_response(&resp, "claude-sonnet-4");
        assert_eq!(out.content.len(), 3);
        assert!(
            matches!(&out.content[0], ContentBlock::Thinking { thinking, signature }
                if thinking == "thought" && signature == "sig")
        );
        assert!(matches!(&out.content[1], ContentBlock::Text { text } if text == "hello but no"));
        match &out.content[2] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "c1");
                assert_eq!(name, "getWeather");
                assert_eq!(input, &json!({"city": "SF"}));
            }
            other => panic!("unexpected block: {other:?}"),
        }
        assert_eq!(out.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(out.usage.input_tokens, 10);
        assert_eq!(out.usage.output_tokens, 4);
    }

    #[test]
    fn empty_output_falls_back_to_output_text() {
        let mut resp = response(vec![]);
        resp.output_text = Some("aggregate".to_string());
        let out = translate_response(&resp, "m");
        assert_eq!(out.content.len(), 1);
        assert!(matches!(&out.content[0], ContentBlock::Text { text } if text == "aggregate"));
    }

    #[test]
    fn incomplete_status_maps_by_reason() {
        assert_eq!(
            stop_reason_from_status(
                Some("incomplete"),
                Some(&IncompleteDetails {
                    reason: Some("max_output_tokens".to_string())
                })
            )
            .as_deref(),
            Some("max_tokens")
        );
        assert_eq!(
            stop_reason_from_status(
                Some("incomplete"),
                Some(&IncompleteDetails {
                    reason: Some("content_filter".to_string())
                })
            )
            .as_deref(),
            Some("end_turn")
        );
        // No details: deliberately null rather than an invented end_turn.
        assert_eq!(stop_reason_from_status(Some("incomplete"), None), None);
        assert_eq!(stop_reason_from_status(Some("failed"), None), None);
    }

    #[test]
    fn function_call_output_text_only_when_nonempty_string() {
        let resp = response(vec![
            serde_json::from_value(json!({
                "type": "function_call_output",
                "call_id": "c1",
                "output": ""
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "type": "function_call_output",
                "call_id": "c2",
                "output": "tool says hi"
            }))
            .unwrap(),
        ]);
        let out = translate_response(&resp, "m");
        assert_eq!(out.content.len(), 1);
        assert!(matches!(&out.content[0], ContentBlock::Text { text } if text == "tool says hi"));
    }
}
