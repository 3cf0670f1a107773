//! Anthropic Messages request -> Responses request.

use crate::dialect::anthropic::{
    ContentBlock, MessagesRequest, Role, SystemPrompt, ToolChoice,
};
use crate::dialect::responses::{
    InputItem, ItemContent, ItemContentPart, ReasoningConfig, ResponsesRequest, ResponsesTool,
};
use crate::translate::model::rewrite_model_name;
use serde_json::json;

/// Guidance injected into `instructions` for agent clients. The Responses
/// upstream has no session memory for local tools, so it must be told how the
/// client-side shell and todo tools behave.
const TOOL_USAGE_GUIDANCE: &str = "\
Tool usage rules:
- Bash runs each command in a persistent shell session; do not prefix commands with `cd` unless a directory change is actually required.
- Long-running Bash commands should be started in the background and their output collected later with BashOutput; never poll by re-running the command.
- Keep the TodoWrite task list current: mark a task in_progress before starting it and completed immediately after finishing it.";

/// Build a Responses payload from an Anthropic Messages request.
pub fn translate_request(req: &MessagesRequest, extra_prompt: Option<&str>) -> ResponsesRequest {
    let mut input: Vec<InputItem> = Vec::new();

    for msg in &req.messages {
        match msg.role {
            Role::User => translate_user_message(&msg.content.as_blocks(), &mut input),
            Role::Assistant => translate_assistant_message(&msg.content.as_blocks(), &mut input),
        }
    }

    let (safety_identifier, prompt_cache_key) = req
        .user_id()
        .map(parse_user_id)
        .unwrap_or((None, None));

    ResponsesRequest {
        model: rewrite_model_name(&req.model),
        input,
        instructions: Some(build_instructions(req.system.as_ref(), extra_prompt)),
        max_output_tokens: Some(req.max_tokens),
        temperature: req.temperature,
        top_p: req.top_p,
        stream: req.stream,
        tools: req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| ResponsesTool {
                    kind: "function".to_string(),
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                })
                .collect()
        }),
        tool_choice: req.tool_choice.as_ref().map(translate_tool_choice),
        store: Some(false),
        parallel_tool_calls: Some(true),
        reasoning: Some(ReasoningConfig {
            effort: "high".to_string(),
            summary: Some("auto".to_string()),
        }),
        include: Some(vec!["reasoning.encrypted_content".to_string()]),
        safety_identifier,
        prompt_cache_key,
    }
}

/// System prompt plus the agent-guidance preamble, plus any per-model extra
/// prompt from config. A block-form system folds the guidance into the first
/// text block's position, which after flattening is the same join.
fn build_instructions(system: Option<&SystemPrompt>, extra_prompt: Option<&str>) -> String {
    let mut sections: Vec<String> = Vec::new();

    match system {
        Some(SystemPrompt::String(s)) if !s.is_empty() => sections.push(s.clone()),
        Some(SystemPrompt::Blocks(blocks)) => {
            for (i, block) in blocks.iter().enumerate() {
                if i == 0 {
                    sections.push(format!("{}\n\n{}", block.text, TOOL_USAGE_GUIDANCE));
                } else {
                    sections.push(block.text.clone());
                }
            }
        }
        _ => {}
    }

    if matches!(system, None | Some(SystemPrompt::String(_))) {
        sections.push(TOOL_USAGE_GUIDANCE.to_string());
    }

    if let Some(extra) = extra_prompt {
        if !extra.is_empty() {
            sections.push(extra.to_string());
        }
    }

    sections.join("\n\n")
}

/// `user_<safety>_account..._session_<cache_key>` -> (safety_identifier,
/// prompt_cache_key). Anything that does not match yields neither.
fn parse_user_id(user_id: &str) -> (Option<String>, Option<String>) {
    let safety = user_id
        .strip_prefix("user_")
        .and_then(|rest| rest.split_once("_account"))
        .map(|(safety, _)| safety.to_string())
        .filter(|s| !s.is_empty());

    let cache_key = user_id
        .split_once("_session_")
        .map(|(_, key)| key.to_string())
        .filter(|s| !s.is_empty());

    (safety, cache_key)
}

fn translate_tool_choice(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Any => json!("required"),
        ToolChoice::Tool { name } => json!({"type": "function", "name": name}),
        ToolChoice::None => json!("none"),
    }
}

/// User turn: text/image blocks accumulate into one message item; every
/// tool_result flushes the accumulated content first, then emits its own
/// top-level `function_call_output` item.
fn translate_user_message(blocks: &[ContentBlock], input: &mut Vec<InputItem>) {
    let mut pending: Vec<ItemContentPart> = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => {
                pending.push(ItemContentPart::InputText { text: text.clone() })
            }
            ContentBlock::Image { source } => pending.push(ItemContentPart::InputImage {
                image_url: source.to_data_url(),
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                flush_message(input, "user", &mut pending);
                input.push(InputItem::FunctionCallOutput {
                    call_id: tool_use_id.clone(),
                    output: content.to_plaintext(),
                    status: Some(
                        if is_error.unwrap_or(false) {
                            "incomplete"
                        } else {
                            "completed"
                        }
                        .to_string(),
                    ),
                });
            }
            _ => {}
        }
    }

    flush_message(input, "user", &mut pending);
}

/// Assistant turn: text and thinking both become `output_text` content;
/// tool_use blocks flush pending content then emit `function_call` items.
fn translate_assistant_message(blocks: &[ContentBlock], input: &mut Vec<InputItem>) {
    let mut pending: Vec<ItemContentPart> = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => {
                pending.push(ItemContentPart::OutputText { text: text.clone() })
            }
            ContentBlock::Thinking { thinking, .. } => {
                pending.push(ItemContentPart::OutputText {
                    text: thinking.clone(),
                })
            }
            ContentBlock::ToolUse { id, name, input: args } => {
                flush_message(input, "assistant", &mut pending);
                input.push(InputItem::FunctionCall {
                    call_id: id.clone(),
                    name: name.clone(),
                    arguments: serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string()),
                    status: Some("completed".to_string()),
                });
            }
            _ => {}
        }
    }

    flush_message(input, "assistant", &mut pending);
}

/// Emit pending content as a message item. A single plain-text part collapses
/// to a plain string `content`.
fn flush_message(input: &mut Vec<InputItem>, role: &str, pending: &mut Vec<ItemContentPart>) {
    if pending.is_empty() {
        return;
    }
    let parts = std::mem::take(pending);
    let content = match parts.as_slice() {
        [ItemContentPart::InputText { text }] => ItemContent::String(text.clone()),
        [ItemContentPart::OutputText { text }] => ItemContent::String(text.clone()),
        _ => ItemContent::Parts(parts),
    };
    input.push(InputItem::Message {
        role: role.to_string(),
        content,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::anthropic::{Content, ImageSource, Message, ToolResultContent};
    use serde_json::json;

    fn request(messages: Vec<Message>) -> MessagesRequest {
        MessagesRequest {
            model: "gpt-5.1-codex".to_string(),
            messages,
            max_tokens: 128,
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
    fn fixed_extras_are_set() {
        let out = translate_request(&request(vec![]), None);
        assert_eq!(out.store, Some(false));
        assert_eq!(out.parallel_tool_calls, Some(true));
        let reasoning = out.reasoning.unwrap();
        assert_eq!(reasoning.effort, "high");
        assert_eq!(reasoning.summary.as_deref(), Some("auto"));
        assert_eq!(
            out.include.unwrap(),
            vec!["reasoning.encrypted_content".to_string()]
        );
    }

    #[test]
    fn string_system_gets_guidance_appended() {
        let mut req = request(vec![]);
        req.system = Some(SystemPrompt::String("You are helpful.".to_string()));
        let out = translate_request(&req, None);
        let instructions = out.instructions.unwrap();
        assert!(instructions.starts_with("You are helpful."));
        assert!(instructions.contains("Tool usage rules"));
    }

    #[test]
    fn extra_prompt_is_appended_last() {
        let out = translate_request(&request(vec![]), Some("Answer in French."));
        let instructions = out.instructions.unwrap();
        assert!(instructions.ends_with("Answer in French."));
    }

    #[test]
    fn tool_result_flushes_pending_content_first() {
        let req = request(vec![Message {
            role: Role::User,
            content: Content::Blocks(vec![
                ContentBlock::Text {
                    text: "context".to_string(),
                },
                ContentBlock::ToolResult {
                    tool_use_id: "call_1".to_string(),
                    content: ToolResultContent::String("ok".to_string()),
                    is_error: Some(true),
                },
            ]),
        }]);
        let out = translate_request(&req, None);
        assert!(matches!(&out.input[0], InputItem::Message { role, .. } if role == "user"));
        match &out.input[1] {
            InputItem::FunctionCallOutput {
                call_id,
                output,
                status,
            } => {
                assert_eq!(call_id, "call_1");
                assert_eq!(output, "ok");
                assert_eq!(status.as_deref(), Some("incomplete"));
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn single_text_collapses_to_string_content() {
        let req = request(vec![Message {
            role: Role::User,
            content: Content::String("hi".to_string()),
        }]);
        let out = translate_request(&req, None);
        match &out.input[0] {
            InputItem::Message { content, .. } => {
                assert!(matches!(content, ItemContent::String(s) if s == "hi"))
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn image_produces_input_image_part() {
        let req = request(vec![Message {
            role: Role::User,
            content: Content::Blocks(vec![ContentBlock::Image {
                source: ImageSource {
                    kind: "base64".to_string(),
                    media_type: "image/jpeg".to_string(),
                    data: "qqqq".to_string(),
                },
            }]),
        }]);
        let out = translate_request(&req, None);
        match &out.input[0] {
            InputItem::Message { content: ItemContent::Parts(parts), .. } => {
                assert!(matches!(
                    &parts[0],
                    ItemContentPart::InputImage { image_url } if image_url == "data:image/jpeg;base64,qqqq"
                ));
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn assistant_tool_use_becomes_function_call() {
        let req = request(vec![Message {
            role: Role::Assistant,
            content: Content::Blocks(vec![
                ContentBlock::Thinking {
                    thinking: "hmm".to_string(),
                    signature: String::new(),
                },
                ContentBlock::ToolUse {
                    id: "call_2".to_string(),
                    name: "getWeather".to_string(),
                    input: json!({"city": "SF"}),
                },
            ]),
        }]);
        let out = translate_request(&req, None);
        assert!(matches!(&out.input[0], InputItem::Message { role, .. } if role == "assistant"));
        match &out.input[1] {
            InputItem::FunctionCall {
                call_id,
                name,
                arguments,
                status,
            } => {
                assert_eq!(call_id, "call_2");
                assert_eq!(name, "getWeather");
                assert_eq!(arguments, "{\"city\":\"SF\"}");
                assert_eq!(status.as_deref(), Some("completed"));
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn parses_session_metadata_from_user_id() {
        let mut req = request(vec![]);
        req.metadata = Some(json!({
            "user_id": "user_f00d_account__session_cafe1234"
        }));
        let out = translate_request(&req, None);
        assert_eq!(out.safety_identifier.as_deref(), Some("f00d"));
        assert_eq!(out.prompt_cache_key.as_deref(), Some("cafe1234"));
    }

    #[test]
    fn malformed_user_id_yields_no_session_metadata() {
        let mut req = request(vec![]);
        req.metadata = Some(json!({"user_id": "somebody"}));
        let out = translate_request(&req, None);
        assert_eq!(out.safety_identifier, None);
        assert_eq!(out.prompt_cache_key, None);
    }
}
