//! Anthropic Messages API wire types.
//!
//! Claude Code speaks (a subset of) Anthropic's `/v1/messages` API.
//!
//! Notes:
//! - Incoming requests can use shorthand strings for `system` and
//!   `message.content`. These are accepted via `#[serde(untagged)]` enums.
//! - Internally we prefer the structured `Vec<ContentBlock>` representation.

use serde::{Deserialize, Serialize};

/// A message role in the Anthropic Messages API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the Anthropic Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Anthropic allows either a string or an array of content blocks.
    pub content: Content,
}

/// Either a string shorthand or a full content block list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    String(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Borrowed view as a block list (string shorthand becomes one text block).
    pub fn as_blocks(&self) -> Vec<ContentBlock> {
        match self {
            Content::String(s) => vec![ContentBlock::Text { text: s.clone() }],
            Content::Blocks(v) => v.clone(),
        }
    }
}

/// System prompt input: plain string or an array of typed text blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    String(String),
    Blocks(Vec<SystemBlock>),
}

/// A system content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// A content block within `messages[].content`.
///
/// Unrecognized block kinds deserialize into `Other` and are forwarded or
/// dropped by the translators depending on what the target dialect accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// Image input.
    Image { source: ImageSource },

    /// A tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// A tool invocation result supplied by the client.
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: ToolResultContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// Model scratch reasoning, optionally signed for upstream verification.
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: String,
    },

    #[serde(untagged)]
    Other(serde_json::Value),
}

/// Image content source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    /// `data:<mime>;base64,<data>` URL form used by the OpenAI dialects.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Tool result content can be a string shorthand or an array of blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    String(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for ToolResultContent {
    fn default() -> Self {
        ToolResultContent::String(String::new())
    }
}

impl ToolResultContent {
    /// Lossy plain-text representation.
    pub fn to_plaintext(&self) -> String {
        match self {
            ToolResultContent::String(s) => s.clone(),
            ToolResultContent::Blocks(v) => v
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Tool specification (Anthropic schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// How the model should choose tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Any,
    Tool { name: String },
    None,
}

/// Request body for `/v1/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl MessagesRequest {
    /// `metadata.user_id`, when present.
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("user_id"))
            .and_then(|v| v.as_str())
    }
}

/// Response body for `/v1/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

/// Token usage info.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
}

/// Request body for `/v1/messages/count_tokens`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCountRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

/// Response body for `/v1/messages/count_tokens`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenCountResponse {
    pub input_tokens: u64,
}

// ===== STREAMING EVENTS =====

/// Anthropic SSE stream events emitted to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessagesResponse,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: ContentDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDelta,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    MessageStop,
    Ping,
    Error {
        error: StreamError,
    },
}

impl StreamEvent {
    /// SSE `event:` line value; matches the serialized `type` tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Ping => "ping",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Content delta types for streaming updates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
}

/// Stop information carried by `message_delta`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageDelta {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

/// Error payload of a terminal `error` event.
#[derive(Debug, Clone, Serialize)]
pub struct StreamError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl StreamError {
    pub fn api_error(message: impl Into<String>) -> Self {
        Self {
            kind: "api_error".to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_accepts_string_shorthand() {
        let msg: Message = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": "hello"
        }))
        .unwrap();
        let blocks = msg.content.as_blocks();
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "hello"));
    }

    #[test]
    fn unknown_block_survives_roundtrip() {
        let raw = serde_json::json!({
            "type": "server_tool_use",
            "id": "srvtoolu_1",
            "name": "web_search"
        });
        let block: ContentBlock = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(block, ContentBlock::Other(_)));
        assert_eq!(serde_json::to_value(&block).unwrap(), raw);
    }

    #[test]
    fn stream_event_serializes_with_type_tag() {
        let ev = StreamEvent::ContentBlockDelta {
            index: 2,
            delta: ContentDelta::TextDelta {
                text: "hi".to_string(),
            },
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "content_block_delta");
        assert_eq!(v["index"], 2);
        assert_eq!(v["delta"]["type"], "text_delta");
        assert_eq!(ev.event_name(), "content_block_delta");
    }

    #[test]
    fn tool_choice_parses_tagged_forms() {
        let auto: ToolChoice = serde_json::from_value(serde_json::json!({"type": "auto"})).unwrap();
        assert!(matches!(auto, ToolChoice::Auto));
        let tool: ToolChoice =
            serde_json::from_value(serde_json::json!({"type": "tool", "name": "getWeather"}))
                .unwrap();
        assert!(matches!(tool, ToolChoice::Tool { name } if name == "getWeather"));
    }
}
