//! SSE frame parsing and formatting.
//!
//! Upstreams frame Server-Sent Events as blocks separated by a blank line.
//! The Chat Completions dialect sends bare `data:` lines ending with a
//! literal `data: [DONE]`; the Responses dialect adds `event:` lines, with
//! the event type repeated inside the JSON payload.

use crate::dialect::anthropic::StreamEvent;
use serde_json::Value;

/// Terminal sentinel for Chat-Completions-style streams.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Split the buffer into the first complete SSE frame and the remainder.
///
/// SSE frames are separated by a blank line (`\n\n`).
pub fn split_frame(buffer: &str) -> Option<(String, String)> {
    let idx = buffer.find("\n\n")?;
    let (frame, rest) = buffer.split_at(idx + 2);
    Some((frame.to_string(), rest.to_string()))
}

/// Join the frame's `data:` lines. Multi-line data joins with `\n`.
pub fn extract_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:").map(|rest| rest.trim_start()))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Format an Anthropic stream event as an SSE frame with its `event:` line.
pub fn anthropic_frame(event: &StreamEvent) -> String {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    format!("event: {}\ndata: {}\n\n", event.event_name(), data)
}

/// Format a Chat Completions chunk as a bare `data:` frame.
pub fn chat_frame(chunk: &Value) -> String {
    format!("data: {chunk}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::anthropic::StreamEvent;

    #[test]
    fn splits_first_frame() {
        let buffer = "data: {\"a\":1}\n\ndata: {\"b\":2}\n\n";
        let (frame, rest) = split_frame(buffer).unwrap();
        assert_eq!(frame, "data: {\"a\":1}\n\n");
        assert_eq!(rest, "data: {\"b\":2}\n\n");
        assert!(split_frame("data: partial").is_none());
    }

    #[test]
    fn joins_multiline_data() {
        let frame = "event: response.created\ndata: {\"a\":1}\ndata: {\"b\":2}\n\n";
        assert_eq!(extract_data(frame).unwrap(), "{\"a\":1}\n{\"b\":2}");
    }

    #[test]
    fn anthropic_frame_carries_event_line() {
        let frame = anthropic_frame(&StreamEvent::MessageStop);
        assert_eq!(frame, "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
    }

    #[test]
    fn chat_frame_is_data_only() {
        let frame = chat_frame(&serde_json::json!({"x": 1}));
        assert_eq!(frame, "data: {\"x\":1}\n\n");
    }
}
