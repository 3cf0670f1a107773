//! Tool-call argument parsing.
//!
//! Upstreams deliver `function_call.arguments` as a string that should hold a
//! JSON object but in practice may be empty, an array, a bare scalar, or not
//! JSON at all. Translation must never fail on it.

use serde_json::{json, Value};
use tracing::warn;

/// Parse a `function_call.arguments` string into a JSON object.
///
/// - empty / whitespace -> `{}`
/// - JSON object -> as-is
/// - JSON array -> `{"arguments": [...]}`
/// - JSON scalar or unparseable -> `{"raw_arguments": "<original>"}`
pub fn parse_function_call_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(Value::Array(arr)) => json!({ "arguments": arr }),
        Ok(_) => json!({ "raw_arguments": raw }),
        Err(e) => {
            warn!(error = %e, "tool call arguments are not valid JSON, wrapping raw string");
            json!({ "raw_arguments": raw })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_roundtrips() {
        let obj = json!({"city": "SF", "units": ["C", "F"]});
        let raw = serde_json::to_string(&obj).unwrap();
        assert_eq!(parse_function_call_arguments(&raw), obj);
    }

    #[test]
    fn empty_and_whitespace_become_empty_object() {
        assert_eq!(parse_function_call_arguments(""), json!({}));
        assert_eq!(parse_function_call_arguments("  \n"), json!({}));
    }

    #[test]
    fn array_is_wrapped() {
        assert_eq!(
            parse_function_call_arguments("[1,2]"),
            json!({"arguments": [1, 2]})
        );
    }

    #[test]
    fn scalar_and_garbage_keep_the_original_string() {
        assert_eq!(
            parse_function_call_arguments("42"),
            json!({"raw_arguments": "42"})
        );
        assert_eq!(
            parse_function_call_arguments("not json"),
            json!({"raw_arguments": "not json"})
        );
    }
}
