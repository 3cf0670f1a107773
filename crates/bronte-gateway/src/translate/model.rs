//! Model-name rewrites applied on the Anthropic surface.

/// Collapse dated Claude model names to the family name the upstream catalog
/// actually lists (`claude-sonnet-4-20250514` -> `claude-sonnet-4`).
pub fn rewrite_model_name(model: &str) -> String {
    if model.starts_with("claude-sonnet-4-") {
        return "claude-sonnet-4".to_string();
    }
    if model.starts_with("claude-opus-4-") {
        return "claude-opus-4".to_string();
    }
    model.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_dated_names() {
        assert_eq!(rewrite_model_name("claude-sonnet-4-20250514"), "claude-sonnet-4");
        assert_eq!(rewrite_model_name("claude-opus-4-1-20250805"), "claude-opus-4");
    }

    #[test]
    fn leaves_other_names_alone() {
        assert_eq!(rewrite_model_name("claude-sonnet-4"), "claude-sonnet-4");
        assert_eq!(rewrite_model_name("gpt-5.1-codex"), "gpt-5.1-codex");
        assert_eq!(rewrite_model_name("claude-haiku-3.5"), "claude-haiku-3.5");
    }
}
