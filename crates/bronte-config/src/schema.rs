use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Main bronte configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BronteConfig {
    /// Port the gateway listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upstream (Copilot-compatible) endpoint settings
    #[serde(default)]
    pub upstream: UpstreamSettings,

    /// Per-model behavior overrides
    #[serde(default)]
    pub models: ModelSettings,

    /// Upstream request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log token counts computed by the count-tokens endpoint
    #[serde(default)]
    pub show_tokens: bool,
}

/// Upstream endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Base URL of the Copilot-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent to the upstream. Obtaining and refreshing this
    /// token is out of scope; it is read once and used as-is.
    #[serde(default = "default_token")]
    pub token: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: default_token(),
        }
    }
}

/// Per-model behavior configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model used for warmup pings and other cheap internal calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_model: Option<String>,

    /// Reasoning effort overrides keyed by model id
    #[serde(default)]
    pub reasoning_effort: HashMap<String, ReasoningEffort>,

    /// Extra system prompt text appended per model id
    #[serde(default)]
    pub extra_prompt: HashMap<String, String>,
}

/// Reasoning effort requested from Responses-capable models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    #[default]
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

impl Default for BronteConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: UpstreamSettings::default(),
            models: ModelSettings::default(),
            request_timeout_secs: default_request_timeout_secs(),
            show_tokens: false,
        }
    }
}

impl BronteConfig {
    /// Reasoning effort for a model, defaulting to `high`.
    pub fn reasoning_effort_for(&self, model: &str) -> ReasoningEffort {
        self.models
            .reasoning_effort
            .get(model)
            .copied()
            .unwrap_or_default()
    }

    /// Model used for warmup pings. Falls back to `gpt-5-mini`.
    pub fn small_model(&self) -> &str {
        self.models.small_model.as_deref().unwrap_or("gpt-5-mini")
    }

    /// Extra system prompt configured for a model, if any.
    pub fn extra_prompt_for(&self, model: &str) -> Option<&str> {
        self.models.extra_prompt.get(model).map(|s| s.as_str())
    }

    pub fn base_url_trimmed(&self) -> String {
        self.upstream.base_url.trim_end_matches('/').to_string()
    }
}

fn default_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4141)
}

fn default_base_url() -> String {
    env::var("COPILOT_BASE_URL").unwrap_or_else(|_| "https://api.githubcopilot.com".to_string())
}

fn default_token() -> String {
    env::var("COPILOT_TOKEN").unwrap_or_default()
}

fn default_request_timeout_secs() -> u64 {
    env::var("REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_effort_defaults_to_high() {
        let config = BronteConfig::default();
        assert_eq!(
            config.reasoning_effort_for("gpt-5.1-codex"),
            ReasoningEffort::High
        );
    }

    #[test]
    fn reasoning_effort_override() {
        let mut config = BronteConfig::default();
        config
            .models
            .reasoning_effort
            .insert("gpt-5-mini".to_string(), ReasoningEffort::Low);
        assert_eq!(
            config.reasoning_effort_for("gpt-5-mini"),
            ReasoningEffort::Low
        );
        assert_eq!(
            config.reasoning_effort_for("gpt-5.2-codex"),
            ReasoningEffort::High
        );
    }

    #[test]
    fn effort_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ReasoningEffort::Minimal).unwrap(),
            "\"minimal\""
        );
        assert_eq!(ReasoningEffort::Medium.as_str(), "medium");
    }
}
