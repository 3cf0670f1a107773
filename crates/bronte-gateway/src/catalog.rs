//! Model catalog, upstream routing and request-side option derivation.
//!
//! The catalog is fetched once at startup and shared read-only across
//! request tasks. Routing consults each model's `supported_endpoints`: a
//! model listing `/responses` talks to the Responses upstream, everything
//! else to Chat Completions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which upstream dialect a request will be sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamDialect {
    ChatCompletions,
    Responses,
}

/// Request-side metadata derived from the upstream payload; feeds the
/// headers set by the upstream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// At least one input image is present.
    pub vision: bool,
    /// `"agent"` when any input item has an assistant (or absent) role.
    pub initiator: Initiator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Agent,
    User,
}

impl Initiator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Initiator::Agent => "agent",
            Initiator::User => "user",
        }
    }
}

/// One catalog entry, as served by the upstream `/models` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub supported_endpoints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// Read-mostly model catalog.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelEntry>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelEntry>) -> Self {
        Self { models }
    }

    /// Minimal built-in catalog used when the startup fetch fails, so the
    /// gateway still boots offline.
    pub fn seed() -> Self {
        let responses = vec!["/responses".to_string(), "/chat/completions".to_string()];
        let chat = vec!["/chat/completions".to_string()];
        Self::new(vec![
            ModelEntry {
                id: "gpt-5.1-codex".to_string(),
                capabilities: Capabilities::default(),
                supported_endpoints: responses.clone(),
            },
            ModelEntry {
                id: "gpt-5.2-codex".to_string(),
                capabilities: Capabilities::default(),
                supported_endpoints: responses,
            },
            ModelEntry {
                id: "gpt-5-mini".to_string(),
                capabilities: Capabilities::default(),
                supported_endpoints: chat.clone(),
            },
            ModelEntry {
                id: "claude-sonnet-4".to_string(),
                capabilities: Capabilities::default(),
                supported_endpoints: chat.clone(),
            },
            ModelEntry {
                id: "claude-opus-4".to_string(),
                capabilities: Capabilities::default(),
                supported_endpoints: chat,
            },
        ])
    }

    pub fn get(&self, model: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id == model)
    }

    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    /// Pick the upstream dialect for a model. Unknown models fall back to
    /// Chat Completions; the upstream is the authority on what exists.
    pub fn upstream_dialect(&self, model: &str) -> UpstreamDialect {
        if self.supports_responses(model) {
            UpstreamDialect::Responses
        } else {
            UpstreamDialect::ChatCompletions
        }
    }

    pub fn supports_responses(&self, model: &str) -> bool {
        self.get(model)
            .map(|m| m.supported_endpoints.iter().any(|e| e == "/responses"))
            .unwrap_or(false)
    }

    /// OpenAI-style projection for `GET /v1/models`.
    pub fn as_openai_list(&self) -> Value {
        serde_json::json!({
            "object": "list",
            "data": self
                .models
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "id": m.id,
                        "object": "model",
                        "owned_by": "copilot",
                    })
                })
                .collect::<Vec<_>>(),
        })
    }
}

/// Derive the vision flag and initiator from a serialized upstream payload.
///
/// Works on the generic JSON form so the same scan covers Responses `input`
/// items, chat `messages`, and pass-through payloads.
pub fn derive_options(payload: &Value) -> RequestOptions {
    let items = payload
        .get("input")
        .or_else(|| payload.get("messages"))
        .and_then(|v| v.as_array());

    let Some(items) = items else {
        return RequestOptions {
            vision: false,
            initiator: Initiator::User,
        };
    };

    let vision = items.iter().any(contains_image);

    let agent = items.iter().any(|item| {
        match item.get("role") {
            Some(role) => role.as_str() == Some("assistant"),
            // Items without a role (function calls, reasoning) come from a
            // prior model turn.
            None => true,
        }
    });

    RequestOptions {
        vision,
        initiator: if agent {
            Initiator::Agent
        } else {
            Initiator::User
        },
    }
}

/// Recursive scan for image content (`input_image` parts or `image_url`
/// parts) anywhere in an item.
fn contains_image(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(|v| v.as_str()) == Some("input_image") {
                return true;
            }
            if map.get("type").and_then(|v| v.as_str()) == Some("image_url") {
                return true;
            }
            map.values().any(contains_image)
        }
        Value::Array(arr) => arr.iter().any(contains_image),
        _ => false,
    }
}
