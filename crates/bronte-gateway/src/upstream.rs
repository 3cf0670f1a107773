//! Copilot-compatible upstream client.
//!
//! Owns the shared `reqwest::Client` and the per-request headers derived
//! from the payload (initiator, vision). Token acquisition and refresh are
//! out of scope: the bearer token comes from config and is used as-is.

use crate::catalog::{ModelCatalog, ModelEntry, RequestOptions};
use crate::error::GatewayError;
use bronte_config::BronteConfig;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct CopilotClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl CopilotClient {
    pub fn new(config: &BronteConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: config.base_url_trimmed(),
            token: config.upstream.token.clone(),
        }
    }

    /// POST a Chat Completions payload. The caller decides whether the
    /// response body is JSON or an SSE stream based on `stream`.
    pub async fn create_chat_completions(
        &self,
        payload: &Value,
        options: RequestOptions,
    ) -> Result<reqwest::Response, GatewayError> {
        self.post("/chat/completions", payload, options).await
    }

    /// POST a Responses payload.
    pub async fn create_responses(
        &self,
        payload: &Value,
        options: RequestOptions,
    ) -> Result<reqwest::Response, GatewayError> {
        self.post("/responses", payload, options).await
    }

    async fn post(
        &self,
        path: &str,
        payload: &Value,
        options: RequestOptions,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, initiator = options.initiator.as_str(), vision = options.vision, "upstream request");

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Openai-Intent", "conversation-edits")
            .header("X-Initiator", options.initiator.as_str())
            .header("X-Request-Id", Uuid::new_v4().to_string())
            .json(payload);
        if options.vision {
            request = request.header("Copilot-Vision-Request", "true");
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "upstream error");
            return Err(GatewayError::UpstreamStatus { status, body });
        }
        Ok(response)
    }

    /// Fetch the model catalog; the caller falls back to the seed list on
    /// failure.
    pub async fn list_models(&self) -> Result<ModelCatalog, GatewayError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UpstreamStatus { status, body });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::ResponseDecode(e.to_string()))?;
        let models: Vec<ModelEntry> = body
            .get("data")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| GatewayError::ResponseDecode(e.to_string()))?
            .unwrap_or_default();
        Ok(ModelCatalog::new(models))
    }
}
