//! Gateway error types
//!
//! Errors that reach the HTTP boundary render as the
//! `{"error": {"type", "message"}}` body shared by the OpenAI and Anthropic
//! dialects. Translation itself never produces errors: every malformed input
//! has a defined recovery (see `translate::arguments`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Upstream returned a non-success status.
    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// Network-level failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Requested model is absent from the catalog or lacks the endpoint.
    #[error("model not supported: {model}")]
    UnknownModel { model: String },

    /// Request is malformed in a way translation cannot recover from.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream body could not be decoded as the expected dialect.
    #[error("failed to decode upstream response: {0}")]
    ResponseDecode(String),
}

impl GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::Upstream(_) | GatewayError::ResponseDecode(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UnknownModel { .. } | GatewayError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            GatewayError::UnknownModel { .. } | GatewayError::InvalidRequest(_) => {
                "invalid_request_error"
            }
            _ => "api_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_is_invalid_request() {
        let err = GatewayError::UnknownModel {
            model: "nope".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type(), "invalid_request_error");
    }

    #[test]
    fn upstream_status_passes_through() {
        let err = GatewayError::UpstreamStatus {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.error_type(), "api_error");
    }
}
