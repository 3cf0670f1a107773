//! Axum HTTP server.
//!
//! Exposes the three client dialects plus catalog and health endpoints:
//! - `POST /v1/chat/completions`
//! - `POST /v1/messages`
//! - `POST /v1/messages/count_tokens`
//! - `POST /v1/responses`
//! - `GET /v1/models`
//! - `GET /health`

use std::sync::Arc;

use crate::catalog::{derive_options, ModelCatalog, UpstreamDialect};
use crate::dialect::anthropic::{MessagesRequest, TokenCountRequest, TokenCountResponse};
use crate::dialect::chat::{ChatRequest, ChatResponse};
use crate::dialect::responses::ResponsesResponse;
use crate::error::GatewayError;
use crate::stream;
use crate::tokenizer;
use crate::translate;
use crate::translate::model::rewrite_model_name;
use crate::upstream::CopilotClient;
use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bronte_config::BronteConfig;
use futures::{Stream, StreamExt, TryStreamExt};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    config: Arc<BronteConfig>,
    catalog: Arc<ModelCatalog>,
    upstream: CopilotClient,
}

/// Create an Axum router for the gateway.
pub fn create_app(config: BronteConfig, catalog: ModelCatalog) -> Router {
    let upstream = CopilotClient::new(&config);
    let state = AppState {
        config: Arc::new(config),
        catalog: Arc::new(catalog),
        upstream,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/models", get(handle_models))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/messages", post(handle_messages))
        .route("/v1/messages/count_tokens", post(handle_count_tokens))
        .route("/v1/responses", post(handle_responses))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the gateway.
pub async fn serve(config: BronteConfig) -> Result<()> {
    let upstream = CopilotClient::new(&config);
    let catalog = match upstream.list_models().await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(error = %e, "model catalog fetch failed, using built-in seed list");
            ModelCatalog::seed()
        }
    };

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_app(config, catalog);
    info!(%addr, "bronte gateway listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn handle_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.catalog.as_openai_list())
}

async fn handle_chat_completions(
    State(state): State<AppState>,
    Json(mut req): Json<ChatRequest>,
) -> Result<Response<Body>, GatewayError> {
    let streaming = req.stream.unwrap_or(false);
    let dialect = state.catalog.upstream_dialect(&req.model);
    debug!(model = %req.model, ?dialect, streaming, "chat/completions request");

    if req.max_tokens.is_none() {
        req.max_tokens = state
            .catalog
            .get(&req.model)
            .and_then(|m| m.capabilities.limits.max_output_tokens);
    }

    match dialect {
        UpstreamDialect::Responses => {
            let effort = state.config.reasoning_effort_for(&req.model);
            let payload = translate::chat_to_responses::translate_request(&req, effort);
            let payload =
                serde_json::to_value(&payload).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
            let options = derive_options(&payload);
            let upstream = state.upstream.create_responses(&payload, options).await?;

            if streaming {
                return Ok(sse_response(stream::responses_to_chat::sse_stream(
                    upstream,
                    req.model.clone(),
                )));
            }

            let result: ResponsesResponse = upstream
                .json()
                .await
                .map_err(|e| GatewayError::ResponseDecode(e.to_string()))?;
            let chat = translate::responses_to_chat::translate_response(&result);
            Ok(Json(chat).into_response())
        }
        UpstreamDialect::ChatCompletions => {
            // Same dialect on both sides: forward as-is.
            let payload =
                serde_json::to_value(&req).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
            let options = derive_options(&payload);
            let upstream = state
                .upstream
                .create_chat_completions(&payload, options)
                .await?;

            if streaming {
                return Ok(passthrough_sse(upstream));
            }

            let body: serde_json::Value = upstream
                .json()
                .await
                .map_err(|e| GatewayError::ResponseDecode(e.to_string()))?;
            Ok(Json(body).into_response())
        }
    }
}

async fn handle_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<MessagesRequest>,
) -> Result<Response<Body>, GatewayError> {
    // Claude Code warms the connection with a tool-less ping alongside the
    // `anthropic-beta` header; those go to the cheap model.
    let tools_empty = req.tools.as_ref().map(|t| t.is_empty()).unwrap_or(true);
    if headers.contains_key("anthropic-beta") && tools_empty {
        debug!(model = %req.model, small = %state.config.small_model(), "warmup request rewrite");
        req.model = state.config.small_model().to_string();
    }

    let model = rewrite_model_name(&req.model);
    let streaming = req.stream.unwrap_or(false);
    let dialect = state.catalog.upstream_dialect(&model);
    debug!(%model, ?dialect, streaming, "messages request");

    match dialect {
        UpstreamDialect::Responses => {
            let payload = translate::anthropic_to_responses::translate_request(
                &req,
                state.config.extra_prompt_for(&model),
            );
            let payload =
                serde_json::to_value(&payload).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
            let options = derive_options(&payload);
            let upstream = state.upstream.create_responses(&payload, options).await?;

            if streaming {
                return Ok(sse_response(stream::responses_to_anthropic::sse_stream(
                    upstream, model,
                )));
            }

            let result: ResponsesResponse = upstream
                .json()
                .await
                .map_err(|e| GatewayError::ResponseDecode(e.to_string()))?;
            let anthropic =
                translate::responses_to_anthropic::translate_response(&result, &model);
            Ok(Json(anthropic).into_response())
        }
        UpstreamDialect::ChatCompletions => {
            let payload = translate::anthropic_to_chat::translate_request(&req);
            let payload =
                serde_json::to_value(&payload).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
            let options = derive_options(&payload);
            let upstream = state
                .upstream
                .create_chat_completions(&payload, options)
                .await?;

            if streaming {
                return Ok(sse_response(stream::chat_to_anthropic::sse_stream(
                    upstream, model,
                )));
            }

            let result: ChatResponse = upstream
                .json()
                .await
                .map_err(|e| GatewayError::ResponseDecode(e.to_string()))?;
            let anthropic = translate::chat_to_anthropic::translate_response(&result, &model);
            Ok(Json(anthropic).into_response())
        }
    }
}

async fn handle_count_tokens(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TokenCountRequest>,
) -> Result<Response<Body>, GatewayError> {
    // Count against the payload the upstream would actually see.
    let messages_req = MessagesRequest {
        model: req.model.clone(),
        messages: req.messages,
        system: req.system,
        max_tokens: 1,
        stream: None,
        temperature: None,
        top_p: None,
        top_k: None,
        stop_sequences: None,
        tools: req.tools,
        tool_choice: None,
        thinking: None,
        metadata: None,
    };
    let payload = translate::anthropic_to_chat::translate_request(&messages_req);
    let count = tokenizer::count_tokens(&payload);

    let has_tools = messages_req
        .tools
        .as_ref()
        .map(|t| !t.is_empty())
        .unwrap_or(false);
    let has_mcp_tools = messages_req
        .tools
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|t| t.name.starts_with("mcp__"));
    let claude_code_client = headers
        .get("anthropic-beta")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("claude-code"))
        .unwrap_or(false);

    let apply_tool_overhead = has_tools && !has_mcp_tools && claude_code_client;
    let input_tokens = tokenizer::adjust_for_model(count.input, &req.model, apply_tool_overhead);

    if state.config.show_tokens {
        info!(model = %req.model, input_tokens, "token count estimate");
    }

    Ok(Json(TokenCountResponse { input_tokens }).into_response())
}

async fn handle_responses(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response<Body>, GatewayError> {
    let model = payload
        .get("model")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::InvalidRequest("missing model".to_string()))?;
    if !state.catalog.supports_responses(model) {
        return Err(GatewayError::UnknownModel {
            model: model.to_string(),
        });
    }

    let streaming = payload
        .get("stream")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let options = derive_options(&payload);
    let upstream = state.upstream.create_responses(&payload, options).await?;

    if streaming {
        return Ok(passthrough_sse(upstream));
    }

    let body: serde_json::Value = upstream
        .json()
        .await
        .map_err(|e| GatewayError::ResponseDecode(e.to_string()))?;
    Ok(Json(body).into_response())
}

/// Wrap a translated frame stream as an SSE response.
fn sse_response<S>(frames: S) -> Response<Body>
where
    S: Stream<Item = anyhow::Result<String>> + Send + 'static,
{
    let mut resp = Response::new(Body::from_stream(frames.map(|r| r.map(Bytes::from))));
    set_sse_headers(&mut resp);
    resp
}

/// Forward an upstream SSE body unchanged.
fn passthrough_sse(upstream: reqwest::Response) -> Response<Body> {
    let stream = upstream.bytes_stream().map_err(std::io::Error::other);
    let mut resp = Response::new(Body::from_stream(stream));
    set_sse_headers(&mut resp);
    resp
}

fn set_sse_headers(resp: &mut Response<Body>) {
    *resp.status_mut() = StatusCode::OK;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    resp.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
}
