//! Chat endpoints.
//!
//! - `POST /chat`, `POST /api/chat`: relay one message, get the reply
//! - `GET  /health`: liveness plus corpus size
//!
//! Request body: `{"message": "...", "sessionId": "...", "history": [...]}`.
//! `text` is accepted for `message` and `session_id` for `sessionId`.

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use chatrelay_agent::ChatInput;
use chatrelay_core::error::{Error, ProviderError};
use chatrelay_core::message::Turn;

use crate::SharedState;

pub fn chat_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "text")]
    pub message: Option<String>,
    #[serde(default, rename = "sessionId", alias = "session_id")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<Turn>>,
}

impl From<ChatRequest> for ChatInput {
    fn from(req: ChatRequest) -> Self {
        ChatInput {
            message: req.message,
            session_id: req.session_id,
            history: req.history,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub fragments: usize,
    pub sessions: usize,
    pub uptime_secs: i64,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            details: None,
        }),
    )
}

/// Translate a pipeline error into a status and JSON body.
fn error_response(err: Error) -> ApiError {
    match err {
        Error::Validation(e) => {
            warn!(error = %e, "Invalid chat request");
            bad_request(e.to_string())
        }
        Error::Provider(e) => {
            let label = match e {
                ProviderError::Upstream { .. } | ProviderError::MalformedResponse(_) => {
                    "LLM error"
                }
                _ => "server error",
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: label.into(),
                    details: Some(e.details()),
                }),
            )
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(reason = %rejection.body_text(), "Rejected chat body");
        let (status, body) = bad_request(rejection.body_text());
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => (StatusCode::PAYLOAD_TOO_LARGE, body),
            _ => (status, body),
        }
    })?;

    let outcome = state
        .chat
        .handle(request.into())
        .await
        .map_err(error_response)?;

    info!(
        session_id = %outcome.session_id,
        fragments = outcome.fragments_used,
        turns = outcome.history_len,
        "Chat reply sent"
    );
    Ok(Json(ChatResponse {
        reply: outcome.reply,
    }))
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime = chrono::Utc::now() - state.started_at;
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        fragments: state.chat.knowledge().len(),
        sessions: state.chat.sessions().len().await,
        uptime_secs: uptime.num_seconds(),
    })
}
