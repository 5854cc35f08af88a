//! HTTP gateway for chatrelay.
//!
//! Exposes the chat relay endpoints and a health check over Axum, with
//! permissive-by-default CORS, a 1 MB body limit and request tracing.

pub mod chat_api;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use chatrelay_agent::{ChatService, PromptAssembler};
use chatrelay_config::AppConfig;
use chatrelay_core::error::ProviderError;
use chatrelay_core::persona::Persona;
use chatrelay_memory::{KnowledgeStore, SessionStore};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub chat: ChatService,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat,
            started_at: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Server error: {0}")]
    Serve(String),
}

/// Build the full router.
///
/// Layers applied:
/// - CORS (any origin unless `allowed_origins` is non-empty)
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState, allowed_origins: &[String]) -> Router {
    chat_api::chat_router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS policy. Origins that fail to parse as header values are skipped.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Wire provider, persona, corpus and session store from configuration.
///
/// Persona and corpus problems are logged and degrade gracefully; a missing
/// API key does not.
pub fn build_chat_service(config: &AppConfig) -> Result<ChatService, GatewayError> {
    let provider = chatrelay_providers::build_from_config(config)?;

    let persona = Persona::load(config.persona.text.as_deref(), config.persona.path.as_deref());
    info!(source = ?persona.source, "Persona loaded");

    let knowledge = KnowledgeStore::load(config.knowledge.path.as_deref(), config.knowledge.chunk_size);

    let sessions = SessionStore::new(config.session.max_turns, config.session.max_sessions)
        .with_idle_ttl(Duration::from_secs(config.session.idle_ttl_secs));

    Ok(ChatService::new(
        Arc::new(provider),
        Arc::new(sessions),
        Arc::new(knowledge),
        persona,
        config.model_config(),
    )
    .with_match_limit(config.knowledge.match_limit)
    .with_assembler(PromptAssembler::new(config.knowledge.header.clone())))
}

/// Start the gateway HTTP server and run until Ctrl+C.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = config.listen_addr();
    let chat = build_chat_service(&config)?;
    let state = Arc::new(GatewayState::new(chat));
    let app = build_router(state, &config.gateway.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

    info!(addr = %addr, model = %config.provider.model, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Serve(e.to_string()))?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
