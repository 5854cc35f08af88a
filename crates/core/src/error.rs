//! Error types for the chatrelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates the
//! ones a chat request can hit.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all chatrelay operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Client input ---
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl Error {
    /// Whether the failure was caused by the caller rather than the relay
    /// or its upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// --- Bounded context errors ---

/// A chat request is missing something it needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No message")]
    MissingMessage,

    #[error("No session id")]
    MissingSessionId,

    #[error("Invalid history: {0}")]
    InvalidHistory(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status. `body` is the raw
    /// error payload exactly as the provider sent it.
    #[error("LLM error (status: {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Detail string suitable for the `details` field of an error response.
    pub fn details(&self) -> String {
        match self {
            Self::Upstream { body, .. } => body.clone(),
            Self::MalformedResponse(reason)
            | Self::NotConfigured(reason)
            | Self::Timeout(reason)
            | Self::Network(reason) => reason.clone(),
        }
    }
}

/// Failure to load the static knowledge corpus. Never fatal: callers log it
/// and continue with an empty corpus.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Knowledge source not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read knowledge source {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Malformed knowledge source {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}
