//! Error taxonomy for the call session orchestrator.
//!
//! Each unreliable boundary gets its own error enum so the recovery policy
//! can be applied at the right layer:
//!
//! - [`UpstreamError`]: completion provider failures, recovered inside the
//!   completion adapter via retry-then-fallback.
//! - [`SynthesisError`]: TTS provider failures, recovered at the turn engine
//!   by degrading to a literal-text reply.
//! - [`TransportError`]: either peer connection of the streaming relay
//!   failing; closes both peers.
//! - [`AppError`]: the handler-level error that maps onto HTTP responses.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Completion provider failure (network, HTTP status, timeout, bad payload).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion provider returned status {0}")]
    Status(u16),

    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion response carried no usable choice")]
    MalformedResponse,
}

/// Speech synthesis provider failure. No automatic retry; the turn engine
/// falls back to a literal-text reply instead.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("synthesis provider returned status {0}")]
    Status(u16),

    #[error("synthesis request timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure on either peer connection of the streaming relay.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telephony stream error: {0}")]
    Telephony(String),

    #[error("provider stream error: {0}")]
    Provider(String),

    #[error("provider handshake failed: {0}")]
    Handshake(String),
}

/// Application-level error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Operating on an evicted or unknown call id. Callers treat this as
    /// "start fresh" rather than fatal; it only surfaces on lookups that
    /// cannot create a session.
    #[error("unknown call session: {0}")]
    SessionNotFound(String),

    #[error("audio artifact not found or expired")]
    ArtifactNotFound,

    #[error("missing or invalid authentication token")]
    Unauthorized,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upstream(_) | AppError::Synthesis(_) => StatusCode::BAD_GATEWAY,
            AppError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SessionNotFound(_) | AppError::ArtifactNotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = axum::Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_not_found_maps_to_404() {
        assert_eq!(
            AppError::ArtifactNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn upstream_maps_to_bad_gateway() {
        let err = AppError::Upstream(UpstreamError::Status(500));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        assert_eq!(
            AppError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
