//! Service metadata and health endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": "parlance-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "audio_ttl_seconds": state.artifacts.ttl().as_secs(),
        "endpoints": {
            "voice_webhook": "/voice",
            "voice_stream": "/voice-stream",
            "audio": "/audio/{id}",
            "media_stream": "/stream",
            "health": "/health",
        },
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "active_sessions": state.sessions.len(),
    }))
}
