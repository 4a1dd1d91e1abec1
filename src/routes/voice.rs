//! Webhook call-flow routes: voice turns and audio playback.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{audio, voice};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voice", post(voice::voice_webhook))
        .route("/voice-stream", post(voice::voice_stream))
        .route("/audio/{id}", get(audio::get_audio))
}
