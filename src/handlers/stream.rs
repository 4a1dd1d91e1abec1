//! Media stream WebSocket upgrade.

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::SinkExt;

use crate::core::relay::{ProviderSocket, RelayConfig, StreamBridge};
use crate::state::AppState;

/// Upgrade the telephony connection and run the relay bridge for the life
/// of the call.
pub async fn media_stream(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_bridge(state, socket))
}

async fn run_bridge(state: Arc<AppState>, mut telephony: WebSocket) {
    let api_key = state.config.openai_api_key.clone().unwrap_or_default();

    let provider = match ProviderSocket::connect(
        &state.config.realtime_url,
        &api_key,
        &state.config.realtime_model,
    )
    .await
    {
        Ok(socket) => socket,
        Err(e) => {
            tracing::error!(error = %e, "realtime provider connection failed");
            let _ = telephony.close().await;
            return;
        }
    };

    let config = RelayConfig {
        persona: state.config.persona_instructions.clone(),
        voice: state.config.realtime_voice.clone(),
        keepalive_interval: state.config.keepalive_interval(),
    };

    StreamBridge::new(telephony, provider, config, state.sessions.clone())
        .run()
        .await;
}
