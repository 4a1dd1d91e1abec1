//! Media stream WebSocket route.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::handlers::stream;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stream", get(stream::media_stream))
}
