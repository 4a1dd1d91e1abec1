//! Service metadata routes.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::handlers::api;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
}
