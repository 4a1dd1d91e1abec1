//! Route table assembly.

pub mod api;
pub mod stream;
pub mod voice;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::auth::require_auth;
use crate::state::AppState;

/// Assemble the full application router. Call-flow and stream routes sit
/// behind the shared-token layer (a no-op when no token is configured);
/// metadata routes stay public.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = voice::router().merge(stream::router()).layer(
        axum_middleware::from_fn_with_state(state.clone(), require_auth),
    );

    api::router()
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
