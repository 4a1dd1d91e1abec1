//! Audio artifact retrieval.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Serve one cached synthesized payload. Expired or unknown ids are 404;
/// the telephony provider falls through to the next markup verb.
pub async fn get_audio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let artifact = state
        .artifacts
        .get(&id)
        .await
        .ok_or(AppError::ArtifactNotFound)?;

    Ok((
        [(header::CONTENT_TYPE, artifact.content_type.clone())],
        artifact.payload,
    )
        .into_response())
}
