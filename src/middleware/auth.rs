//! Optional shared-token authentication for webhook and stream routes.
//!
//! When `auth_token` is unset the layer passes everything through, which is
//! the common deployment behind a private tunnel. When set, callers present
//! the token either as a `Bearer` header or as a `token` query parameter
//! (the query form exists because telephony stream URLs cannot carry
//! headers).

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::errors::app_error::AppError;
use crate::state::AppState;

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.auth_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = bearer_token(&request).or_else(|| query_token(&request));
    match presented {
        Some(token) if token_matches(&token, expected) => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
}

fn query_token(request: &Request) -> Option<String> {
    let query = request.uri().query()?;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("token=") {
            return Some(value.to_string());
        }
    }
    None
}

/// Constant-time comparison so the check leaks nothing about prefix length.
fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison_is_exact() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secre", "secret"));
        assert!(!token_matches("secrets", "secret"));
        assert!(!token_matches("", "secret"));
    }
}
