//! API key middleware.
//!
//! Rejects any request whose `api_key` query parameter does not match the
//! configured key. The wrapped handler never runs for rejected requests.

use axum::{
    body::Body,
    extract::{Query, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::config::ApiKey;
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
struct ApiKeyParam {
    api_key: Option<String>,
}

/// Authentication middleware handler.
///
/// Install with `axum::middleware::from_fn_with_state(api_key, api_key_middleware)`.
pub async fn api_key_middleware(
    State(expected): State<ApiKey>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    match extract_api_key(&req) {
        Some(candidate) if expected.matches(&candidate) => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(uri = %req.uri().path(), "rejected request with wrong API key");
            Err(AppError::Unauthorized)
        }
        None => {
            tracing::warn!(uri = %req.uri().path(), "rejected request without API key");
            Err(AppError::Unauthorized)
        }
    }
}

/// Extracts the `api_key` query parameter, if any.
pub fn extract_api_key(req: &Request<Body>) -> Option<String> {
    Query::<ApiKeyParam>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(param)| param.api_key)
}
