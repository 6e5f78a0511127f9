//! Authentication middleware
//!
//! Resolves the bearer key to a caller identity from the token table

use crate::handlers::AppState;
use crate::services::meta::TokenContext;
use crate::utils::error::RelayError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Token authentication middleware
///
/// Inserts a `TokenContext` extension for the relay handlers; missing or
/// unknown keys are rejected with 401.
pub async fn token_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(key) = extract_bearer_key(request.headers()) else {
        warn!("Missing authorization header");
        return RelayError::Unauthorized("missing api key".to_string()).into_response();
    };

    let Some(token) = state.config.tokens.get(key) else {
        warn!("Unknown api key {}", mask_key(key));
        return RelayError::Unauthorized("invalid api key".to_string()).into_response();
    };

    debug!("Authenticated token {} (group {})", token.id, token.group);
    let context = TokenContext {
        token_id: token.id.clone(),
        group: token.group.clone(),
    };
    request.extensions_mut().insert(context);

    next.run(request).await
}

/// Extract the key from `Authorization: Bearer <key>`
pub fn extract_bearer_key(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    let key = value.strip_prefix("Bearer ")?.trim();

    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some(key)
}

/// Keep only a short prefix of a key for logs
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{}***", prefix)
}
