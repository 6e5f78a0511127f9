//! Relay handlers
//!
//! POST /v1/chat/completions, /v1/completions and /v1/embeddings

use crate::handlers::AppState;
use crate::services::meta::{RelayMode, TokenContext};
use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Handle chat completion requests
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<TokenContext>,
    body: Bytes,
) -> Response {
    relay_for_mode(state, token, RelayMode::ChatCompletions, body).await
}

/// Handle legacy completion requests
pub async fn completions(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<TokenContext>,
    body: Bytes,
) -> Response {
    relay_for_mode(state, token, RelayMode::Completions, body).await
}

/// Handle embedding requests
pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<TokenContext>,
    body: Bytes,
) -> Response {
    relay_for_mode(state, token, RelayMode::Embeddings, body).await
}

#[instrument(skip(state, body), fields(token_id = %token.token_id, mode = ?mode))]
async fn relay_for_mode(state: Arc<AppState>, token: TokenContext, mode: RelayMode, body: Bytes) -> Response {
    info!("Relaying {} bytes to channel {}", body.len(), state.relay.channel().id);

    match state.relay.relay_text(&token, mode, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
