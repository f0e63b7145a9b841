//! Inbound channel contract: the normalized envelope connectors post.
//!
//! `POST /v1/inbound` is the single entry point for every inbound chat
//! event.  The event is processed to completion before the response is
//! returned; outbound sends go out through the webhook transport, not
//! through this response.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use ir_domain::transport::InboundEvent;

use crate::engine;
use crate::state::AppState;

/// POST /v1/inbound
pub async fn inbound(
    State(state): State<AppState>,
    Json(event): Json<InboundEvent>,
) -> impl IntoResponse {
    let sender = event.sender;
    engine::handle_event(&state, event).await;

    Json(serde_json::json!({
        "status": "processed",
        "sender": sender,
    }))
}

/// GET /healthz
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": state.sessions.len(),
    }))
}
