pub mod inbound;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the gateway router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/inbound", post(inbound::inbound))
        .route("/healthz", get(inbound::health))
}
