use std::sync::Arc;

use ir_domain::config::Config;
use ir_domain::transport::Transport;
use ir_sessions::{PartyLockMap, SessionStore};

use crate::engine::relay::ReplyIdPatterns;

/// Shared application state passed to all API handlers and engine code.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Outbound side of the chat transport.
    pub transport: Arc<dyn Transport>,
    /// Per-party session state.
    pub sessions: Arc<SessionStore>,
    /// Per-party run locks: one event at a time per key.
    pub locks: Arc<PartyLockMap>,
    /// Precompiled reply-correlation id patterns (compiled once at startup).
    pub reply_patterns: Arc<ReplyIdPatterns>,
}

impl AppState {
    /// Party id of the configured reviewer.
    pub fn reviewer_id(&self) -> i64 {
        self.config.review.reviewer_id
    }
}
