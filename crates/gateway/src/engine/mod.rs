//! The conversational engine: per-event dispatch, the applicant form
//! sequencer, and the reviewer relay router.
//!
//! Control flow per inbound event: resolve the sender's [`PartyKey`],
//! take its run lock, then route: callback tokens go to the relay
//! router before any phase dispatch, reviewer messages always go to the
//! router, everything else advances the form sequencer.

pub mod relay;
pub mod sequencer;
pub mod texts;

use chrono::Utc;

use ir_domain::transport::{EventKind, InboundEvent};
use ir_sessions::PartyKey;

use crate::state::AppState;

/// Process one inbound event to completion.
///
/// Never returns an error: malformed input re-prompts, unauthorized
/// actors get a notice, delivery failures are logged and swallowed.
/// Only the per-key lock failing (runtime shutdown) drops an event.
pub async fn handle_event(state: &AppState, event: InboundEvent) {
    let key = PartyKey::from_event(&event);

    let _permit = match state.locks.acquire(&key).await {
        Ok(permit) => permit,
        Err(e) => {
            tracing::warn!(party_key = %key, error = %e, "dropping event, lock unavailable");
            return;
        }
    };

    let now = Utc::now();
    tracing::debug!(party_key = %key, "processing inbound event");

    match event.kind {
        EventKind::Callback { token, source } => {
            relay::handle_callback(state, key, &token, &source, now).await;
        }
        EventKind::Message { payload, reply_to } => {
            if event.sender == state.reviewer_id() {
                relay::handle_reviewer_message(state, key, payload, reply_to, now).await;
            } else {
                sequencer::advance(state, key, payload, now).await;
            }
        }
    }
}
