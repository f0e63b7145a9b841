//! The applicant form sequencer: a finite state machine ordered as a
//! pipeline, driven one inbound payload at a time.
//!
//! Out-of-turn input (wrong payload kind, empty text) re-prompts and
//! leaves the phase untouched, so retries are idempotent.  The only
//! self-transition is the evidence-photo loop, gated on the done
//! sentinel plus a non-zero photo count.
//!
//! Every write-back is conditioned on the phase still being the one
//! this handler read.  A reviewer decision landing from another key's
//! handler between the read and the write wins; the stale write-back
//! is dropped.

use chrono::{DateTime, Utc};

use ir_domain::trace::TraceEvent;
use ir_domain::transport::{Payload, ProofKind};
use ir_sessions::{PartyKey, Phase, ProofMedia, SessionState};

use crate::engine::relay::{self, contact_keyboard};
use crate::engine::texts::{self, FIELDS};
use crate::state::AppState;

/// Advance an applicant's session with one inbound payload.
pub async fn advance(state: &AppState, key: PartyKey, payload: Payload, now: DateTime<Utc>) {
    // The reset command wins over any phase.
    if let Some(text) = payload.as_text() {
        if text.trim() == state.config.form.reset_command {
            state.sessions.reset(&key, "reset command", now);
            begin_form(state, key, now).await;
            return;
        }
    }

    let (session, _is_new) = state.sessions.get_or_create(&key, now);

    match session.phase {
        Phase::Idle => {
            // First contact: greet and ask the first field.  The
            // triggering payload is not consumed as an answer.
            begin_form(state, key, now).await;
        }
        Phase::CollectingField { index } => {
            collect_field(state, key, index, &payload, now).await;
        }
        Phase::CollectingMedia => {
            collect_media(state, key, session, &payload, now).await;
        }
        Phase::CollectingProof => {
            collect_proof(state, key, &payload, now).await;
        }
        Phase::UnderReview => {
            // A second submission is impossible here by construction;
            // everything the applicant sends is answered with a wait
            // notice and no state change.
            relay::send_text(
                state,
                key.party,
                texts::UNDER_REVIEW_NOTICE,
                Some(contact_keyboard()),
            )
            .await;
        }
        Phase::CollectingFollowup => {
            collect_followup(state, key, &payload, now).await;
        }
        Phase::Done => {
            relay::send_text(
                state,
                key.party,
                texts::DONE_NOTICE,
                Some(contact_keyboard()),
            )
            .await;
        }
        Phase::RelayDialog => {
            relay::forward_to_reviewer(state, key, &payload, now).await;
        }
        Phase::AwaitingRelayReply => {
            // Reviewer-only phase; an applicant session can never
            // legitimately carry it.
            tracing::warn!(party_key = %key, "applicant session in reviewer-only phase");
            relay::send_text(
                state,
                key.party,
                &texts::reset_notice(&state.config.form.reset_command),
                None,
            )
            .await;
        }
    }
}

/// Greet and arm the first form field.
async fn begin_form(state: &AppState, key: PartyKey, now: DateTime<Utc>) {
    let updated = state.sessions.update(&key, now, |s| {
        s.phase = Phase::CollectingField { index: 0 };
    });
    TraceEvent::PhaseChanged {
        party_key: key.to_string(),
        from: Phase::Idle.label(),
        to: updated.phase.label(),
    }
    .emit();

    relay::send_text(state, key.party, texts::GREETING, None).await;
    relay::send_text(state, key.party, FIELDS[0].prompt, None).await;
}

async fn collect_field(
    state: &AppState,
    key: PartyKey,
    index: usize,
    payload: &Payload,
    now: DateTime<Utc>,
) {
    let field = &FIELDS[index];

    let answer = match payload.as_text().map(str::trim) {
        Some(text) if !text.is_empty() => {
            if field.normalize_none {
                texts::normalize_contact(text)
            } else {
                text.to_owned()
            }
        }
        // Wrong payload kind or empty text: re-prompt, no state change.
        _ => {
            let reprompt = format!("{}\n\n{}", texts::TEXT_EXPECTED, field.prompt);
            relay::send_text(state, key.party, &reprompt, None).await;
            return;
        }
    };

    let next = index + 1;
    let applied = state.sessions.update_if(
        &key,
        now,
        |s| s.phase == (Phase::CollectingField { index }),
        |s| {
            s.draft.answers.push(answer);
            s.phase = if next < FIELDS.len() {
                Phase::CollectingField { index: next }
            } else {
                Phase::CollectingMedia
            };
        },
    );
    if applied.is_none() {
        tracing::debug!(party_key = %key, "phase moved concurrently, dropping field answer");
        return;
    }

    if next < FIELDS.len() {
        relay::send_text(state, key.party, FIELDS[next].prompt, None).await;
    } else {
        TraceEvent::PhaseChanged {
            party_key: key.to_string(),
            from: format!("collecting_field_{index}"),
            to: Phase::CollectingMedia.label(),
        }
        .emit();
        relay::send_text(
            state,
            key.party,
            &texts::evidence_prompt(&state.config.form.done_word),
            None,
        )
        .await;
    }
}

async fn collect_media(
    state: &AppState,
    key: PartyKey,
    session: SessionState,
    payload: &Payload,
    now: DateTime<Utc>,
) {
    let done_word = &state.config.form.done_word;

    match payload {
        Payload::Photo { .. } => {
            let Some(best) = payload.best_photo() else {
                relay::send_text(state, key.party, texts::EVIDENCE_PHOTO_EXPECTED, None).await;
                return;
            };
            let applied = state.sessions.update_if(
                &key,
                now,
                |s| s.phase == Phase::CollectingMedia,
                |s| s.draft.evidence.push(best.clone()),
            );
            if applied.is_none() {
                tracing::debug!(party_key = %key, "phase moved concurrently, dropping photo");
                return;
            }
            relay::send_text(state, key.party, &texts::evidence_saved(done_word), None).await;
        }
        Payload::Text { text } if texts::is_done_word(text, done_word) => {
            // The gate: the sentinel only advances with ≥ 1 photo collected.
            if session.draft.evidence.is_empty() {
                relay::send_text(state, key.party, texts::EVIDENCE_NONE_YET, None).await;
                return;
            }
            let applied = state.sessions.update_if(
                &key,
                now,
                |s| s.phase == Phase::CollectingMedia && !s.draft.evidence.is_empty(),
                |s| s.phase = Phase::CollectingProof,
            );
            if applied.is_none() {
                tracing::debug!(party_key = %key, "phase moved concurrently, dropping sentinel");
                return;
            }
            TraceEvent::PhaseChanged {
                party_key: key.to_string(),
                from: Phase::CollectingMedia.label(),
                to: Phase::CollectingProof.label(),
            }
            .emit();
            relay::send_text(state, key.party, texts::PROOF_PROMPT, None).await;
        }
        _ => {
            relay::send_text(state, key.party, texts::EVIDENCE_PHOTO_EXPECTED, None).await;
        }
    }
}

async fn collect_proof(state: &AppState, key: PartyKey, payload: &Payload, now: DateTime<Utc>) {
    let proof = match payload {
        Payload::Photo { .. } => payload.best_photo().map(|media| ProofMedia {
            media: media.clone(),
            kind: ProofKind::Photo,
        }),
        Payload::Video { media, .. } => Some(ProofMedia {
            media: media.clone(),
            kind: ProofKind::Video,
        }),
        Payload::RoundVideo { media } => Some(ProofMedia {
            media: media.clone(),
            kind: ProofKind::RoundVideo,
        }),
        _ => None,
    };

    let Some(proof) = proof else {
        relay::send_text(state, key.party, texts::PROOF_EXPECTED, None).await;
        return;
    };

    // Advance first: a transport failure while forwarding must not
    // strand the applicant, and a submission is never resent.
    let mut questionnaire = None;
    let applied = state.sessions.update_if(
        &key,
        now,
        |s| s.phase == Phase::CollectingProof,
        |s| {
            s.draft.proof = Some(proof);
            if let Some(q) = s.submit(key) {
                s.phase = Phase::UnderReview;
                questionnaire = Some(q);
            }
        },
    );
    if applied.is_none() {
        tracing::debug!(party_key = %key, "phase moved concurrently, dropping proof");
        return;
    }
    let Some(questionnaire) = questionnaire else {
        relay::send_text(state, key.party, texts::PROOF_EXPECTED, None).await;
        return;
    };

    TraceEvent::PhaseChanged {
        party_key: key.to_string(),
        from: Phase::CollectingProof.label(),
        to: Phase::UnderReview.label(),
    }
    .emit();

    relay::submit_review(state, &questionnaire).await;

    relay::send_text(
        state,
        key.party,
        texts::SUBMITTED_NOTICE,
        Some(contact_keyboard()),
    )
    .await;
}

async fn collect_followup(state: &AppState, key: PartyKey, payload: &Payload, now: DateTime<Utc>) {
    let details = match payload.as_text().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_owned(),
        _ => {
            relay::send_text(state, key.party, texts::TEXT_EXPECTED, None).await;
            return;
        }
    };

    let applied = state.sessions.update_if(
        &key,
        now,
        |s| s.phase == Phase::CollectingFollowup,
        |s| s.phase = Phase::Done,
    );
    if applied.is_none() {
        tracing::debug!(party_key = %key, "phase moved concurrently, dropping follow-up");
        return;
    }

    // Forwarded verbatim; a delivery failure is logged and swallowed.
    relay::send_text(
        state,
        state.reviewer_id(),
        &texts::followup_forward(key.party, &details),
        None,
    )
    .await;

    TraceEvent::PhaseChanged {
        party_key: key.to_string(),
        from: Phase::CollectingFollowup.label(),
        to: Phase::Done.label(),
    }
    .emit();

    relay::send_text(
        state,
        key.party,
        texts::FOLLOWUP_THANKS,
        Some(contact_keyboard()),
    )
    .await;
}
