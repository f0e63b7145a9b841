//! The relay router: reviewer decisions and free-text traffic between
//! the two parties.
//!
//! Neither party holds the other's identity as addressable state beyond
//! what the router injects: decision and reply tokens carry the
//! applicant id, and forwarded text renders it in one of the two
//! recognized reply-correlation shapes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;

use ir_domain::error::Error;
use ir_domain::trace::TraceEvent;
use ir_domain::transport::{
    Button, Keyboard, MessageRef, PartyId, Payload, ProofKind, ReplyRef,
};
use ir_sessions::{PartyKey, Phase, Questionnaire};

use crate::engine::texts;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Callback tokens
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque `action:party_id` token attached to interactive markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackToken {
    Approve(PartyId),
    Reject(PartyId),
    ReplyTo(PartyId),
    ContactAdmin,
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackToken::Approve(id) => write!(f, "approve:{id}"),
            CallbackToken::Reject(id) => write!(f, "reject:{id}"),
            CallbackToken::ReplyTo(id) => write!(f, "reply_to:{id}"),
            CallbackToken::ContactAdmin => write!(f, "contact_admin"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized callback token: {0}")]
pub struct TokenParseError(String);

impl FromStr for CallbackToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "contact_admin" {
            return Ok(CallbackToken::ContactAdmin);
        }
        let (action, id) = s
            .split_once(':')
            .ok_or_else(|| TokenParseError(s.to_owned()))?;
        let id: PartyId = id
            .parse()
            .map_err(|_| TokenParseError(s.to_owned()))?;
        match action {
            "approve" => Ok(CallbackToken::Approve(id)),
            "reject" => Ok(CallbackToken::Reject(id)),
            "reply_to" => Ok(CallbackToken::ReplyTo(id)),
            _ => Err(TokenParseError(s.to_owned())),
        }
    }
}

// ── Keyboard builders ───────────────────────────────────────────────

pub fn approval_keyboard(applicant: PartyId) -> Keyboard {
    Keyboard::row(vec![
        Button {
            label: texts::APPROVE_BUTTON_LABEL.into(),
            token: CallbackToken::Approve(applicant).to_string(),
        },
        Button {
            label: texts::REJECT_BUTTON_LABEL.into(),
            token: CallbackToken::Reject(applicant).to_string(),
        },
    ])
}

pub fn contact_keyboard() -> Keyboard {
    Keyboard::row(vec![Button {
        label: texts::CONTACT_BUTTON_LABEL.into(),
        token: CallbackToken::ContactAdmin.to_string(),
    }])
}

pub fn reply_keyboard(applicant: PartyId) -> Keyboard {
    Keyboard::row(vec![Button {
        label: texts::REPLY_BUTTON_LABEL.into(),
        token: CallbackToken::ReplyTo(applicant).to_string(),
    }])
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reply correlation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The two textual shapes an applicant id may take inside rendered
/// outbound text.  Identity travels as a visible token, not hidden
/// metadata: every applicant-identifying message the engine renders
/// must use one of these shapes or relay-by-reply fails to resolve.
pub struct ReplyIdPatterns {
    patterns: [Regex; 2],
}

impl Default for ReplyIdPatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyIdPatterns {
    pub fn new() -> Self {
        Self {
            patterns: [
                Regex::new(r"applicant (\d+)").expect("reply-correlation pattern is valid"),
                Regex::new(r"<code>(\d+)</code>").expect("reply-correlation pattern is valid"),
            ],
        }
    }

    /// Extract the applicant id from the rendered text of a replied-to
    /// message.  `None` means the relay attempt is a no-op.
    pub fn extract(&self, text: &str) -> Option<PartyId> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delivery logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Log a failed outbound send.  Delivery failures are never retried
/// and never escalated; "delivery not confirmed" is the whole policy.
fn delivery_failed(to: PartyId, primitive: &str, err: &Error) {
    tracing::warn!(to, primitive, error = %err, "outbound delivery not confirmed");
    TraceEvent::DeliveryFailed {
        to,
        primitive: primitive.to_owned(),
        error: err.to_string(),
    }
    .emit();
}

/// Fire-and-forget text send.
pub(crate) async fn send_text(
    state: &AppState,
    to: PartyId,
    body: &str,
    keyboard: Option<Keyboard>,
) {
    if let Err(e) = state.transport.send_text(to, body, keyboard).await {
        delivery_failed(to, "send_text", &e);
    }
}

/// Forward an arbitrary payload to `to`, carrying `header` as the body
/// prefix or media caption.
async fn forward_payload(
    state: &AppState,
    to: PartyId,
    header: &str,
    payload: &Payload,
    keyboard: Option<Keyboard>,
) {
    let t = &state.transport;
    let with_caption = |caption: &Option<String>| -> String {
        match caption {
            Some(c) => format!("{header}{c}"),
            None => header.to_owned(),
        }
    };

    let result = match payload {
        Payload::Text { text } => {
            t.send_text(to, &format!("{header}{text}"), keyboard).await
        }
        Payload::Photo { variants, caption } => match variants.last() {
            Some(media) => {
                t.send_photo(to, media, Some(&with_caption(caption)), keyboard)
                    .await
            }
            None => return,
        },
        Payload::Video { media, caption } => {
            t.send_video(to, media, Some(&with_caption(caption)), keyboard)
                .await
        }
        Payload::Document { media, caption } => {
            t.send_document(to, media, Some(&with_caption(caption)), keyboard)
                .await
        }
        Payload::Voice { media, caption } => {
            t.send_voice(to, media, Some(&with_caption(caption)), keyboard)
                .await
        }
        Payload::RoundVideo { media } => {
            // No caption support: the id-bearing header travels as a
            // separate text carrying the keyboard.
            let first = t.send_round_video(to, media).await;
            match first {
                Ok(()) => t.send_text(to, header, keyboard).await,
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        delivery_failed(to, payload.kind(), &e);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Review submission (applicant → reviewer)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hand a submitted questionnaire to the reviewer as a review request:
/// rendered text with the approve/reject keyboard, then the evidence
/// photos, then the identity proof via the primitive its kind demands.
///
/// Every failure here is logged and swallowed: the applicant has
/// already advanced and a submission is never resent automatically.
pub async fn submit_review(state: &AppState, questionnaire: &Questionnaire) {
    let reviewer = state.reviewer_id();
    let applicant = questionnaire.applicant.party;

    send_text(
        state,
        reviewer,
        &texts::render_questionnaire(questionnaire),
        Some(approval_keyboard(applicant)),
    )
    .await;

    for media in &questionnaire.evidence {
        if let Err(e) = state
            .transport
            .send_photo(reviewer, media, Some(&texts::evidence_caption(applicant)), None)
            .await
        {
            delivery_failed(reviewer, "send_photo", &e);
        }
    }

    let proof = &questionnaire.proof;
    let result = match proof.kind {
        ProofKind::Photo => {
            state
                .transport
                .send_photo(reviewer, &proof.media, Some(&texts::proof_caption(applicant)), None)
                .await
        }
        ProofKind::Video => {
            state
                .transport
                .send_video(reviewer, &proof.media, Some(&texts::proof_caption(applicant)), None)
                .await
        }
        ProofKind::RoundVideo => {
            let first = state.transport.send_round_video(reviewer, &proof.media).await;
            match first {
                Ok(()) => {
                    state
                        .transport
                        .send_text(reviewer, &texts::round_video_note(applicant), None)
                        .await
                }
                Err(e) => Err(e),
            }
        }
    };
    if let Err(e) = result {
        delivery_failed(reviewer, proof.kind.label(), &e);
    }

    TraceEvent::ReviewSubmitted {
        applicant,
        answers: questionnaire.answers.len(),
        evidence_count: questionnaire.evidence.len(),
        proof_kind: proof.kind.label().to_owned(),
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Callback dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Route an interactive-markup tap.  Decision and reply tokens are
/// reviewer-only; the guard runs on every decision-path entry, not
/// just the first.
pub async fn handle_callback(
    state: &AppState,
    sender: PartyKey,
    raw_token: &str,
    source: &MessageRef,
    now: DateTime<Utc>,
) {
    let token = match raw_token.parse::<CallbackToken>() {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(party_key = %sender, error = %e, "ignoring malformed callback");
            return;
        }
    };

    // Reviewer guard, unconditional on every decision-path entry.
    if token != CallbackToken::ContactAdmin && sender.party != state.reviewer_id() {
        TraceEvent::DecisionRefused {
            action: token.to_string(),
            sender: sender.party,
        }
        .emit();
        send_text(state, sender.party, texts::UNAUTHORIZED, None).await;
        return;
    }

    match token {
        CallbackToken::ContactAdmin => {
            state.sessions.update(&sender, now, |s| {
                s.phase = Phase::RelayDialog;
            });
            send_text(
                state,
                sender.party,
                &texts::contact_prompt(&state.config.form.reset_command),
                None,
            )
            .await;
        }
        CallbackToken::Approve(applicant) => {
            apply_approve(state, sender, applicant, source, now).await;
        }
        CallbackToken::Reject(applicant) => {
            apply_reject(state, sender, applicant, source).await;
        }
        CallbackToken::ReplyTo(applicant) => {
            arm_reply(state, sender, applicant, now).await;
        }
    }
}

/// Best-effort removal of the decision keyboard.  Advisory UI only: a
/// retried tap after a transport glitch can still re-trigger the
/// notification, since nothing at the data level records the decision.
async fn strip_decision_markup(state: &AppState, source: &MessageRef) {
    if let Err(e) = state.transport.clear_markup(source).await {
        tracing::warn!(
            message_id = source.message_id,
            error = %e,
            "failed to strip decision keyboard"
        );
    }
}

async fn apply_approve(
    state: &AppState,
    reviewer: PartyKey,
    applicant: PartyId,
    source: &MessageRef,
    now: DateTime<Utc>,
) {
    strip_decision_markup(state, source).await;

    send_text(
        state,
        applicant,
        texts::APPROVED_NOTICE,
        Some(contact_keyboard()),
    )
    .await;

    // The one transition actuated by a third party: the applicant's
    // session moves past review into the follow-up question.
    let target = PartyKey::direct(applicant);
    let updated = state.sessions.update(&target, now, |s| {
        s.phase = Phase::CollectingFollowup;
    });
    TraceEvent::PhaseChanged {
        party_key: target.to_string(),
        from: Phase::UnderReview.label(),
        to: updated.phase.label(),
    }
    .emit();

    send_text(state, reviewer.party, &texts::approved_ack(applicant), None).await;

    TraceEvent::DecisionApplied {
        action: "approve".into(),
        applicant,
        reviewer: reviewer.party,
    }
    .emit();
}

async fn apply_reject(
    state: &AppState,
    reviewer: PartyKey,
    applicant: PartyId,
    source: &MessageRef,
) {
    strip_decision_markup(state, source).await;

    // Rejection only notifies; the applicant's session stays where it
    // is and is reachable again only via the reset command.
    send_text(
        state,
        applicant,
        texts::REJECTED_NOTICE,
        Some(contact_keyboard()),
    )
    .await;

    send_text(state, reviewer.party, &texts::rejected_ack(applicant), None).await;

    TraceEvent::DecisionApplied {
        action: "reject".into(),
        applicant,
        reviewer: reviewer.party,
    }
    .emit();
}

async fn arm_reply(state: &AppState, reviewer: PartyKey, applicant: PartyId, now: DateTime<Utc>) {
    // Overwrites whatever binding was active before.
    state.sessions.update(&reviewer, now, |s| {
        s.relay_target = Some(applicant);
        s.phase = Phase::AwaitingRelayReply;
    });
    send_text(
        state,
        reviewer.party,
        &texts::reply_armed(applicant, &state.config.form.cancel_command),
        None,
    )
    .await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Free-text relay
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Forward an applicant's relay-dialog payload to the reviewer and
/// record the last-contact binding in the reviewer's session.
///
/// Assumes the reviewer converses in their direct chat, so the
/// reviewer's session key is `direct(reviewer_id)`.
pub async fn forward_to_reviewer(
    state: &AppState,
    applicant: PartyKey,
    payload: &Payload,
    now: DateTime<Utc>,
) {
    let reviewer = state.reviewer_id();
    let header = texts::forwarded_header(applicant.party);

    forward_payload(
        state,
        reviewer,
        &header,
        payload,
        Some(reply_keyboard(applicant.party)),
    )
    .await;

    state
        .sessions
        .update(&PartyKey::direct(reviewer), now, |s| {
            s.relay_target = Some(applicant.party);
        });

    TraceEvent::RelayForwarded {
        from: applicant.party,
        to: reviewer,
        payload: payload.kind().to_owned(),
    }
    .emit();

    // Taxonomy (c): a failed forward is logged, never surfaced here.
    send_text(state, applicant.party, texts::RELAY_DELIVERED, None).await;
}

/// Route a reviewer message.  Binding resolution order: reply-linkage
/// extraction first, then the session's relay target; neither is an
/// explicit routing failure back to the reviewer.
pub async fn handle_reviewer_message(
    state: &AppState,
    reviewer: PartyKey,
    payload: Payload,
    reply_to: Option<ReplyRef>,
    now: DateTime<Utc>,
) {
    let form = &state.config.form;

    if let Some(text) = payload.as_text() {
        let text = text.trim();

        // Reset applies to the issuing party's own session, reviewer included.
        if text == form.reset_command {
            state.sessions.reset(&reviewer, "reset command", now);
            send_text(state, reviewer.party, texts::REPLY_CANCELLED, None).await;
            return;
        }

        // Cancel is only meaningful inside the reply sub-phase.
        if text == form.cancel_command {
            let (session, _) = state.sessions.get_or_create(&reviewer, now);
            if session.phase == Phase::AwaitingRelayReply {
                state.sessions.update(&reviewer, now, |s| {
                    s.phase = Phase::Idle;
                });
                send_text(state, reviewer.party, texts::REPLY_CANCELLED, None).await;
            } else {
                tracing::debug!(party_key = %reviewer, "cancel outside reply sub-phase ignored");
            }
            return;
        }
    }

    // 1. Reply-linkage takes precedence: extract the id from the
    //    rendered text of the message being replied to.  Unresolved
    //    extraction is a silent no-op.
    if let Some(reply) = reply_to {
        let extracted = reply
            .text
            .as_deref()
            .and_then(|t| state.reply_patterns.extract(t));
        match extracted {
            Some(applicant) => {
                relay_to_applicant(state, reviewer, applicant, &payload).await;
                disarm_reply_subphase(state, reviewer, now);
            }
            None => {
                tracing::debug!(
                    party_key = %reviewer,
                    "reply-correlation found no applicant id, not forwarding"
                );
            }
        }
        return;
    }

    // 2. The active binding: armed via the reply token, or written by
    //    the last applicant who contacted the reviewer.
    let (session, _) = state.sessions.get_or_create(&reviewer, now);
    match session.relay_target {
        Some(applicant) => {
            relay_to_applicant(state, reviewer, applicant, &payload).await;
            disarm_reply_subphase(state, reviewer, now);
        }
        None => {
            TraceEvent::RelayUnresolved {
                sender: reviewer.party,
            }
            .emit();
            send_text(state, reviewer.party, texts::ROUTING_FAILED, None).await;
        }
    }
}

/// Leave the reply sub-phase after a send, whichever routing path
/// carried it.  The binding itself stays armed.
fn disarm_reply_subphase(state: &AppState, reviewer: PartyKey, now: DateTime<Utc>) {
    state.sessions.update_if(
        &reviewer,
        now,
        |s| s.phase == Phase::AwaitingRelayReply,
        |s| s.phase = Phase::Idle,
    );
}

/// Deliver a reviewer payload to one applicant, prefixed with the
/// administrator-reply marker, and confirm to the reviewer.
async fn relay_to_applicant(
    state: &AppState,
    reviewer: PartyKey,
    applicant: PartyId,
    payload: &Payload,
) {
    forward_payload(state, applicant, texts::ADMIN_REPLY_PREFIX, payload, None).await;

    TraceEvent::RelayForwarded {
        from: reviewer.party,
        to: applicant,
        payload: payload.kind().to_owned(),
    }
    .emit();

    send_text(state, reviewer.party, &texts::relay_confirmed(applicant), None).await;
}
