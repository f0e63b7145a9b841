//! End-to-end engine flows driven through a recording mock transport.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use ir_domain::config::Config;
use ir_domain::error::{Error, Result};
use ir_domain::transport::{
    EventKind, InboundEvent, Keyboard, MediaRef, MessageRef, PartyId, Payload, ReplyRef,
    Transport,
};
use ir_gateway::engine::relay::ReplyIdPatterns;
use ir_gateway::engine::{self, texts};
use ir_gateway::state::AppState;
use ir_sessions::{PartyKey, PartyLockMap, Phase, SessionStore};

const REVIEWER: PartyId = 99;
const APPLICANT: PartyId = 42;
const STRANGER: PartyId = 77;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Mock transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct Sent {
    to: PartyId,
    primitive: &'static str,
    /// Body for texts, caption (or empty) for media.
    body: String,
    /// Flattened keyboard tokens, row order.
    tokens: Vec<String>,
}

#[derive(Default)]
struct MockTransport {
    sent: Mutex<Vec<Sent>>,
    cleared: Mutex<Vec<i64>>,
    /// When set, every send to this party fails.
    fail_to: Mutex<Option<PartyId>>,
}

impl MockTransport {
    fn record(
        &self,
        to: PartyId,
        primitive: &'static str,
        body: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        if *self.fail_to.lock() == Some(to) {
            return Err(Error::Transport("mock delivery failure".into()));
        }
        let tokens = keyboard
            .map(|kb| {
                kb.rows
                    .into_iter()
                    .flatten()
                    .map(|b| b.token)
                    .collect()
            })
            .unwrap_or_default();
        self.sent.lock().push(Sent {
            to,
            primitive,
            body: body.to_owned(),
            tokens,
        });
        Ok(())
    }

    fn sent_to(&self, to: PartyId) -> Vec<Sent> {
        self.sent
            .lock()
            .iter()
            .filter(|s| s.to == to)
            .cloned()
            .collect()
    }

    fn clear_log(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&self, to: PartyId, body: &str, keyboard: Option<Keyboard>) -> Result<()> {
        self.record(to, "send_text", body, keyboard)
    }

    async fn send_photo(
        &self,
        to: PartyId,
        _media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.record(to, "send_photo", caption.unwrap_or(""), keyboard)
    }

    async fn send_video(
        &self,
        to: PartyId,
        _media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.record(to, "send_video", caption.unwrap_or(""), keyboard)
    }

    async fn send_round_video(&self, to: PartyId, _media: &MediaRef) -> Result<()> {
        self.record(to, "send_round_video", "", None)
    }

    async fn send_document(
        &self,
        to: PartyId,
        _media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.record(to, "send_document", caption.unwrap_or(""), keyboard)
    }

    async fn send_voice(
        &self,
        to: PartyId,
        _media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.record(to, "send_voice", caption.unwrap_or(""), keyboard)
    }

    async fn clear_markup(&self, source: &MessageRef) -> Result<()> {
        self.cleared.lock().push(source.message_id);
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn test_state(transport: Arc<MockTransport>) -> AppState {
    let mut config = Config::default();
    config.review.reviewer_id = REVIEWER;
    config.transport.webhook_url = "http://test.invalid/outbound".into();

    AppState {
        config: Arc::new(config),
        transport,
        sessions: Arc::new(SessionStore::new()),
        locks: Arc::new(PartyLockMap::new()),
        reply_patterns: Arc::new(ReplyIdPatterns::new()),
    }
}

fn text(sender: PartyId, body: &str) -> InboundEvent {
    InboundEvent {
        scope: sender,
        sender,
        kind: EventKind::Message {
            payload: Payload::Text { text: body.into() },
            reply_to: None,
        },
    }
}

fn reply(sender: PartyId, body: &str, replied_text: &str) -> InboundEvent {
    InboundEvent {
        scope: sender,
        sender,
        kind: EventKind::Message {
            payload: Payload::Text { text: body.into() },
            reply_to: Some(ReplyRef {
                text: Some(replied_text.into()),
            }),
        },
    }
}

fn photo(sender: PartyId, variants: &[&str]) -> InboundEvent {
    InboundEvent {
        scope: sender,
        sender,
        kind: EventKind::Message {
            payload: Payload::Photo {
                variants: variants.iter().map(|v| MediaRef((*v).into())).collect(),
                caption: None,
            },
            reply_to: None,
        },
    }
}

fn callback(sender: PartyId, token: &str) -> InboundEvent {
    InboundEvent {
        scope: sender,
        sender,
        kind: EventKind::Callback {
            token: token.into(),
            source: MessageRef {
                scope: sender,
                message_id: 1,
            },
        },
    }
}

fn phase_of(state: &AppState, party: PartyId) -> Phase {
    state
        .sessions
        .get(&PartyKey::direct(party))
        .expect("session exists")
        .phase
}

/// Drive an applicant from first contact to `UnderReview`.
async fn drive_to_under_review(state: &AppState, applicant: PartyId) {
    engine::handle_event(state, text(applicant, "hello")).await;
    for answer in ["Alex Doe", "+1 555 0100", "none", "Springfield", "Main St 1"] {
        engine::handle_event(state, text(applicant, answer)).await;
    }
    engine::handle_event(state, photo(applicant, &["doc-small", "doc-large"])).await;
    engine::handle_event(state, text(applicant, "done")).await;
    engine::handle_event(state, photo(applicant, &["selfie"])).await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Form sequencer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn first_contact_greets_and_arms_first_field() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, text(APPLICANT, "hi there")).await;

    assert_eq!(phase_of(&state, APPLICANT), Phase::CollectingField { index: 0 });
    let sent = transport.sent_to(APPLICANT);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].body, texts::GREETING);
    assert_eq!(sent[1].body, texts::FIELDS[0].prompt);
}

#[tokio::test]
async fn wrong_payload_kind_reprompts_without_advancing() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, text(APPLICANT, "hi")).await;
    engine::handle_event(&state, photo(APPLICANT, &["pic"])).await;

    // Still waiting on the first field; retrying with text works.
    assert_eq!(phase_of(&state, APPLICANT), Phase::CollectingField { index: 0 });
    engine::handle_event(&state, text(APPLICANT, "Alex Doe")).await;
    assert_eq!(phase_of(&state, APPLICANT), Phase::CollectingField { index: 1 });
}

#[tokio::test]
async fn secondary_contact_none_synonym_is_canonicalized() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, text(APPLICANT, "hi")).await;
    engine::handle_event(&state, text(APPLICANT, "Alex Doe")).await;
    engine::handle_event(&state, text(APPLICANT, "+1 555 0100")).await;
    engine::handle_event(&state, text(APPLICANT, "N/A")).await;

    let session = state.sessions.get(&PartyKey::direct(APPLICANT)).unwrap();
    assert_eq!(session.draft.answers[2], "none");
}

#[tokio::test]
async fn done_sentinel_requires_at_least_one_photo() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, text(APPLICANT, "hi")).await;
    for answer in ["Alex Doe", "+1 555 0100", "none", "Springfield", "Main St 1"] {
        engine::handle_event(&state, text(APPLICANT, answer)).await;
    }
    assert_eq!(phase_of(&state, APPLICANT), Phase::CollectingMedia);

    // Sentinel with zero photos: stays in phase.
    engine::handle_event(&state, text(APPLICANT, "done")).await;
    assert_eq!(phase_of(&state, APPLICANT), Phase::CollectingMedia);

    // One photo, then the sentinel advances exactly once.
    engine::handle_event(&state, photo(APPLICANT, &["doc"])).await;
    engine::handle_event(&state, text(APPLICANT, "DONE")).await;
    assert_eq!(phase_of(&state, APPLICANT), Phase::CollectingProof);
}

#[tokio::test]
async fn photo_upload_keeps_highest_fidelity_variant() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, text(APPLICANT, "hi")).await;
    for answer in ["Alex Doe", "+1 555 0100", "none", "Springfield", "Main St 1"] {
        engine::handle_event(&state, text(APPLICANT, answer)).await;
    }
    engine::handle_event(&state, photo(APPLICANT, &["tiny", "medium", "large"])).await;

    let session = state.sessions.get(&PartyKey::direct(APPLICANT)).unwrap();
    assert_eq!(session.draft.evidence, vec![MediaRef("large".into())]);
}

#[tokio::test]
async fn submission_forwards_review_request_to_reviewer() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    drive_to_under_review(&state, APPLICANT).await;

    assert_eq!(phase_of(&state, APPLICANT), Phase::UnderReview);

    let to_reviewer = transport.sent_to(REVIEWER);
    // Rendered questionnaire + one evidence photo + the proof photo.
    assert_eq!(to_reviewer.len(), 3);
    assert!(to_reviewer[0].body.contains("<code>42</code>"));
    assert_eq!(
        to_reviewer[0].tokens,
        vec!["approve:42".to_string(), "reject:42".to_string()]
    );
    assert_eq!(to_reviewer[1].primitive, "send_photo");
    assert_eq!(to_reviewer[2].primitive, "send_photo");
}

#[tokio::test]
async fn second_submission_while_under_review_is_ignored() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    drive_to_under_review(&state, APPLICANT).await;
    let review_sends = transport.sent_to(REVIEWER).len();

    // More media and another sentinel change nothing.
    engine::handle_event(&state, photo(APPLICANT, &["again"])).await;
    engine::handle_event(&state, text(APPLICANT, "done")).await;

    assert_eq!(phase_of(&state, APPLICANT), Phase::UnderReview);
    assert_eq!(transport.sent_to(REVIEWER).len(), review_sends);
}

#[tokio::test]
async fn transport_failure_during_submission_still_advances() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    // Every send to the reviewer fails.
    *transport.fail_to.lock() = Some(REVIEWER);

    drive_to_under_review(&state, APPLICANT).await;

    assert_eq!(phase_of(&state, APPLICANT), Phase::UnderReview);
    assert!(transport.sent_to(REVIEWER).is_empty());
    // The applicant still got the submission confirmation.
    let last = transport.sent_to(APPLICANT).pop().unwrap();
    assert_eq!(last.body, texts::SUBMITTED_NOTICE);
}

#[tokio::test]
async fn reset_command_restarts_mid_form() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, text(APPLICANT, "hi")).await;
    engine::handle_event(&state, text(APPLICANT, "Alex Doe")).await;
    engine::handle_event(&state, text(APPLICANT, "/start")).await;

    let session = state.sessions.get(&PartyKey::direct(APPLICANT)).unwrap();
    assert_eq!(session.phase, Phase::CollectingField { index: 0 });
    assert!(session.draft.answers.is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Decision dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn non_reviewer_approve_is_inert() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    drive_to_under_review(&state, APPLICANT).await;
    transport.clear_log();

    engine::handle_event(&state, callback(STRANGER, "approve:42")).await;

    assert_eq!(phase_of(&state, APPLICANT), Phase::UnderReview);
    assert!(transport.sent_to(APPLICANT).is_empty());
    let to_stranger = transport.sent_to(STRANGER);
    assert_eq!(to_stranger.len(), 1);
    assert_eq!(to_stranger[0].body, texts::UNAUTHORIZED);
}

#[tokio::test]
async fn reviewer_approve_arms_followup_with_one_notice() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    drive_to_under_review(&state, APPLICANT).await;
    transport.clear_log();

    engine::handle_event(&state, callback(REVIEWER, "approve:42")).await;

    assert_eq!(phase_of(&state, APPLICANT), Phase::CollectingFollowup);
    let to_applicant = transport.sent_to(APPLICANT);
    assert_eq!(to_applicant.len(), 1);
    assert_eq!(to_applicant[0].body, texts::APPROVED_NOTICE);
    // The decision keyboard was stripped.
    assert_eq!(transport.cleared.lock().len(), 1);
}

#[tokio::test]
async fn reviewer_reject_notifies_without_phase_change() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    drive_to_under_review(&state, APPLICANT).await;
    transport.clear_log();

    engine::handle_event(&state, callback(REVIEWER, "reject:42")).await;

    assert_eq!(phase_of(&state, APPLICANT), Phase::UnderReview);
    let to_applicant = transport.sent_to(APPLICANT);
    assert_eq!(to_applicant.len(), 1);
    assert_eq!(to_applicant[0].body, texts::REJECTED_NOTICE);
}

#[tokio::test]
async fn followup_answer_is_forwarded_and_finishes() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    drive_to_under_review(&state, APPLICANT).await;
    engine::handle_event(&state, callback(REVIEWER, "approve:42")).await;
    transport.clear_log();

    engine::handle_event(&state, text(APPLICANT, "Main St 1, after 6pm")).await;

    assert_eq!(phase_of(&state, APPLICANT), Phase::Done);
    let to_reviewer = transport.sent_to(REVIEWER);
    assert_eq!(to_reviewer.len(), 1);
    assert!(to_reviewer[0].body.contains("applicant 42"));
    assert!(to_reviewer[0].body.contains("Main St 1, after 6pm"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Free-text relay
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn reviewer_text_without_binding_fails_routing() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, text(REVIEWER, "anyone there?")).await;

    let to_reviewer = transport.sent_to(REVIEWER);
    assert_eq!(to_reviewer.len(), 1);
    assert_eq!(to_reviewer[0].body, texts::ROUTING_FAILED);
    // Zero forwarding sends.
    assert_eq!(transport.sent.lock().len(), 1);
}

#[tokio::test]
async fn relay_round_trip_via_reply_linkage() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    // Applicant opens the relay dialog and sends a question.
    engine::handle_event(&state, text(APPLICANT, "hi")).await;
    engine::handle_event(&state, callback(APPLICANT, "contact_admin")).await;
    assert_eq!(phase_of(&state, APPLICANT), Phase::RelayDialog);
    transport.clear_log();

    engine::handle_event(&state, text(APPLICANT, "when do I hear back?")).await;

    let forwarded = transport.sent_to(REVIEWER);
    assert_eq!(forwarded.len(), 1);
    assert!(forwarded[0].body.contains("applicant 42"));
    assert!(forwarded[0].body.contains("when do I hear back?"));
    assert_eq!(forwarded[0].tokens, vec!["reply_to:42".to_string()]);
    transport.clear_log();

    // Reviewer answers by replying to the forwarded message.
    let forwarded_text = texts::forwarded_header(APPLICANT) + "when do I hear back?";
    engine::handle_event(&state, reply(REVIEWER, "tomorrow", &forwarded_text)).await;

    let back = transport.sent_to(APPLICANT);
    assert_eq!(back.len(), 1);
    assert!(back[0].body.starts_with(texts::ADMIN_REPLY_PREFIX));
    assert!(back[0].body.contains("tomorrow"));
}

#[tokio::test]
async fn reply_token_arms_binding_then_single_send() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, callback(REVIEWER, "reply_to:42")).await;
    let reviewer_session = state.sessions.get(&PartyKey::direct(REVIEWER)).unwrap();
    assert_eq!(reviewer_session.phase, Phase::AwaitingRelayReply);
    assert_eq!(reviewer_session.relay_target, Some(APPLICANT));
    transport.clear_log();

    engine::handle_event(&state, text(REVIEWER, "your slot is confirmed")).await;

    let back = transport.sent_to(APPLICANT);
    assert_eq!(back.len(), 1);
    assert!(back[0].body.starts_with(texts::ADMIN_REPLY_PREFIX));
    // The reply sub-phase disarms after one send.
    assert_eq!(phase_of(&state, REVIEWER), Phase::Idle);
}

#[tokio::test]
async fn reply_linkage_send_also_disarms_armed_subphase() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    // Arm a reply to one applicant, then answer a different one by
    // replying to their forwarded message instead.
    engine::handle_event(&state, callback(REVIEWER, "reply_to:77")).await;
    let forwarded_text = texts::forwarded_header(APPLICANT) + "any news?";
    engine::handle_event(&state, reply(REVIEWER, "soon", &forwarded_text)).await;

    assert_eq!(transport.sent_to(APPLICANT).len(), 1);
    let session = state.sessions.get(&PartyKey::direct(REVIEWER)).unwrap();
    // The sub-phase disarms after the send; the binding stays armed.
    assert_eq!(session.phase, Phase::Idle);
    assert_eq!(session.relay_target, Some(STRANGER));
}

#[tokio::test]
async fn newer_contact_overwrites_relay_binding() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    for applicant in [APPLICANT, STRANGER] {
        engine::handle_event(&state, text(applicant, "hi")).await;
        engine::handle_event(&state, callback(applicant, "contact_admin")).await;
        engine::handle_event(&state, text(applicant, "hello admin")).await;
    }
    transport.clear_log();

    // No reply linkage: the last applicant who contacted wins.
    engine::handle_event(&state, text(REVIEWER, "got it")).await;

    assert_eq!(transport.sent_to(APPLICANT).len(), 0);
    assert_eq!(transport.sent_to(STRANGER).len(), 1);
}

#[tokio::test]
async fn unresolvable_reply_linkage_is_a_silent_noop() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, reply(REVIEWER, "hello?", "no id in this text")).await;

    // No forwarding and no notice either.
    assert!(transport.sent.lock().is_empty());
}

#[tokio::test]
async fn cancel_disarms_reply_subphase() {
    let transport = Arc::new(MockTransport::default());
    let state = test_state(transport.clone());

    engine::handle_event(&state, callback(REVIEWER, "reply_to:42")).await;
    engine::handle_event(&state, text(REVIEWER, "/cancel")).await;

    let session = state.sessions.get(&PartyKey::direct(REVIEWER)).unwrap();
    assert_eq!(session.phase, Phase::Idle);
    // The binding survives; only the sub-phase is disarmed.
    assert_eq!(session.relay_target, Some(APPLICANT));
}
