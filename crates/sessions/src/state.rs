//! Session state: the phase enumeration and the typed scratch that
//! accumulates into a questionnaire.

use chrono::{DateTime, Utc};

use ir_domain::transport::{MediaRef, PartyId, ProofKind};

use crate::party_key::PartyKey;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Phase
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where a party currently stands in the onboarding / relay flow.
///
/// The pipeline runs `Idle → CollectingField{0..k} → CollectingMedia →
/// CollectingProof → UnderReview → CollectingFollowup → Done`.
/// `RelayDialog` and `AwaitingRelayReply` are cross-cutting: reachable
/// from any point via the contact affordance / reply token, and left
/// again via the reset or cancel commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CollectingField { index: usize },
    /// The only self-looping phase: photos accumulate until the done
    /// sentinel arrives with at least one collected.
    CollectingMedia,
    CollectingProof,
    UnderReview,
    CollectingFollowup,
    Done,
    /// Applicant side of the free-text relay.
    RelayDialog,
    /// Reviewer armed to reply to one bound applicant.
    AwaitingRelayReply,
}

impl Phase {
    /// Stable label for logs and trace events.
    pub fn label(&self) -> String {
        match self {
            Phase::Idle => "idle".into(),
            Phase::CollectingField { index } => format!("collecting_field_{index}"),
            Phase::CollectingMedia => "collecting_media".into(),
            Phase::CollectingProof => "collecting_proof".into(),
            Phase::UnderReview => "under_review".into(),
            Phase::CollectingFollowup => "collecting_followup".into(),
            Phase::Done => "done".into(),
            Phase::RelayDialog => "relay_dialog".into(),
            Phase::AwaitingRelayReply => "awaiting_relay_reply".into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Questionnaire
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The identity-proof media item with its recorded kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofMedia {
    pub media: MediaRef,
    pub kind: ProofKind,
}

/// In-progress questionnaire scratch, owned by the applicant's session
/// until submission.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    /// One answer per form field, in field order.
    pub answers: Vec<String>,
    /// Evidence photos in the order they arrived.
    pub evidence: Vec<MediaRef>,
    pub proof: Option<ProofMedia>,
}

/// The submitted, immutable aggregate handed to the relay router.
#[derive(Debug, Clone)]
pub struct Questionnaire {
    pub applicant: PartyKey,
    pub answers: Vec<String>,
    pub evidence: Vec<MediaRef>,
    pub proof: ProofMedia,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Mutable record tracked per [`PartyKey`].
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub draft: Draft,
    /// Relay binding (reviewer session only): the applicant the next
    /// free-text message targets.  Writing a new value overwrites the
    /// previous one; at most one binding is active per session.
    pub relay_target: Option<PartyId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Idle,
            draft: Draft::default(),
            relay_target: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Return to the initial phase, discarding the draft.  The relay
    /// binding survives a reset; it is only replaced by a newer one.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.phase = Phase::Idle;
        self.draft = Draft::default();
        self.updated_at = now;
    }

    /// Freeze the draft into a submitted questionnaire.  `None` when
    /// the proof has not been collected yet.
    pub fn submit(&mut self, applicant: PartyKey) -> Option<Questionnaire> {
        let proof = self.draft.proof.clone()?;
        let draft = std::mem::take(&mut self.draft);
        Some(Questionnaire {
            applicant,
            answers: draft.answers,
            evidence: draft.evidence,
            proof,
        })
    }
}
