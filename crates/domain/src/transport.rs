//! The abstract chat transport contract.
//!
//! The engine sees the chat platform through two shapes only: the
//! normalized [`InboundEvent`] envelope that connectors post, and the
//! [`Transport`] trait of fire-and-forget outbound send primitives.
//! Delivery, media storage, file-reference resolution, and markup
//! rendering all live on the connector side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Numeric participant id within the transport.
pub type PartyId = i64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque handle to a media asset stored by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

/// Which media kind an applicant used for the identity proof.  Needed
/// later to pick the outbound send primitive when forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    Photo,
    Video,
    RoundVideo,
}

impl ProofKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProofKind::Photo => "photo",
            ProofKind::Video => "video",
            ProofKind::RoundVideo => "round_video",
        }
    }
}

/// Normalized message payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text {
        text: String,
    },
    /// Resolution variants of one photo asset, ordered smallest to
    /// largest (the engine keeps only the highest-fidelity variant).
    Photo {
        variants: Vec<MediaRef>,
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        media: MediaRef,
        #[serde(default)]
        caption: Option<String>,
    },
    RoundVideo {
        media: MediaRef,
    },
    Document {
        media: MediaRef,
        #[serde(default)]
        caption: Option<String>,
    },
    Voice {
        media: MediaRef,
        #[serde(default)]
        caption: Option<String>,
    },
}

impl Payload {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text { .. } => "text",
            Payload::Photo { .. } => "photo",
            Payload::Video { .. } => "video",
            Payload::RoundVideo { .. } => "round_video",
            Payload::Document { .. } => "document",
            Payload::Voice { .. } => "voice",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }

    /// The highest-fidelity variant of a photo payload.
    pub fn best_photo(&self) -> Option<&MediaRef> {
        match self {
            Payload::Photo { variants, .. } => variants.last(),
            _ => None,
        }
    }
}

/// Reference to a concrete message the transport has already rendered
/// (used to strip inline keyboards after a decision).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub scope: PartyId,
    pub message_id: i64,
}

/// The message an inbound event replies to, as the transport rendered
/// it.  Identity correlation pattern-matches on this text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRef {
    #[serde(default)]
    pub text: Option<String>,
}

/// What the inbound event carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Message {
        payload: Payload,
        #[serde(default)]
        reply_to: Option<ReplyRef>,
    },
    /// An interactive-markup tap carrying an opaque `action:party_id`
    /// token.  Routed to the relay router before any phase dispatch.
    Callback {
        token: String,
        source: MessageRef,
    },
}

/// The normalized envelope connectors post for every inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Transport chat scope the event arrived in.
    pub scope: PartyId,
    /// Party id of the sender.
    pub sender: PartyId,
    #[serde(flatten)]
    pub kind: EventKind,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound primitives
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One interactive button.  `token` round-trips verbatim as the
/// callback token when tapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub token: String,
}

/// Inline keyboard attached to an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// A single-row keyboard.
    pub fn row(buttons: Vec<Button>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }
}

/// Outbound send primitives the engine can invoke.
///
/// Every call is a single bounded request; a failure reduces to an
/// `Err` the caller logs but does not branch on beyond the explicit
/// forwarding-failure cases of the sequencer and router.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        to: PartyId,
        body: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    async fn send_photo(
        &self,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    async fn send_video(
        &self,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    /// Round video-messages carry no caption on any known platform.
    async fn send_round_video(&self, to: PartyId, media: &MediaRef) -> Result<()>;

    async fn send_document(
        &self,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    async fn send_voice(
        &self,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    /// Best-effort removal of the inline keyboard from a previously
    /// sent message, so a decision cannot be tapped twice.
    async fn clear_markup(&self, source: &MessageRef) -> Result<()>;
}
