//! Prompts, notices, and questionnaire rendering.
//!
//! Every outbound message that identifies an applicant embeds the
//! numeric id in one of the two shapes the reply-correlation patterns
//! recognize (`applicant <id>` or `<code><id></code>`); see
//! [`crate::engine::relay::ReplyIdPatterns`].

use ir_domain::transport::PartyId;
use ir_sessions::Questionnaire;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Form fields
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One ordered form field.
pub struct FormField {
    pub label: &'static str,
    pub prompt: &'static str,
    /// Normalize a small set of "none" synonyms to a canonical value.
    pub normalize_none: bool,
}

/// The ordered onboarding form.  One text answer per field.
pub const FIELDS: &[FormField] = &[
    FormField {
        label: "Full name",
        prompt: "<b>1.</b> Your full name:",
        normalize_none: false,
    },
    FormField {
        label: "Primary phone",
        prompt: "<b>2.</b> Your primary phone number:",
        normalize_none: false,
    },
    FormField {
        label: "Secondary contact",
        prompt: "<b>3.</b> A secondary contact phone (write \u{201c}none\u{201d} if you have no second number):",
        normalize_none: true,
    },
    FormField {
        label: "City",
        prompt: "<b>4.</b> City of residence:",
        normalize_none: false,
    },
    FormField {
        label: "Address",
        prompt: "<b>5.</b> Full street address for pickup/delivery (street, building, apartment):",
        normalize_none: false,
    },
];

const NONE_SYNONYMS: &[&str] = &["none", "no", "n/a", "na", "-"];

/// Canonicalize a "no secondary contact" answer.
pub fn normalize_contact(answer: &str) -> String {
    let trimmed = answer.trim();
    if NONE_SYNONYMS.iter().any(|s| trimmed.eq_ignore_ascii_case(s)) {
        "none".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Case-insensitive exact match of the trimmed text against the
/// configured done sentinel.
pub fn is_done_word(text: &str, done_word: &str) -> bool {
    text.trim().eq_ignore_ascii_case(done_word)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Applicant-facing texts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const GREETING: &str = "Hello!\n\n\
    I will walk you through the onboarding questionnaire.\n\n\
    \u{26a0} <b>Important:</b> we need current, accurate details for \
    contact and delivery. Please double-check every answer.";

pub const TEXT_EXPECTED: &str =
    "Please answer with a text message.";

pub fn evidence_prompt(done_word: &str) -> String {
    format!(
        "<b>6.</b> Now send <b>photos of your supporting document</b> in good \
         quality. You can send several. When you are finished, write \
         \u{201c}{done_word}\u{201d}."
    )
}

pub fn evidence_saved(done_word: &str) -> String {
    format!(
        "Photo saved.\n\nSend more if needed. When you are finished, write \
         \u{201c}{done_word}\u{201d}."
    )
}

pub const EVIDENCE_NONE_YET: &str =
    "No document photos saved yet. Please send at least one photo.";

pub const EVIDENCE_PHOTO_EXPECTED: &str =
    "Please send the document as a <b>photo</b>.";

pub const PROOF_PROMPT: &str =
    "<b>7.</b> Finally, send a <b>selfie photo, a short video, or a round \
     video-message</b> holding your document, in good quality.";

pub const PROOF_EXPECTED: &str =
    "Please send a photo, a short video, or a round video-message.";

pub const SUBMITTED_NOTICE: &str = "Thank you! Everything was received.\n\n\
    <b>Your questionnaire was sent for review — please wait for the \
    administrator's decision.</b>";

pub const UNDER_REVIEW_NOTICE: &str =
    "Your questionnaire is still under review. Please wait for the \
     administrator's decision.";

pub const APPROVED_NOTICE: &str = "Your questionnaire was <b>approved</b> \u{2705}\n\n\
    Please tell us the <b>address</b> it is most convenient to do the pickup \
    from, and <b>what time</b> suits you.";

pub const REJECTED_NOTICE: &str =
    "Unfortunately, your questionnaire was rejected. \u{274c}\n\n\
     Contact the administrator for details.";

pub const FOLLOWUP_THANKS: &str =
    "Thank you! The information was passed to the administrator. \
     Please wait for further instructions.";

pub const DONE_NOTICE: &str =
    "Your onboarding is complete. Use the button below if you need to \
     reach the administrator.";

pub fn reset_notice(reset_command: &str) -> String {
    format!("Send {reset_command} to restart the questionnaire.")
}

// ── Relay (applicant side) ──────────────────────────────────────────

pub fn contact_prompt(reset_command: &str) -> String {
    format!(
        "You can send a message to the administrator.\n\
         Write your question and it will be passed on.\n\n\
         To cancel, send {reset_command}"
    )
}

pub const RELAY_DELIVERED: &str =
    "Your message was sent to the administrator. Please wait for a reply.";

pub const CONTACT_BUTTON_LABEL: &str = "\u{1f4de} Contact the administrator";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reviewer-facing texts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const UNAUTHORIZED: &str = "Not enough rights.";

pub const ROUTING_FAILED: &str =
    "Could not route your message: no applicant is bound. Reply to one of \
     the forwarded messages or use the reply button under one of them.";

pub const ADMIN_REPLY_PREFIX: &str = "<b>Reply from the administrator:</b>\n\n";

pub const APPROVE_BUTTON_LABEL: &str = "\u{2705} Approve";
pub const REJECT_BUTTON_LABEL: &str = "\u{274c} Reject";
pub const REPLY_BUTTON_LABEL: &str = "\u{2709} Reply to applicant";

pub fn reply_armed(applicant: PartyId, cancel_command: &str) -> String {
    format!(
        "You are replying to applicant <code>{applicant}</code>.\n\
         Write the message you want to send.\n\n\
         To cancel, send {cancel_command}"
    )
}

pub const REPLY_CANCELLED: &str = "Cancelled.";

pub fn relay_confirmed(applicant: PartyId) -> String {
    format!("\u{2705} Message sent to applicant {applicant}")
}

pub fn approved_ack(applicant: PartyId) -> String {
    format!("Questionnaire of applicant <code>{applicant}</code> approved.")
}

pub fn rejected_ack(applicant: PartyId) -> String {
    format!("Questionnaire of applicant <code>{applicant}</code> rejected.")
}

/// Header for a free-text message forwarded applicant → reviewer.
/// Carries the id in the `applicant <id>` reply-correlation shape.
pub fn forwarded_header(applicant: PartyId) -> String {
    format!("<b>Message from applicant {applicant}</b>:\n\n")
}

pub fn evidence_caption(applicant: PartyId) -> String {
    format!("Document photo, applicant {applicant}")
}

pub fn proof_caption(applicant: PartyId) -> String {
    format!("Identity proof from applicant {applicant}")
}

/// Round video-messages carry no caption, so the id travels in a
/// separate text right after the media.
pub fn round_video_note(applicant: PartyId) -> String {
    format!("Round video-message from applicant {applicant}")
}

pub fn followup_forward(applicant: PartyId, details: &str) -> String {
    format!(
        "<b>Pickup address and time from applicant {applicant}</b>\n\n\
         <b>Applicant:</b> <code>{applicant}</code>\n\
         <b>Details:</b> {details}"
    )
}

/// Render the submitted questionnaire for the reviewer.  The id is
/// embedded in the `<code>` shape so relay-by-reply resolves on it.
pub fn render_questionnaire(q: &Questionnaire) -> String {
    let mut lines = vec![
        "<b>New questionnaire</b>".to_owned(),
        String::new(),
        format!("<b>Applicant ID:</b> <code>{}</code>", q.applicant.party),
        String::new(),
    ];

    for (field, answer) in FIELDS.iter().zip(&q.answers) {
        lines.push(format!("<b>{}:</b> {answer}", field.label));
    }

    lines.push(String::new());
    lines.push(format!(
        "<b>Attachments:</b> {} document photo(s), identity proof ({}).",
        q.evidence.len(),
        q.proof.kind.label()
    ));

    lines.join("\n")
}
