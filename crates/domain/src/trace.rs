use serde::Serialize;

/// Structured trace events emitted across all IntakeRelay crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        party_key: String,
    },
    SessionReset {
        party_key: String,
        reason: String,
    },
    PhaseChanged {
        party_key: String,
        from: String,
        to: String,
    },
    ReviewSubmitted {
        applicant: i64,
        answers: usize,
        evidence_count: usize,
        proof_kind: String,
    },
    DecisionApplied {
        action: String,
        applicant: i64,
        reviewer: i64,
    },
    DecisionRefused {
        action: String,
        sender: i64,
    },
    RelayForwarded {
        from: i64,
        to: i64,
        payload: String,
    },
    RelayUnresolved {
        sender: i64,
    },
    DeliveryFailed {
        to: i64,
        primitive: String,
        error: String,
    },
    SessionsEvicted {
        evicted: usize,
        remaining: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ir_event");
    }
}
