//! Composite session identity: `(transport scope, party id)`.
//!
//! Both logical roles (applicant and reviewer) use the same key
//! shape; in direct chats the scope equals the party id.

use std::fmt;

use ir_domain::transport::{InboundEvent, PartyId};

/// Uniquely addresses one conversational session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartyKey {
    pub scope: PartyId,
    pub party: PartyId,
}

impl PartyKey {
    pub fn new(scope: PartyId, party: PartyId) -> Self {
        Self { scope, party }
    }

    /// Key for a direct chat, where the scope is the party itself.
    pub fn direct(party: PartyId) -> Self {
        Self {
            scope: party,
            party,
        }
    }

    pub fn from_event(event: &InboundEvent) -> Self {
        Self {
            scope: event.scope,
            party: event.sender,
        }
    }
}

impl fmt::Display for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.party)
    }
}
