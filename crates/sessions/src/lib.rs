//! Per-party conversational session state: keys, phases, the in-memory
//! store, and per-key run locks.

pub mod lock;
pub mod party_key;
pub mod state;
pub mod store;

pub use lock::{PartyBusy, PartyLockMap};
pub use party_key::PartyKey;
pub use state::{Draft, Phase, ProofMedia, Questionnaire, SessionState};
pub use store::SessionStore;
