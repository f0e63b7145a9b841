//! IntakeRelay gateway: the onboarding form sequencer, the two-party
//! relay router, and the HTTP plumbing that connects both to a channel
//! connector.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod engine;
pub mod state;
pub mod transport;
