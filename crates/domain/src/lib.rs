//! Shared types for the IntakeRelay workspace: configuration, errors,
//! structured trace events, and the abstract chat transport contract.

pub mod config;
pub mod error;
pub mod trace;
pub mod transport;
