//! Per-party concurrency control.
//!
//! Concurrent events sharing one [`PartyKey`] must not interleave their
//! read-modify-write of session state, or transitions get duplicated or
//! lost (two near-simultaneous photo uploads racing to append, for
//! example).  Events for different keys run fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::party_key::PartyKey;

/// Manages per-party run locks.
///
/// Each key maps to a `Semaphore(1)`.  Holding the permit ensures
/// exclusive access for one event at a time; later events for the same
/// key wait their turn.
pub struct PartyLockMap {
    locks: Mutex<HashMap<PartyKey, Arc<Semaphore>>>,
}

impl Default for PartyLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PartyLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the run lock for a party, waiting until the current
    /// holder finishes.  Hold the permit for the duration of the event;
    /// it auto-releases on drop.
    pub async fn acquire(&self, key: &PartyKey) -> Result<OwnedSemaphorePermit, PartyBusy> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(*key)
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        sem.acquire_owned().await.map_err(|_| PartyBusy)
    }

    /// Number of tracked parties (for monitoring).
    pub fn party_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Remove locks no party is using (cleanup, run alongside the
    /// store's eviction sweep).  An entry is kept while any clone of
    /// its semaphore is live outside the map: a held permit keeps one,
    /// and so does an `acquire` that has cloned the Arc but not yet
    /// acquired.  Dropping such an entry would let the next `acquire`
    /// mint a second semaphore for the same key, breaking exclusion.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| Arc::strong_count(sem) > 1 || sem.available_permits() == 0);
    }
}

/// Error returned when a party's lock can no longer be acquired.
#[derive(Debug)]
pub struct PartyBusy;

impl std::fmt::Display for PartyBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "party lock unavailable, an event is already in progress")
    }
}

impl std::error::Error for PartyBusy {}
