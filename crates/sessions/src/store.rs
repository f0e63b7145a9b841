//! In-memory session store keyed by [`PartyKey`].
//!
//! The store is a plain map behind an `RwLock`.  All mutation goes
//! through closures under the write lock: [`Self::update`] for
//! unconditional writes (including cross-session writes from another
//! party's handler), [`Self::update_if`] for phase transitions that
//! must only land if the session is still where the handler read it.
//! A handler that read state, decided, and then finds the predicate
//! false has been overtaken by a cross-session write; its write-back
//! is dropped instead of clobbering the newer state.  The per-key
//! exclusion in [`crate::lock`] serializes events for one key; it does
//! not order writes arriving from another key's handler.
//!
//! Nothing is persisted: a process restart drops all sessions.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use ir_domain::trace::TraceEvent;

use crate::party_key::PartyKey;
use crate::state::{Phase, SessionState};

pub struct SessionStore {
    sessions: RwLock<HashMap<PartyKey, SessionState>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a session by key.
    pub fn get(&self, key: &PartyKey) -> Option<SessionState> {
        self.sessions.read().get(key).cloned()
    }

    /// Resolve or create the session for a key.  Returns `(state, is_new)`.
    pub fn get_or_create(&self, key: &PartyKey, now: DateTime<Utc>) -> (SessionState, bool) {
        // Fast path: session already exists.
        {
            let sessions = self.sessions.read();
            if let Some(state) = sessions.get(key) {
                return (state.clone(), false);
            }
        }

        let mut sessions = self.sessions.write();
        // Re-check: another event for the same key may have won the race.
        if let Some(state) = sessions.get(key) {
            return (state.clone(), false);
        }

        let state = SessionState::new(now);
        sessions.insert(*key, state.clone());
        TraceEvent::SessionCreated {
            party_key: key.to_string(),
        }
        .emit();
        (state, true)
    }

    /// Atomically mutate (creating if absent) a session from *another*
    /// party's handler, e.g. a reviewer decision arming the
    /// applicant's follow-up phase, or an applicant contact writing the
    /// reviewer's relay binding.  No run lock is taken for the target
    /// key; the single closure under the write lock is the atom.
    pub fn update<F>(&self, key: &PartyKey, now: DateTime<Utc>, f: F) -> SessionState
    where
        F: FnOnce(&mut SessionState),
    {
        let mut sessions = self.sessions.write();
        let state = sessions.entry(*key).or_insert_with(|| {
            TraceEvent::SessionCreated {
                party_key: key.to_string(),
            }
            .emit();
            SessionState::new(now)
        });
        f(state);
        state.updated_at = now;
        state.clone()
    }

    /// Conditionally mutate a session: the closure runs only if `pred`
    /// holds for the current state, all under one write lock.  Returns
    /// `None` without writing when the predicate fails or the session
    /// does not exist; the caller's read has gone stale and the newer
    /// state wins.
    pub fn update_if<P, F>(
        &self,
        key: &PartyKey,
        now: DateTime<Utc>,
        pred: P,
        f: F,
    ) -> Option<SessionState>
    where
        P: FnOnce(&SessionState) -> bool,
        F: FnOnce(&mut SessionState),
    {
        let mut sessions = self.sessions.write();
        let state = sessions.get_mut(key)?;
        if !pred(state) {
            return None;
        }
        f(state);
        state.updated_at = now;
        Some(state.clone())
    }

    /// Reset a session to the initial phase.
    pub fn reset(&self, key: &PartyKey, reason: &str, now: DateTime<Utc>) -> SessionState {
        let state = self.update(key, now, |state| state.reset(now));
        TraceEvent::SessionReset {
            party_key: key.to_string(),
            reason: reason.to_owned(),
        }
        .emit();
        state
    }

    /// Drop sessions idle for longer than `ttl`.  Sessions awaiting a
    /// reviewer decision are kept: evicting them would strand the
    /// decision token pointing at a phase that no longer exists.
    pub fn evict_idle(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, state| {
            state.phase == Phase::UnderReview || now - state.updated_at <= ttl
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            TraceEvent::SessionsEvicted {
                evicted,
                remaining: sessions.len(),
            }
            .emit();
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
