// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory nonce sessions.
//!
//! At most one session per statechain id. Sessions are never persisted:
//! a restart invalidates every outstanding nonce.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::boundary::{PublicNonce, SealedNonce};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Outstanding,
    Spent,
    /// Swept after its TTL. Only the public nonce is kept, so a late claim
    /// still reports the nonce as stale.
    Expired,
}

#[derive(Debug, Clone)]
pub struct NonceSession {
    pub statechain_id: String,
    pub session_id: Uuid,
    pub public_nonce: PublicNonce,
    pub sealed_nonce: SealedNonce,
    /// Derivation context of the key the nonce was issued for.
    pub derivation_context: Vec<u8>,
    pub issued_at: Instant,
    pub state: SessionState,
}

impl NonceSession {
    pub fn new(
        statechain_id: impl Into<String>,
        public_nonce: PublicNonce,
        sealed_nonce: SealedNonce,
        derivation_context: Vec<u8>,
    ) -> Self {
        Self {
            statechain_id: statechain_id.into(),
            session_id: Uuid::new_v4(),
            public_nonce,
            sealed_nonce,
            derivation_context,
            issued_at: Instant::now(),
            state: SessionState::Outstanding,
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.issued_at.elapsed() >= ttl
    }

    fn expire(&mut self) {
        self.state = SessionState::Expired;
        self.sealed_nonce = SealedNonce::new(Vec::new());
    }
}

/// Why a session could not be claimed for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// No outstanding session carries the presented nonce.
    NotFound,
    /// The session expired or belongs to a rotated key; it is discarded.
    Stale,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, NonceSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `session` as the only valid one for its statechain.
    ///
    /// Returns the session it replaced if that one was still outstanding.
    pub fn issue(&self, session: NonceSession) -> Option<NonceSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        sessions
            .insert(session.statechain_id.clone(), session)
            .filter(|previous| previous.state == SessionState::Outstanding)
    }

    /// Validate the outstanding session and mark it spent.
    ///
    /// A nonce that does not match the outstanding one leaves that session
    /// untouched.
    pub fn claim(
        &self,
        statechain_id: &str,
        public_nonce: &PublicNonce,
        derivation_context: &[u8],
        ttl: Duration,
    ) -> Result<SealedNonce, ClaimError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());

        let session = sessions.get_mut(statechain_id).ok_or(ClaimError::NotFound)?;
        if session.state == SessionState::Spent || &session.public_nonce != public_nonce {
            return Err(ClaimError::NotFound);
        }

        if session.state == SessionState::Expired
            || session.is_expired(ttl)
            || session.derivation_context != derivation_context
        {
            sessions.remove(statechain_id);
            return Err(ClaimError::Stale);
        }

        session.state = SessionState::Spent;
        Ok(session.sealed_nonce.clone())
    }

    /// Drop any session for `statechain_id`.
    pub fn remove(&self, statechain_id: &str) -> Option<NonceSession> {
        self.sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(statechain_id)
    }

    /// Drop spent sessions and release the sealed nonce of outstanding ones
    /// older than `ttl`, leaving an `Expired` marker in their place.
    ///
    /// Returns the number of sessions reclaimed.
    pub fn purge(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        let mut reclaimed = 0;
        sessions.retain(|_, s| match s.state {
            SessionState::Spent => {
                reclaimed += 1;
                false
            }
            SessionState::Outstanding if s.is_expired(ttl) => {
                s.expire();
                reclaimed += 1;
                true
            }
            _ => true,
        });
        reclaimed
    }

    pub fn state(&self, statechain_id: &str) -> Option<SessionState> {
        self.sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(statechain_id)
            .map(|s| s.state)
    }
}
