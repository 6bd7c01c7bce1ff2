// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Statechain signing protocol.
//!
//! Per statechain id:
//!
//! ```text
//! NoKey -> KeyIssued -> NonceIssued -> Signed (-> NonceIssued ...)
//!              ^                          |
//!              `------- Transferred <-----'
//! any state -- delete --> NoKey
//! ```
//!
//! Every mutating operation holds the statechain's lock from the first read
//! to the last write. Boundary calls additionally serialize on the gateway's
//! global lock, which is held only for the call itself.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::locks::StatechainLocks;
use super::session::{ClaimError, NonceSession, SessionState, SessionStore};
use crate::boundary::{PartialSignature, PublicKey, PublicNonce, TrustedBoundaryGateway};
use crate::error::{ServiceError, ServiceResult};
use crate::sealing::SealingKeyManager;
use crate::storage::{
    fresh_derivation_context, AuditEvent, AuditEventType, AuditLog, DerivedKeyRecord,
    PersistenceGateway,
};

/// Default lifetime of an unused nonce session.
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct SigningPolicy {
    pub nonce_ttl: Duration,
    /// Upper bound on partial signatures per key; `None` is unlimited.
    pub max_signatures: Option<u64>,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            nonce_ttl: DEFAULT_NONCE_TTL,
            max_signatures: None,
        }
    }
}

/// Result of a successful partial-signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSignature {
    pub partial_signature: PartialSignature,
    /// Counter value after this signature.
    pub sig_count: u64,
}

pub struct SigningSessionCoordinator {
    sealing: Arc<SealingKeyManager>,
    gateway: Arc<TrustedBoundaryGateway>,
    persistence: Arc<dyn PersistenceGateway>,
    sessions: SessionStore,
    locks: StatechainLocks,
    policy: SigningPolicy,
    audit: Option<Arc<AuditLog>>,
}

impl SigningSessionCoordinator {
    pub fn new(
        sealing: Arc<SealingKeyManager>,
        gateway: Arc<TrustedBoundaryGateway>,
        persistence: Arc<dyn PersistenceGateway>,
        policy: SigningPolicy,
    ) -> Self {
        Self {
            sealing,
            gateway,
            persistence,
            sessions: SessionStore::new(),
            locks: StatechainLocks::new(),
            policy,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn policy(&self) -> &SigningPolicy {
        &self.policy
    }

    /// Return the server key for `statechain_id`, deriving it on first use.
    ///
    /// Safe to retry: an existing record is returned without re-derivation.
    /// A first use after `delete` derives under a new salt, never the old key.
    pub async fn issue_key(&self, statechain_id: &str) -> ServiceResult<PublicKey> {
        validate_id(statechain_id)?;
        let _guard = self.locks.acquire(statechain_id).await;

        if let Some(record) = self.persistence.get_key(statechain_id)? {
            debug!(statechain_id, "Returning existing server key");
            return Ok(record.public_key);
        }

        let master = self.sealing.sealed_secret().await?;
        let context = fresh_derivation_context(&[]);
        let public_key = self
            .gateway
            .derive_key(&master, statechain_id, &context)
            .await?;

        self.persistence.upsert_key(&DerivedKeyRecord::new(
            statechain_id,
            public_key.clone(),
            context,
        ))?;

        info!(statechain_id, server_pubkey = %public_key, "Server key issued");
        self.audit(
            AuditEvent::new(AuditEventType::KeyIssued)
                .with_statechain(statechain_id)
                .with_details(serde_json::json!({ "server_pubkey": public_key.to_hex() })),
        );

        Ok(public_key)
    }

    /// Issue a fresh nonce. Any outstanding nonce for the id stops being valid.
    pub async fn issue_nonce(&self, statechain_id: &str) -> ServiceResult<PublicNonce> {
        validate_id(statechain_id)?;
        let _guard = self.locks.acquire(statechain_id).await;

        let record = self.require_key(statechain_id)?;
        let master = self.sealing.sealed_secret().await?;

        let (public_nonce, sealed_nonce) = self
            .gateway
            .generate_nonce(&master, statechain_id, &record.derivation_context)
            .await?;

        let session = NonceSession::new(
            statechain_id,
            public_nonce.clone(),
            sealed_nonce,
            record.derivation_context,
        );
        let session_id = session.session_id;
        if let Some(previous) = self.sessions.issue(session) {
            debug!(
                statechain_id,
                superseded = %previous.session_id,
                "Outstanding nonce superseded"
            );
        }

        info!(statechain_id, %session_id, "Nonce issued");
        Ok(public_nonce)
    }

    /// Consume the outstanding nonce `public_nonce` and sign `message`.
    ///
    /// The session is spent before the boundary call, so a failed or
    /// abandoned call still burns the nonce.
    pub async fn issue_partial_signature(
        &self,
        statechain_id: &str,
        public_nonce: &PublicNonce,
        message: &[u8],
    ) -> ServiceResult<IssuedSignature> {
        validate_id(statechain_id)?;
        if message.is_empty() {
            return Err(ServiceError::InvalidRequest("message is empty".into()));
        }
        let _guard = self.locks.acquire(statechain_id).await;

        let record = self.require_key(statechain_id)?;

        if let Some(limit) = self.policy.max_signatures {
            if self.persistence.get_counter(statechain_id)? >= limit {
                return Err(ServiceError::SignatureLimitReached {
                    statechain_id: statechain_id.to_string(),
                    limit,
                });
            }
        }

        let master = self.sealing.sealed_secret().await?;

        let sealed_nonce = self
            .sessions
            .claim(
                statechain_id,
                public_nonce,
                &record.derivation_context,
                self.policy.nonce_ttl,
            )
            .map_err(|e| match e {
                ClaimError::NotFound => ServiceError::SessionNotFound(statechain_id.to_string()),
                ClaimError::Stale => ServiceError::StaleNonce(statechain_id.to_string()),
            })?;

        let partial_signature = self
            .gateway
            .compute_partial_signature(
                &master,
                statechain_id,
                &record.derivation_context,
                message,
                &sealed_nonce,
            )
            .await?;

        let sig_count = self.persistence.increment_and_get_counter(statechain_id)?;

        info!(statechain_id, sig_count, "Partial signature issued");
        self.audit(
            AuditEvent::new(AuditEventType::PartialSignatureIssued)
                .with_statechain(statechain_id)
                .with_details(serde_json::json!({ "sig_count": sig_count })),
        );

        Ok(IssuedSignature {
            partial_signature,
            sig_count,
        })
    }

    /// Partial signatures issued under the current key; 0 for unknown ids.
    pub async fn count_signatures(&self, statechain_id: &str) -> ServiceResult<u64> {
        validate_id(statechain_id)?;
        Ok(self.persistence.get_counter(statechain_id)?)
    }

    /// Rotate the server key to one bound to `new_owner_material`.
    ///
    /// On success the counter is reset and any outstanding nonce is
    /// invalidated. On failure the previous key, counter and session stay
    /// exactly as they were.
    pub async fn transfer(
        &self,
        statechain_id: &str,
        new_owner_material: &[u8],
    ) -> ServiceResult<PublicKey> {
        validate_id(statechain_id)?;
        if new_owner_material.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "new owner material is empty".into(),
            ));
        }
        let _guard = self.locks.acquire(statechain_id).await;

        let record = self.require_key(statechain_id)?;
        let master = self.sealing.sealed_secret().await?;

        let context = fresh_derivation_context(new_owner_material);
        let public_key = self
            .gateway
            .derive_key(&master, statechain_id, &context)
            .await?;

        let rotated = record.rotated(public_key.clone(), context);
        self.persistence.rotate_key(&rotated)?;

        if let Some(session) = self.sessions.remove(statechain_id) {
            if session.state == SessionState::Outstanding {
                debug!(statechain_id, "Outstanding nonce invalidated by key rotation");
            }
        }

        info!(
            statechain_id,
            previous_pubkey = %record.public_key,
            server_pubkey = %public_key,
            "Server key rotated"
        );
        self.audit(
            AuditEvent::new(AuditEventType::KeyRotated)
                .with_statechain(statechain_id)
                .with_details(serde_json::json!({
                    "previous_pubkey": record.public_key.to_hex(),
                    "server_pubkey": public_key.to_hex(),
                })),
        );

        Ok(public_key)
    }

    /// Remove every trace of `statechain_id`. Unknown ids succeed.
    pub async fn delete(&self, statechain_id: &str) -> ServiceResult<()> {
        validate_id(statechain_id)?;
        let _guard = self.locks.acquire(statechain_id).await;

        self.persistence.delete_key(statechain_id)?;
        self.sessions.remove(statechain_id);

        info!(statechain_id, "Statechain deleted");
        self.audit(AuditEvent::new(AuditEventType::StatechainDeleted).with_statechain(statechain_id));
        Ok(())
    }

    /// Drop expired and spent nonce sessions.
    pub fn purge_sessions(&self) -> usize {
        self.sessions.purge(self.policy.nonce_ttl)
    }

    fn require_key(&self, statechain_id: &str) -> ServiceResult<DerivedKeyRecord> {
        self.persistence
            .get_key(statechain_id)?
            .ok_or_else(|| ServiceError::UnknownStatechain(statechain_id.to_string()))
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn session_state(&self, statechain_id: &str) -> Option<SessionState> {
        self.sessions.state(statechain_id)
    }

    #[cfg(test)]
    pub(crate) fn live_locks(&self) -> usize {
        self.locks.len()
    }
}

fn validate_id(statechain_id: &str) -> ServiceResult<()> {
    if statechain_id.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(
            "statechain_id must not be empty".into(),
        ));
    }
    Ok(())
}
