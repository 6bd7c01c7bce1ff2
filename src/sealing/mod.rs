// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Master Secret Lifecycle
//!
//! [`SealingKeyManager`] owns the sealed master secret for the lifetime of
//! the process. At startup it tries to load the artifact; afterwards the
//! secret can be generated exactly once through [`SealingKeyManager::add_secret`].
//!
//! ```text
//! Uninitialized --add_secret-----------------------------> Sealed
//!       |  \                                                  ^
//!       |   `--add_mnemonic--> Recovering --threshold met----'
//!       `--startup load-----> Loaded
//! ```
//!
//! Generation and recovery are idempotent: when a secret already exists (in
//! memory or on disk) the request reports `AlreadyExists` and nothing is
//! written.
//!
//! ## Recovery
//!
//! An operator rebuilds a lost secret from Shamir shares of it, each
//! submitted as a 24-word BIP39 mnemonic encoding a 32-byte share value.
//! Shares are sealed by the boundary as they arrive and held in memory;
//! interpolation happens inside the boundary once `threshold` distinct
//! indices are present. A restart discards pending shares.

use std::sync::Arc;

use bip39::{Language, Mnemonic};
use tokio::sync::RwLock;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::boundary::{BoundaryError, SealedBlob, SealedShare, TrustedBoundaryGateway};
use crate::error::{RecoveryStatus, SecretStatus, ServiceError, ServiceResult};
use crate::storage::{AuditEvent, AuditEventType, AuditLog, SecretStore, SecretStoreError};

/// Bytes of entropy in a 24-word mnemonic, and of one share value.
const SHARE_LEN: usize = 32;

#[derive(Debug, Clone)]
enum SealingState {
    /// No secret yet; key operations fail with `SecretMissing`.
    Uninitialized,
    /// Secret recovered from the store at startup.
    Loaded(Arc<SealedBlob>),
    /// Secret generated or recovered by this process.
    Sealed(Arc<SealedBlob>),
    /// Recovery shares collected so far; no secret yet.
    Recovering {
        threshold: u8,
        shares: Vec<SealedShare>,
    },
}

impl SealingState {
    fn secret(&self) -> Option<&Arc<SealedBlob>> {
        match self {
            SealingState::Uninitialized | SealingState::Recovering { .. } => None,
            SealingState::Loaded(blob) | SealingState::Sealed(blob) => Some(blob),
        }
    }
}

pub struct SealingKeyManager {
    store: SecretStore,
    gateway: Arc<TrustedBoundaryGateway>,
    audit: Option<Arc<AuditLog>>,
    state: RwLock<SealingState>,
}

impl SealingKeyManager {
    /// Load the sealed secret if one exists.
    ///
    /// A missing or unreadable artifact leaves the manager `Uninitialized`.
    /// A corrupted artifact is returned as an error, which is fatal.
    pub fn bootstrap(
        store: SecretStore,
        gateway: Arc<TrustedBoundaryGateway>,
        audit: Option<Arc<AuditLog>>,
    ) -> ServiceResult<Self> {
        let state = match store.load() {
            Ok(blob) => {
                info!("Sealed master secret loaded");
                SealingState::Loaded(Arc::new(blob))
            }
            Err(SecretStoreError::NotFound) => {
                info!("No sealed master secret found; generation required");
                SealingState::Uninitialized
            }
            Err(SecretStoreError::Io(e)) => {
                warn!(error = %e, "Sealed master secret unreadable; treating as missing");
                SealingState::Uninitialized
            }
            Err(e @ SecretStoreError::Corrupted(_)) => return Err(e.into()),
        };

        Ok(Self {
            store,
            gateway,
            audit,
            state: RwLock::new(state),
        })
    }

    /// Generate the master secret unless one already exists.
    ///
    /// Concurrent callers serialize on the state lock: exactly one observes
    /// `Generated`, the others `AlreadyExists`. A recovery in progress is
    /// abandoned.
    pub async fn add_secret(&self) -> ServiceResult<SecretStatus> {
        let mut state = self.state.write().await;

        if self.adopt_existing(&mut state)? {
            info!("Master secret already exists; generation skipped");
            return Ok(SecretStatus::AlreadyExists);
        }

        let blob = self.gateway.generate_master_secret().await?;
        self.store.store(&blob)?;

        *state = SealingState::Sealed(Arc::new(blob));
        info!("Master secret generated and sealed");

        if let Some(audit) = &self.audit {
            audit.record(AuditEvent::new(AuditEventType::SecretGenerated));
        }

        Ok(SecretStatus::Generated)
    }

    /// Submit recovery share `index` of a secret split with `threshold`.
    ///
    /// Resubmitting an index replaces the earlier share. Every share of one
    /// recovery must name the same threshold.
    pub async fn add_mnemonic(
        &self,
        mnemonic: &str,
        index: u8,
        threshold: u8,
    ) -> ServiceResult<RecoveryStatus> {
        if index == 0 {
            return Err(ServiceError::InvalidRequest(
                "share index must be between 1 and 255".into(),
            ));
        }
        if threshold == 0 {
            return Err(ServiceError::InvalidRequest(
                "threshold must be at least 1".into(),
            ));
        }
        let share = mnemonic_entropy(mnemonic)?;

        let mut state = self.state.write().await;

        if self.adopt_existing(&mut state)? {
            info!("Master secret already exists; recovery share ignored");
            return Ok(RecoveryStatus::AlreadyExists);
        }

        if let SealingState::Recovering {
            threshold: pending, ..
        } = &*state
        {
            if *pending != threshold {
                return Err(ServiceError::InvalidRequest(format!(
                    "threshold {threshold} does not match pending recovery threshold {pending}"
                )));
            }
        }

        let sealed = self
            .gateway
            .seal_share(index, &share)
            .await
            .map_err(|e| match e {
                BoundaryError::InvalidInput(reason) => ServiceError::InvalidRequest(reason),
                other => other.into(),
            })?;

        let mut shares = match std::mem::replace(&mut *state, SealingState::Uninitialized) {
            SealingState::Recovering { shares, .. } => shares,
            _ => Vec::new(),
        };
        shares.retain(|s| s.index() != index);
        shares.push(sealed);
        info!(index, received = shares.len(), threshold, "Recovery share accepted");

        if shares.len() < usize::from(threshold) {
            let received = shares.len();
            *state = SealingState::Recovering { threshold, shares };
            return Ok(RecoveryStatus::ShareAccepted {
                received,
                threshold,
            });
        }

        let blob = match self.gateway.recover_master_secret(&shares).await {
            Ok(blob) => blob,
            Err(e) => {
                *state = SealingState::Recovering { threshold, shares };
                return Err(e.into());
            }
        };
        if let Err(e) = self.store.store(&blob) {
            *state = SealingState::Recovering { threshold, shares };
            return Err(e.into());
        }

        *state = SealingState::Sealed(Arc::new(blob));
        info!(threshold, "Master secret recovered and sealed");

        if let Some(audit) = &self.audit {
            audit.record(
                AuditEvent::new(AuditEventType::SecretRecovered)
                    .with_details(serde_json::json!({ "threshold": threshold })),
            );
        }

        Ok(RecoveryStatus::Recovered)
    }

    /// Whether a secret is held, adopting one written to disk since startup.
    ///
    /// An artifact that exists but cannot be read is an error and is never
    /// overwritten.
    fn adopt_existing(&self, state: &mut SealingState) -> ServiceResult<bool> {
        if state.secret().is_some() {
            return Ok(true);
        }

        match self.store.load() {
            Ok(blob) => {
                info!("Sealed master secret found on disk");
                *state = SealingState::Loaded(Arc::new(blob));
                Ok(true)
            }
            Err(SecretStoreError::NotFound) => Ok(false),
            Err(e) if self.store.exists() => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    /// The sealed secret, for passing back into the boundary.
    pub async fn sealed_secret(&self) -> ServiceResult<Arc<SealedBlob>> {
        self.state
            .read()
            .await
            .secret()
            .cloned()
            .ok_or(ServiceError::SecretMissing)
    }

    pub async fn has_secret(&self) -> bool {
        self.state.read().await.secret().is_some()
    }

    /// Lifecycle state name, for health reporting.
    pub async fn state_name(&self) -> &'static str {
        match &*self.state.read().await {
            SealingState::Uninitialized => "uninitialized",
            SealingState::Loaded(_) => "loaded",
            SealingState::Sealed(_) => "sealed",
            SealingState::Recovering { .. } => "recovering",
        }
    }
}

/// Decode a 24-word English mnemonic into its 32-byte entropy.
fn mnemonic_entropy(phrase: &str) -> ServiceResult<Zeroizing<Vec<u8>>> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    );
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| ServiceError::InvalidRequest(format!("mnemonic: {e}")))?;

    let entropy = Zeroizing::new(mnemonic.to_entropy());
    if entropy.len() != SHARE_LEN {
        return Err(ServiceError::InvalidRequest(
            "mnemonic must have 24 words".into(),
        ));
    }
    Ok(entropy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use k256::elliptic_curve::PrimeField;
    use k256::{NonZeroScalar, Scalar};
    use rand_core::OsRng;

    /// Shamir shares `secret + slope * i` as 24-word mnemonics.
    fn mnemonic_shares(indices: &[u8]) -> Vec<(u8, String)> {
        let secret: Scalar = *NonZeroScalar::random(&mut OsRng);
        let slope: Scalar = *NonZeroScalar::random(&mut OsRng);
        indices
            .iter()
            .map(|&i| {
                let y = secret + slope * Scalar::from(u64::from(i));
                let phrase = Mnemonic::from_entropy(y.to_repr().as_slice())
                    .unwrap()
                    .to_string();
                (i, phrase)
            })
            .collect()
    }

    async fn pubkey_of(stack: &testing::TestStack) -> crate::boundary::PublicKey {
        let master = stack.sealing.sealed_secret().await.unwrap();
        stack.gateway.derive_key(&master, "abc", b"ctx").await.unwrap()
    }

    #[tokio::test]
    async fn recovery_completes_at_threshold() {
        let stack = testing::stack().await;
        let shares = mnemonic_shares(&[1, 2, 3]);

        assert_eq!(
            stack.sealing.add_mnemonic(&shares[0].1, 1, 2).await.unwrap(),
            RecoveryStatus::ShareAccepted {
                received: 1,
                threshold: 2
            }
        );
        assert_eq!(stack.sealing.state_name().await, "recovering");
        assert!(matches!(
            stack.sealing.sealed_secret().await,
            Err(ServiceError::SecretMissing)
        ));

        assert_eq!(
            stack.sealing.add_mnemonic(&shares[2].1, 3, 2).await.unwrap(),
            RecoveryStatus::Recovered
        );
        assert_eq!(stack.sealing.state_name().await, "sealed");
        let master = stack.sealing.sealed_secret().await.unwrap();
        assert_eq!(stack.secret_store().load().unwrap(), *master);
        assert_eq!(
            stack.audit_events().last().unwrap().event_type,
            AuditEventType::SecretRecovered
        );

        // Later shares are ignored.
        assert_eq!(
            stack.sealing.add_mnemonic(&shares[1].1, 2, 2).await.unwrap(),
            RecoveryStatus::AlreadyExists
        );
    }

    #[tokio::test]
    async fn different_share_subsets_recover_the_same_secret() {
        let shares = mnemonic_shares(&[1, 2, 3]);

        let first = testing::stack().await;
        first.sealing.add_mnemonic(&shares[0].1, 1, 2).await.unwrap();
        first.sealing.add_mnemonic(&shares[1].1, 2, 2).await.unwrap();

        let second = testing::stack().await;
        second.sealing.add_mnemonic(&shares[1].1, 2, 2).await.unwrap();
        second.sealing.add_mnemonic(&shares[2].1, 3, 2).await.unwrap();

        assert_eq!(pubkey_of(&first).await, pubkey_of(&second).await);
    }

    #[tokio::test]
    async fn resubmitted_index_replaces_share() {
        let stack = testing::stack().await;
        let shares = mnemonic_shares(&[1]);

        for _ in 0..2 {
            assert_eq!(
                stack.sealing.add_mnemonic(&shares[0].1, 1, 2).await.unwrap(),
                RecoveryStatus::ShareAccepted {
                    received: 1,
                    threshold: 2
                }
            );
        }
    }

    #[tokio::test]
    async fn recovery_rejects_invalid_shares() {
        let stack = testing::stack().await;
        let shares = mnemonic_shares(&[1, 2]);

        let twelve_words = Mnemonic::from_entropy(&[7u8; 16]).unwrap().to_string();
        for (phrase, index, threshold) in [
            ("not a mnemonic at all", 1, 2),
            (twelve_words.as_str(), 1, 2),
            (shares[0].1.as_str(), 0, 2),
            (shares[0].1.as_str(), 1, 0),
        ] {
            assert!(matches!(
                stack.sealing.add_mnemonic(phrase, index, threshold).await,
                Err(ServiceError::InvalidRequest(_))
            ));
        }
        assert_eq!(stack.sealing.state_name().await, "uninitialized");

        stack.sealing.add_mnemonic(&shares[0].1, 1, 2).await.unwrap();
        assert!(matches!(
            stack.sealing.add_mnemonic(&shares[1].1, 2, 3).await,
            Err(ServiceError::InvalidRequest(_))
        ));
        assert_eq!(stack.sealing.state_name().await, "recovering");
    }

    #[tokio::test]
    async fn recovery_with_existing_secret_is_a_no_op() {
        let stack = testing::stack_with_secret().await;
        let before = stack.sealing.sealed_secret().await.unwrap();
        let shares = mnemonic_shares(&[1]);

        assert_eq!(
            stack.sealing.add_mnemonic(&shares[0].1, 1, 1).await.unwrap(),
            RecoveryStatus::AlreadyExists
        );
        assert_eq!(stack.sealing.sealed_secret().await.unwrap(), before);
    }

    #[tokio::test]
    async fn starts_uninitialized_without_artifact() {
        let stack = testing::stack().await;

        assert_eq!(stack.sealing.state_name().await, "uninitialized");
        assert!(matches!(
            stack.sealing.sealed_secret().await,
            Err(ServiceError::SecretMissing)
        ));
    }

    #[tokio::test]
    async fn add_secret_generates_once() {
        let stack = testing::stack().await;

        assert_eq!(
            stack.sealing.add_secret().await.unwrap(),
            SecretStatus::Generated
        );
        let first = stack.sealing.sealed_secret().await.unwrap();
        assert_eq!(stack.sealing.state_name().await, "sealed");

        assert_eq!(
            stack.sealing.add_secret().await.unwrap(),
            SecretStatus::AlreadyExists
        );
        let second = stack.sealing.sealed_secret().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(stack.secret_store().load().unwrap(), *first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_add_secret_generates_exactly_one() {
        let stack = testing::stack().await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let sealing = Arc::clone(&stack.sealing);
                tokio::spawn(async move { sealing.add_secret().await.unwrap() })
            })
            .collect();

        let mut generated = 0;
        for task in tasks {
            if task.await.unwrap() == SecretStatus::Generated {
                generated += 1;
            }
        }
        assert_eq!(generated, 1);
    }

    #[tokio::test]
    async fn bootstrap_loads_existing_secret() {
        let stack = testing::stack_with_secret().await;
        let original = stack.sealing.sealed_secret().await.unwrap();

        let reloaded = SealingKeyManager::bootstrap(
            stack.secret_store(),
            Arc::clone(&stack.gateway),
            None,
        )
        .unwrap();

        assert_eq!(reloaded.state_name().await, "loaded");
        assert_eq!(reloaded.sealed_secret().await.unwrap(), original);
        assert_eq!(
            reloaded.add_secret().await.unwrap(),
            SecretStatus::AlreadyExists
        );
    }

    #[tokio::test]
    async fn add_secret_adopts_artifact_written_after_startup() {
        let stack = testing::stack().await;
        let blob = stack.gateway.generate_master_secret().await.unwrap();
        stack.secret_store().store(&blob).unwrap();

        assert_eq!(
            stack.sealing.add_secret().await.unwrap(),
            SecretStatus::AlreadyExists
        );
        assert_eq!(*stack.sealing.sealed_secret().await.unwrap(), blob);
    }

    #[tokio::test]
    async fn corrupted_artifact_is_fatal_and_never_overwritten() {
        let stack = testing::stack().await;
        let path = stack.storage.paths().sealed_secret();
        stack.storage.write_raw(&path, b"{ not an envelope").unwrap();

        let err = SealingKeyManager::bootstrap(
            stack.secret_store(),
            Arc::clone(&stack.gateway),
            None,
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());

        // The manager built before the corruption refuses to overwrite it.
        assert!(stack.sealing.add_secret().await.is_err());
        assert_eq!(
            stack.storage.read_raw(&path).unwrap(),
            b"{ not an envelope".to_vec()
        );
    }
}
