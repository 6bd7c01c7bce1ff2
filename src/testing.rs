// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test harness: a full stack over a temp dir with injectable faults.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use crate::boundary::{
    gateway::DEFAULT_CALL_TIMEOUT, BoundaryHandle, BoundaryResult, PartialSignature, PublicKey,
    PublicNonce, SealedBlob, SealedNonce, SealedShare, SimulatedBoundary, TrustedBoundary,
    TrustedBoundaryGateway,
};
use crate::sealing::SealingKeyManager;
use crate::signing::{SigningPolicy, SigningSessionCoordinator};
use crate::state::AppState;
use crate::storage::{
    AuditEvent, AuditLog, DerivedKeyRecord, EncryptedStorage, PersistenceError,
    PersistenceGateway, PersistenceResult, SecretStore, StatechainDatabase, StoragePaths,
};

/// Simulated boundary with adjustable per-call latency.
pub(crate) struct DelayedBoundary {
    inner: SimulatedBoundary,
    delay_ms: AtomicU64,
}

impl DelayedBoundary {
    pub(crate) fn new() -> Self {
        Self {
            inner: SimulatedBoundary::ephemeral(),
            delay_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn pause(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}

impl TrustedBoundary for DelayedBoundary {
    fn create_instance(&self) -> BoundaryResult<BoundaryHandle> {
        self.inner.create_instance()
    }

    fn destroy_instance(&self, handle: BoundaryHandle) -> BoundaryResult<()> {
        self.inner.destroy_instance(handle)
    }

    fn generate_master_secret(&self, handle: BoundaryHandle) -> BoundaryResult<SealedBlob> {
        self.pause();
        self.inner.generate_master_secret(handle)
    }

    fn derive_key(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
    ) -> BoundaryResult<PublicKey> {
        self.pause();
        self.inner.derive_key(handle, master, statechain_id, context)
    }

    fn generate_nonce(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
    ) -> BoundaryResult<(PublicNonce, SealedNonce)> {
        self.pause();
        self.inner.generate_nonce(handle, master, statechain_id, context)
    }

    fn seal_share(
        &self,
        handle: BoundaryHandle,
        index: u8,
        share: &[u8],
    ) -> BoundaryResult<SealedShare> {
        self.pause();
        self.inner.seal_share(handle, index, share)
    }

    fn recover_master_secret(
        &self,
        handle: BoundaryHandle,
        shares: &[SealedShare],
    ) -> BoundaryResult<SealedBlob> {
        self.pause();
        self.inner.recover_master_secret(handle, shares)
    }

    fn partial_sign(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
        message: &[u8],
        nonce: &SealedNonce,
    ) -> BoundaryResult<PartialSignature> {
        self.pause();
        self.inner
            .partial_sign(handle, master, statechain_id, context, message, nonce)
    }
}

/// redb persistence whose rotations can be made to fail.
pub(crate) struct FaultyPersistence {
    inner: StatechainDatabase,
    fail_rotations: AtomicBool,
}

impl FaultyPersistence {
    pub(crate) fn fail_rotations(&self, fail: bool) {
        self.fail_rotations.store(fail, Ordering::SeqCst);
    }
}

impl PersistenceGateway for FaultyPersistence {
    fn upsert_key(&self, record: &DerivedKeyRecord) -> PersistenceResult<()> {
        self.inner.upsert_key(record)
    }

    fn get_key(&self, statechain_id: &str) -> PersistenceResult<Option<DerivedKeyRecord>> {
        self.inner.get_key(statechain_id)
    }

    fn delete_key(&self, statechain_id: &str) -> PersistenceResult<()> {
        self.inner.delete_key(statechain_id)
    }

    fn rotate_key(&self, record: &DerivedKeyRecord) -> PersistenceResult<()> {
        if self.fail_rotations.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "injected rotation failure".to_string(),
            ));
        }
        self.inner.rotate_key(record)
    }

    fn increment_and_get_counter(&self, statechain_id: &str) -> PersistenceResult<u64> {
        self.inner.increment_and_get_counter(statechain_id)
    }

    fn get_counter(&self, statechain_id: &str) -> PersistenceResult<u64> {
        self.inner.get_counter(statechain_id)
    }
}

pub(crate) struct TestStack {
    pub _dir: TempDir,
    pub storage: EncryptedStorage,
    pub boundary: Arc<DelayedBoundary>,
    pub gateway: Arc<TrustedBoundaryGateway>,
    pub sealing: Arc<SealingKeyManager>,
    pub faults: Arc<FaultyPersistence>,
    pub persistence: Arc<dyn PersistenceGateway>,
    pub audit: Arc<AuditLog>,
    pub coordinator: Arc<SigningSessionCoordinator>,
}

impl TestStack {
    pub(crate) fn secret_store(&self) -> SecretStore {
        SecretStore::new(self.storage.clone())
    }

    /// Today's audit events, empty when none were written.
    pub(crate) fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit
            .read_events(&Utc::now().format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    pub(crate) fn app_state(&self) -> AppState {
        AppState::new(
            Arc::clone(&self.coordinator),
            Arc::clone(&self.sealing),
            Arc::clone(&self.gateway),
            self.storage.clone(),
        )
    }
}

async fn build(policy: SigningPolicy, call_timeout: Duration, with_secret: bool) -> TestStack {
    let dir = TempDir::new().unwrap();
    let mut storage = EncryptedStorage::new(StoragePaths::new(dir.path()));
    storage.initialize().unwrap();

    let boundary = Arc::new(DelayedBoundary::new());
    let gateway = Arc::new(
        TrustedBoundaryGateway::initialize(
            Arc::clone(&boundary) as Arc<dyn TrustedBoundary>,
            call_timeout,
        )
        .await
        .unwrap(),
    );

    let audit = Arc::new(AuditLog::new(storage.clone()));
    let sealing = Arc::new(
        SealingKeyManager::bootstrap(
            SecretStore::new(storage.clone()),
            Arc::clone(&gateway),
            Some(Arc::clone(&audit)),
        )
        .unwrap(),
    );
    if with_secret {
        sealing.add_secret().await.unwrap();
    }

    let faults = Arc::new(FaultyPersistence {
        inner: StatechainDatabase::open(&storage.paths().statechain_db()).unwrap(),
        fail_rotations: AtomicBool::new(false),
    });
    let persistence: Arc<dyn PersistenceGateway> = faults.clone();

    let coordinator = Arc::new(
        SigningSessionCoordinator::new(
            Arc::clone(&sealing),
            Arc::clone(&gateway),
            Arc::clone(&persistence),
            policy,
        )
        .with_audit(Arc::clone(&audit)),
    );

    TestStack {
        _dir: dir,
        storage,
        boundary,
        gateway,
        sealing,
        faults,
        persistence,
        audit,
        coordinator,
    }
}

/// Full stack without a master secret.
pub(crate) async fn stack() -> TestStack {
    build(SigningPolicy::default(), DEFAULT_CALL_TIMEOUT, false).await
}

/// Full stack with a generated master secret.
pub(crate) async fn stack_with_secret() -> TestStack {
    build(SigningPolicy::default(), DEFAULT_CALL_TIMEOUT, true).await
}

pub(crate) async fn stack_with_policy(policy: SigningPolicy) -> TestStack {
    build(policy, DEFAULT_CALL_TIMEOUT, true).await
}

pub(crate) async fn stack_with_timeout(call_timeout: Duration) -> TestStack {
    build(SigningPolicy::default(), call_timeout, true).await
}
