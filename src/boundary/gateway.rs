// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single serialization point for every call into the trusted boundary.
//!
//! The instance handle lives inside one process-wide `tokio::sync::Mutex`.
//! Each call takes an owned guard, moves it onto a blocking thread together
//! with the call, and drops it only when the boundary returns. The caller's
//! wait is bounded by a timeout; when it fires the caller gets
//! [`BoundaryError::Timeout`] while the call itself still runs to completion
//! and only then releases the lock. No other work happens under the lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use zeroize::Zeroizing;

use super::{
    BoundaryError, BoundaryHandle, BoundaryResult, PartialSignature, PublicKey, PublicNonce,
    SealedBlob, SealedNonce, SealedShare, TrustedBoundary,
};

/// Default upper bound on how long a caller waits for one boundary call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Exclusive, timeout-bounded access to the trusted boundary.
pub struct TrustedBoundaryGateway {
    boundary: Arc<dyn TrustedBoundary>,
    handle: Arc<Mutex<Option<BoundaryHandle>>>,
    call_timeout: Duration,
}

impl TrustedBoundaryGateway {
    /// Create the boundary instance and take ownership of its handle.
    ///
    /// Failure here is fatal to the process.
    pub async fn initialize(
        boundary: Arc<dyn TrustedBoundary>,
        call_timeout: Duration,
    ) -> BoundaryResult<Self> {
        let gateway = Self {
            boundary,
            handle: Arc::new(Mutex::new(None)),
            call_timeout,
        };

        {
            let mut slot = gateway.handle.clone().lock_owned().await;
            let boundary = Arc::clone(&gateway.boundary);
            let handle = tokio::task::spawn_blocking(move || boundary.create_instance())
                .await
                .map_err(|e| BoundaryError::InitFailed(e.to_string()))??;
            tracing::info!(%handle, "Trusted boundary initialized");
            *slot = Some(handle);
        }

        Ok(gateway)
    }

    /// Destroy the instance. Later calls fail with `NotInitialized`.
    pub async fn shutdown(&self) -> BoundaryResult<()> {
        let mut slot = self.handle.clone().lock_owned().await;
        let Some(handle) = slot.take() else {
            return Ok(());
        };
        let boundary = Arc::clone(&self.boundary);
        tokio::task::spawn_blocking(move || boundary.destroy_instance(handle))
            .await
            .map_err(|e| BoundaryError::CallFailed {
                operation: "destroy_instance",
                reason: e.to_string(),
            })??;
        tracing::info!(%handle, "Trusted boundary destroyed");
        Ok(())
    }

    /// Whether a live instance is held.
    pub async fn is_initialized(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub async fn generate_master_secret(&self) -> BoundaryResult<SealedBlob> {
        self.call("generate_master_secret", move |boundary, handle| {
            boundary.generate_master_secret(handle)
        })
        .await
    }

    pub async fn derive_key(
        &self,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
    ) -> BoundaryResult<PublicKey> {
        let master = master.clone();
        let statechain_id = statechain_id.to_string();
        let context = context.to_vec();
        self.call("derive_key", move |boundary, handle| {
            boundary.derive_key(handle, &master, &statechain_id, &context)
        })
        .await
    }

    pub async fn generate_nonce(
        &self,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
    ) -> BoundaryResult<(PublicNonce, SealedNonce)> {
        let master = master.clone();
        let statechain_id = statechain_id.to_string();
        let context = context.to_vec();
        self.call("generate_nonce", move |boundary, handle| {
            boundary.generate_nonce(handle, &master, &statechain_id, &context)
        })
        .await
    }

    pub async fn seal_share(&self, index: u8, share: &[u8]) -> BoundaryResult<SealedShare> {
        let share = Zeroizing::new(share.to_vec());
        self.call("seal_share", move |boundary, handle| {
            boundary.seal_share(handle, index, &share)
        })
        .await
    }

    pub async fn recover_master_secret(
        &self,
        shares: &[SealedShare],
    ) -> BoundaryResult<SealedBlob> {
        let shares = shares.to_vec();
        self.call("recover_master_secret", move |boundary, handle| {
            boundary.recover_master_secret(handle, &shares)
        })
        .await
    }

    pub async fn compute_partial_signature(
        &self,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
        message: &[u8],
        nonce: &SealedNonce,
    ) -> BoundaryResult<PartialSignature> {
        let master = master.clone();
        let statechain_id = statechain_id.to_string();
        let context = context.to_vec();
        let message = message.to_vec();
        let nonce = nonce.clone();
        self.call("partial_sign", move |boundary, handle| {
            boundary.partial_sign(handle, &master, &statechain_id, &context, &message, &nonce)
        })
        .await
    }

    async fn call<T, F>(&self, operation: &'static str, f: F) -> BoundaryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TrustedBoundary, BoundaryHandle) -> BoundaryResult<T> + Send + 'static,
    {
        let boundary = Arc::clone(&self.boundary);
        let slot = Arc::clone(&self.handle);
        let started = Instant::now();

        let in_flight = async move {
            let guard = slot.lock_owned().await;
            tokio::task::spawn_blocking(move || {
                let handle = (*guard).ok_or(BoundaryError::NotInitialized)?;
                let result = f(boundary.as_ref(), handle);
                drop(guard);
                result
            })
            .await
        };

        match tokio::time::timeout(self.call_timeout, in_flight).await {
            Ok(Ok(result)) => {
                tracing::trace!(
                    operation,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "Boundary call returned"
                );
                result
            }
            Ok(Err(join_error)) => Err(BoundaryError::CallFailed {
                operation,
                reason: join_error.to_string(),
            }),
            Err(_) => {
                let after_ms = self.call_timeout.as_millis() as u64;
                tracing::warn!(operation, after_ms, "Boundary call timed out");
                Err(BoundaryError::Timeout { operation, after_ms })
            }
        }
    }
}
