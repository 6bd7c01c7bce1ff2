// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service-level error taxonomy.
//!
//! Every operation exposed to the HTTP layer returns a [`ServiceError`] on
//! failure. Each variant has a stable machine-readable [`code`](ServiceError::code);
//! the API layer maps variants to status codes, this module never does.

use crate::boundary::BoundaryError;
use crate::storage::{PersistenceError, SecretStoreError};

/// Outcome of a master-secret generation request.
///
/// An existing secret is not an error: generation is a no-op that reports
/// [`SecretStatus::AlreadyExists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStatus {
    Generated,
    AlreadyExists,
}

impl SecretStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretStatus::Generated => "generated",
            SecretStatus::AlreadyExists => "already_exists",
        }
    }
}

/// Outcome of submitting one recovery share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStatus {
    /// Share sealed; more are needed before the secret can be rebuilt.
    ShareAccepted { received: usize, threshold: u8 },
    /// Threshold reached; the master secret was rebuilt and sealed.
    Recovered,
    /// A master secret is already present; the share was ignored.
    AlreadyExists,
}

impl RecoveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStatus::ShareAccepted { .. } => "share_accepted",
            RecoveryStatus::Recovered => "recovered",
            RecoveryStatus::AlreadyExists => "already_exists",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The boundary instance could not be created. Fatal at startup.
    #[error("trusted boundary initialization failed: {0}")]
    BoundaryInitFailure(String),

    /// No master secret has been generated yet.
    #[error("master secret has not been generated")]
    SecretMissing,

    #[error("unknown statechain: {0}")]
    UnknownStatechain(String),

    /// No outstanding nonce session matches the request.
    #[error("no outstanding nonce session for statechain {0}")]
    SessionNotFound(String),

    /// The outstanding session expired or was issued for a rotated key.
    #[error("nonce session for statechain {0} is stale")]
    StaleNonce(String),

    #[error("trusted boundary call timed out: {0}")]
    BoundaryTimeout(String),

    #[error("trusted boundary call failed: {0}")]
    BoundaryCallFailure(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),

    /// The sealed secret artifact could not be read or written.
    #[error("secret store error: {0}")]
    SecretStore(#[from] SecretStoreError),

    #[error("signature limit of {limit} reached for statechain {statechain_id}")]
    SignatureLimitReached { statechain_id: String, limit: u64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ServiceError {
    /// Stable identifier for clients and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BoundaryInitFailure(_) => "boundary_init_failure",
            ServiceError::SecretMissing => "secret_missing",
            ServiceError::UnknownStatechain(_) => "unknown_statechain",
            ServiceError::SessionNotFound(_) => "session_not_found",
            ServiceError::StaleNonce(_) => "stale_nonce",
            ServiceError::BoundaryTimeout(_) => "boundary_timeout",
            ServiceError::BoundaryCallFailure(_) => "boundary_call_failure",
            ServiceError::PersistenceFailure(_) => "persistence_failure",
            ServiceError::SecretStore(_) => "secret_store_error",
            ServiceError::SignatureLimitReached { .. } => "signature_limit_reached",
            ServiceError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Whether the process must stop rather than keep serving.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::BoundaryInitFailure(_)
                | ServiceError::SecretStore(SecretStoreError::Corrupted(_))
        )
    }
}

impl From<BoundaryError> for ServiceError {
    fn from(e: BoundaryError) -> Self {
        match e {
            BoundaryError::Timeout { .. } => ServiceError::BoundaryTimeout(e.to_string()),
            BoundaryError::InitFailed(reason) => ServiceError::BoundaryInitFailure(reason),
            other => ServiceError::BoundaryCallFailure(other.to_string()),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
