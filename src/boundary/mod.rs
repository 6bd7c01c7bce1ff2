// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Trusted Boundary
//!
//! Contract for the isolated compute boundary that holds the master secret
//! and performs every elliptic-curve operation. This process never sees
//! secret scalars: keys, nonces and the master secret cross the boundary
//! only as public values or as opaque sealed blobs.
//!
//! ## Call Discipline
//!
//! The boundary instance is a single, non-reentrant resource. Nothing in
//! the crate calls a [`TrustedBoundary`] directly except
//! [`TrustedBoundaryGateway`], which holds the instance handle behind one
//! process-wide lock.
//!
//! ## Implementations
//!
//! - [`SimulatedBoundary`] - software stand-in with the same sealing and
//!   signing contract, used by the binary and by tests.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod gateway;
pub mod simulated;

pub use gateway::TrustedBoundaryGateway;
pub use simulated::SimulatedBoundary;

// =============================================================================
// Handle
// =============================================================================

/// Identifier of a live boundary instance.
///
/// Issued by [`TrustedBoundary::create_instance`] and owned by the gateway
/// for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryHandle(pub u64);

impl fmt::Display for BoundaryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boundary#{}", self.0)
    }
}

// =============================================================================
// Public Values
// =============================================================================

/// Compressed SEC1 public key of a per-statechain server key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "hex::serde")] Vec<u8>);

/// Public half of a server signing nonce.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicNonce(#[serde(with = "hex::serde")] Vec<u8>);

/// Server contribution to an aggregate signature.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartialSignature(#[serde(with = "hex::serde")] Vec<u8>);

macro_rules! hex_value {
    ($name:ident) => {
        impl $name {
            pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            pub fn from_hex(value: &str) -> Result<Self, hex::FromHexError> {
                hex::decode(value).map(Self)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

hex_value!(PublicKey);
hex_value!(PublicNonce);
hex_value!(PartialSignature);

// =============================================================================
// Sealed Values
// =============================================================================

/// Master secret sealed to the boundary instance that generated it.
///
/// Opaque ciphertext: only the boundary can open it.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedBlob(Vec<u8>);

/// Secret nonce sealed by the boundary, handed back on the signing round.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedNonce(Vec<u8>);

/// One recovery share of the master secret, sealed by the boundary.
///
/// The share index travels in the clear; the share value does not.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedShare {
    index: u8,
    blob: Vec<u8>,
}

impl SealedShare {
    pub fn new(index: u8, blob: Vec<u8>) -> Self {
        Self { index, blob }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }
}

impl fmt::Debug for SealedShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedShare(#{}, <{} bytes>)", self.index, self.blob.len())
    }
}

impl SealedBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl SealedNonce {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SealedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedBlob(<{} bytes>)", self.0.len())
    }
}

impl fmt::Debug for SealedNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedNonce(<{} bytes>)", self.0.len())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failure reported by the boundary or by the gateway around it.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    /// The instance could not be created.
    #[error("boundary initialization failed: {0}")]
    InitFailed(String),

    /// No live instance (never initialized or already shut down).
    #[error("boundary is not initialized")]
    NotInitialized,

    /// Handle does not name the live instance.
    #[error("invalid boundary handle: {0}")]
    InvalidHandle(BoundaryHandle),

    /// Sealed input could not be opened by this instance.
    #[error("unseal failed: {0}")]
    Unseal(String),

    /// Arguments rejected by the boundary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation failed inside the boundary.
    #[error("{operation} failed: {reason}")]
    CallFailed {
        operation: &'static str,
        reason: String,
    },

    /// The caller stopped waiting; the call itself runs to completion.
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

pub type BoundaryResult<T> = Result<T, BoundaryError>;

// =============================================================================
// Contract
// =============================================================================

/// Operations exposed by the trusted compute boundary.
///
/// All methods are blocking. Implementations are not required to be safe
/// for concurrent invocation; the gateway guarantees at most one call is in
/// flight system-wide.
pub trait TrustedBoundary: Send + Sync + 'static {
    /// Create the instance. Called once at startup.
    fn create_instance(&self) -> BoundaryResult<BoundaryHandle>;

    /// Tear the instance down. Called once at shutdown.
    fn destroy_instance(&self, handle: BoundaryHandle) -> BoundaryResult<()>;

    /// Generate a fresh master secret and return it sealed.
    fn generate_master_secret(&self, handle: BoundaryHandle) -> BoundaryResult<SealedBlob>;

    /// Derive the server public key for `statechain_id`.
    ///
    /// `context` is the per-issuance salt followed by the owner material of
    /// the latest key rotation.
    fn derive_key(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
    ) -> BoundaryResult<PublicKey>;

    /// Generate a signing nonce bound to `statechain_id`.
    fn generate_nonce(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
    ) -> BoundaryResult<(PublicNonce, SealedNonce)>;

    /// Seal one Shamir share (a 32-byte scalar at x = `index`) of a master
    /// secret being recovered.
    fn seal_share(
        &self,
        handle: BoundaryHandle,
        index: u8,
        share: &[u8],
    ) -> BoundaryResult<SealedShare>;

    /// Interpolate the master secret from threshold-many sealed shares and
    /// return it sealed like a generated one.
    fn recover_master_secret(
        &self,
        handle: BoundaryHandle,
        shares: &[SealedShare],
    ) -> BoundaryResult<SealedBlob>;

    /// Compute the server partial signature over `message`.
    fn partial_sign(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
        message: &[u8],
        nonce: &SealedNonce,
    ) -> BoundaryResult<PartialSignature>;
}
