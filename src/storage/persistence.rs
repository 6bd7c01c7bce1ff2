// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Narrow query contract for derived-key records and signature counters.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::boundary::PublicKey;

/// Length of the random salt that opens every derivation context.
pub const KEY_SALT_LEN: usize = 16;

/// Build a derivation context: a fresh random salt followed by the owner
/// material (empty for a deposit key).
///
/// Every issuance gets its own salt, so a re-deposit after delete or a
/// transfer back to earlier owner material never yields a previous key.
pub fn fresh_derivation_context(owner_material: &[u8]) -> Vec<u8> {
    let mut context = vec![0u8; KEY_SALT_LEN];
    OsRng.fill_bytes(&mut context);
    context.extend_from_slice(owner_material);
    context
}

/// The active server key of one statechain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedKeyRecord {
    pub statechain_id: String,
    pub public_key: PublicKey,
    /// Context the key was derived under: per-issuance salt, then the owner
    /// material of the latest rotation.
    #[serde(with = "hex::serde")]
    pub derivation_context: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DerivedKeyRecord {
    /// Record for a freshly issued deposit key.
    pub fn new(
        statechain_id: impl Into<String>,
        public_key: PublicKey,
        derivation_context: Vec<u8>,
    ) -> Self {
        let now = Utc::now();
        Self {
            statechain_id: statechain_id.into(),
            public_key,
            derivation_context,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replacement record after a key rotation.
    pub fn rotated(&self, public_key: PublicKey, derivation_context: Vec<u8>) -> Self {
        Self {
            statechain_id: self.statechain_id.clone(),
            public_key,
            derivation_context,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Store for derived-key records and per-statechain signature counters.
///
/// Every method is atomic on its own. `rotate_key` and `delete_key` touch
/// both the record and the counter and must commit them as one unit.
pub trait PersistenceGateway: Send + Sync {
    /// Insert or replace the record for `record.statechain_id`.
    fn upsert_key(&self, record: &DerivedKeyRecord) -> PersistenceResult<()>;

    fn get_key(&self, statechain_id: &str) -> PersistenceResult<Option<DerivedKeyRecord>>;

    /// Remove the record and its counter. Absent ids are a success.
    fn delete_key(&self, statechain_id: &str) -> PersistenceResult<()>;

    /// Replace the record and reset its counter to zero.
    fn rotate_key(&self, record: &DerivedKeyRecord) -> PersistenceResult<()>;

    fn increment_and_get_counter(&self, statechain_id: &str) -> PersistenceResult<u64>;

    /// Current counter; zero for unknown ids.
    fn get_counter(&self, statechain_id: &str) -> PersistenceResult<u64>;
}
