// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable storage for the sealed master secret.
//!
//! The blob is opaque ciphertext bound to the trusted boundary; this module
//! never looks inside it. It is written as a small JSON envelope carrying a
//! SHA-256 checksum of the sealed bytes, so truncation or tampering is
//! detected on load instead of surfacing later as an unseal failure.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{EncryptedStorage, StorageError};
use crate::boundary::SealedBlob;

const ENVELOPE_VERSION: u8 = 1;

/// On-disk representation of the sealed master secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedEnvelope {
    version: u8,
    /// Base64 of the sealed bytes.
    sealed_secret: String,
    /// Hex SHA-256 of the sealed bytes.
    checksum: String,
    created_at: DateTime<Utc>,
}

/// Errors from reading or writing the sealed secret artifact.
#[derive(Debug, thiserror::Error)]
pub enum SecretStoreError {
    /// No artifact has been written yet.
    #[error("sealed secret not found")]
    NotFound,

    /// The artifact could not be read or written.
    #[error("sealed secret I/O error: {0}")]
    Io(#[source] StorageError),

    /// The artifact exists but fails its integrity check.
    #[error("sealed secret is corrupted: {0}")]
    Corrupted(String),
}

impl From<StorageError> for SecretStoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => SecretStoreError::NotFound,
            StorageError::IntegrityViolation(msg) => SecretStoreError::Corrupted(msg),
            StorageError::Json(e) => SecretStoreError::Corrupted(e.to_string()),
            other => SecretStoreError::Io(other),
        }
    }
}

/// Reads and writes the single sealed-secret artifact.
#[derive(Debug, Clone)]
pub struct SecretStore {
    storage: EncryptedStorage,
}

impl SecretStore {
    pub fn new(storage: EncryptedStorage) -> Self {
        Self { storage }
    }

    /// Whether an artifact is present (readable or not).
    pub fn exists(&self) -> bool {
        self.storage.exists(self.storage.paths().sealed_secret())
    }

    /// Persist the sealed blob with write-then-rename.
    pub fn store(&self, sealed: &SealedBlob) -> Result<(), SecretStoreError> {
        let envelope = SealedEnvelope {
            version: ENVELOPE_VERSION,
            sealed_secret: Base64::encode_string(sealed.as_bytes()),
            checksum: checksum(sealed.as_bytes()),
            created_at: Utc::now(),
        };

        self.storage
            .write_json(self.storage.paths().sealed_secret(), &envelope)
            .map_err(SecretStoreError::Io)
    }

    /// Load and verify the sealed blob.
    pub fn load(&self) -> Result<SealedBlob, SecretStoreError> {
        let envelope: SealedEnvelope = self
            .storage
            .read_json(self.storage.paths().sealed_secret())?;

        if envelope.version != ENVELOPE_VERSION {
            return Err(SecretStoreError::Corrupted(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }

        let sealed = Base64::decode_vec(&envelope.sealed_secret)
            .map_err(|e| SecretStoreError::Corrupted(format!("invalid base64: {e}")))?;

        if checksum(&sealed) != envelope.checksum {
            return Err(SecretStoreError::Corrupted(
                "checksum mismatch".to_string(),
            ));
        }

        Ok(SealedBlob::new(sealed))
    }
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SecretStore, EncryptedStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = EncryptedStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, SecretStore::new(storage.clone()), storage)
    }

    #[test]
    fn load_without_artifact_is_not_found() {
        let (_temp, store, _) = setup();
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(SecretStoreError::NotFound)));
    }

    #[test]
    fn store_then_load_returns_same_blob() {
        let (_temp, store, storage) = setup();
        let blob = SealedBlob::new(vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 1, 2, 3]);

        store.store(&blob).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), blob);

        let tmp = storage.paths().sealed_secret().with_extension("tmp");
        assert!(!storage.exists(tmp));
    }

    #[test]
    fn tampered_checksum_is_corrupted() {
        let (_temp, store, storage) = setup();
        store.store(&SealedBlob::new(vec![1, 2, 3, 4])).unwrap();

        let path = storage.paths().sealed_secret();
        let mut envelope: SealedEnvelope = storage.read_json(&path).unwrap();
        envelope.sealed_secret = Base64::encode_string(&[1, 2, 3, 5]);
        storage.write_json(&path, &envelope).unwrap();

        assert!(matches!(store.load(), Err(SecretStoreError::Corrupted(_))));
    }

    #[test]
    fn truncated_artifact_is_corrupted() {
        let (_temp, store, storage) = setup();
        store.store(&SealedBlob::new(vec![1, 2, 3, 4])).unwrap();

        let path = storage.paths().sealed_secret();
        let bytes = storage.read_raw(&path).unwrap();
        storage.write_raw(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(store.load(), Err(SecretStoreError::Corrupted(_))));
    }
}
