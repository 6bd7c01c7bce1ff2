// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage
//!
//! Everything the host keeps on disk lives under one data directory, which
//! in production is mounted as a Gramine encrypted filesystem.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   sealed/
//!     master_secret.json   # Sealed master secret envelope
//!   db/
//!     statechains.redb     # Derived keys + signature counters
//!   audit/
//!     {date}/events.jsonl  # Daily audit logs
//! ```
//!
//! ## Important Notes
//!
//! - The master secret is sealed by the trusted boundary before it reaches
//!   this module; storage only ever sees ciphertext
//! - The only hashing here is the SHA-256 integrity checksum on the sealed
//!   secret envelope; sealing and key material stay behind the boundary

pub mod audit;
pub mod encrypted_fs;
pub mod paths;
pub mod persistence;
pub mod secret_store;
pub mod statechain_db;

pub use audit::{AuditEvent, AuditEventType, AuditLog};
pub use encrypted_fs::{EncryptedStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use persistence::{
    fresh_derivation_context, DerivedKeyRecord, PersistenceError, PersistenceGateway,
    PersistenceResult, KEY_SALT_LEN,
};
pub use secret_store::{SecretStore, SecretStoreError};
pub use statechain_db::StatechainDatabase;
