// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for encrypted storage layout.

use std::path::{Path, PathBuf};

/// Base directory for all persistent storage.
/// This MUST be mounted as `type = "encrypted"` in the Gramine manifest.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Sealed Secret ==========

    /// Directory holding the sealed master secret.
    pub fn sealed_dir(&self) -> PathBuf {
        self.root.join("sealed")
    }

    /// Envelope file of the sealed master secret.
    pub fn sealed_secret(&self) -> PathBuf {
        self.sealed_dir().join("master_secret.json")
    }

    // ========== Statechain Database ==========

    /// Directory holding embedded databases.
    pub fn db_dir(&self) -> PathBuf {
        self.root.join("db")
    }

    /// redb file with derived keys and signature counters.
    pub fn statechain_db(&self) -> PathBuf {
        self.db_dir().join("statechains.redb")
    }

    // ========== Audit Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Path to audit log for a specific date.
    pub fn audit_log(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to audit events file for a date.
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_log(date).join("events.jsonl")
    }
}
