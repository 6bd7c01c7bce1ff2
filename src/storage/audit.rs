// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail for key-lifecycle operations.
//!
//! Secret generation, key issuance, partial signatures, rotations and
//! deletions are appended to a daily JSONL file under the audit directory.
//! Events never carry secret material: only statechain ids, public values
//! and counters.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{EncryptedStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SecretGenerated,
    SecretRecovered,
    KeyIssued,
    PartialSignatureIssued,
    KeyRotated,
    StatechainDeleted,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Statechain affected, if any.
    pub statechain_id: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            statechain_id: None,
            details: None,
        }
    }

    pub fn with_statechain(mut self, statechain_id: impl Into<String>) -> Self {
        self.statechain_id = Some(statechain_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Append-only audit log.
///
/// Appends are serialized through an internal lock so that lines from
/// concurrent events never interleave.
pub struct AuditLog {
    storage: EncryptedStorage,
    append_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(storage: EncryptedStorage) -> Self {
        Self {
            storage,
            append_lock: Mutex::new(()),
        }
    }

    /// Record an event. Failures are logged and swallowed so that auditing
    /// never fails the operation being audited.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.append(&event) {
            warn!(
                event_type = ?event.event_type,
                statechain_id = event.statechain_id.as_deref().unwrap_or("-"),
                error = %e,
                "Failed to write audit event"
            );
        }
    }

    /// Append an event as one JSONL line to the file for its date.
    pub fn append(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let event_json = serde_json::to_string(event).map_err(|e| {
            StorageError::SerializationError(format!("Failed to serialize audit event: {e}"))
        })?;

        let mut line = event_json.into_bytes();
        line.push(b'\n');

        let _guard = self.append_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.storage.append_raw(&path, &line)
    }

    /// Read audit events for a specific date (`YYYY-MM-DD`).
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;

        let content_str = String::from_utf8(content).map_err(|e| {
            StorageError::SerializationError(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        content_str
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    StorageError::SerializationError(format!(
                        "Failed to deserialize audit event: {e}"
                    ))
                })
            })
            .collect()
    }
}
