// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded statechain database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `derived_keys`: statechain_id → serialized DerivedKeyRecord
//! - `signature_counters`: statechain_id → partial signatures issued

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::persistence::{DerivedKeyRecord, PersistenceGateway, PersistenceResult};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: statechain_id → serialized DerivedKeyRecord (JSON bytes).
const DERIVED_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("derived_keys");

/// Counter table: statechain_id → number of partial signatures issued.
const SIGNATURE_COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("signature_counters");

// =============================================================================
// StatechainDatabase
// =============================================================================

/// redb implementation of [`PersistenceGateway`].
pub struct StatechainDatabase {
    db: Database,
}

impl StatechainDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> PersistenceResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DERIVED_KEYS)?;
            let _ = write_txn.open_table(SIGNATURE_COUNTERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl PersistenceGateway for StatechainDatabase {
    fn upsert_key(&self, record: &DerivedKeyRecord) -> PersistenceResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut keys = write_txn.open_table(DERIVED_KEYS)?;
            keys.insert(record.statechain_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_key(&self, statechain_id: &str) -> PersistenceResult<Option<DerivedKeyRecord>> {
        let read_txn = self.db.begin_read()?;
        let keys = read_txn.open_table(DERIVED_KEYS)?;
        match keys.get(statechain_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn delete_key(&self, statechain_id: &str) -> PersistenceResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut keys = write_txn.open_table(DERIVED_KEYS)?;
            keys.remove(statechain_id)?;
            let mut counters = write_txn.open_table(SIGNATURE_COUNTERS)?;
            counters.remove(statechain_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn rotate_key(&self, record: &DerivedKeyRecord) -> PersistenceResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut keys = write_txn.open_table(DERIVED_KEYS)?;
            keys.insert(record.statechain_id.as_str(), json.as_slice())?;
            let mut counters = write_txn.open_table(SIGNATURE_COUNTERS)?;
            counters.remove(record.statechain_id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn increment_and_get_counter(&self, statechain_id: &str) -> PersistenceResult<u64> {
        let write_txn = self.db.begin_write()?;
        let next = {
            let mut counters = write_txn.open_table(SIGNATURE_COUNTERS)?;
            let current = counters.get(statechain_id)?.map(|v| v.value()).unwrap_or(0);
            let next = current.saturating_add(1);
            counters.insert(statechain_id, next)?;
            next
        };
        write_txn.commit()?;
        Ok(next)
    }

    fn get_counter(&self, statechain_id: &str) -> PersistenceResult<u64> {
        let read_txn = self.db.begin_read()?;
        let counters = read_txn.open_table(SIGNATURE_COUNTERS)?;
        Ok(counters.get(statechain_id)?.map(|v| v.value()).unwrap_or(0))
    }
}

// =============================================================================
// Tests
// =============================================================================
