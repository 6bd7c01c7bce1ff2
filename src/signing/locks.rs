// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-statechain lock arena.
//!
//! One async mutex per statechain id, created on first use and removed
//! when the last guard is dropped with no other task waiting on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Default)]
pub struct StatechainLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl StatechainLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `statechain_id`.
    pub async fn acquire(&self, statechain_id: &str) -> StatechainGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(statechain_id.to_string()).or_default())
        };

        let guard = lock.lock_owned().await;
        StatechainGuard {
            statechain_id: statechain_id.to_string(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of ids with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one statechain id; released on drop.
pub struct StatechainGuard {
    statechain_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for StatechainGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters clone the entry under the map lock, so a count of one
        // means the map holds the only reference.
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        if locks
            .get(&self.statechain_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.statechain_id);
        }
    }
}
