// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Nonce Session Sweeper
//!
//! Background task that periodically drops spent nonce sessions and
//! releases the sealed nonces of expired ones, so abandoned signing
//! attempts do not accumulate in memory. Expired sessions leave a marker
//! behind and are still reported as stale on use.
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use super::SigningSessionCoordinator;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct SessionSweeper {
    coordinator: Arc<SigningSessionCoordinator>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(coordinator: Arc<SigningSessionCoordinator>) -> Self {
        Self {
            coordinator,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the sweeper on the runtime.
    ///
    /// Dropping the returned handle cancels `shutdown`, so the task stops on
    /// every exit path of its owner.
    pub fn spawn(self, shutdown: CancellationToken) -> SweeperHandle {
        let guard = shutdown.clone().drop_guard();
        SweeperHandle {
            guard,
            task: tokio::spawn(self.run(shutdown)),
        }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Nonce session sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Nonce session sweeper shutting down");
                    return;
                }
            }

            let purged = self.coordinator.purge_sessions();
            if purged > 0 {
                debug!(purged, "Purged nonce sessions");
            }
        }
    }
}

/// Owner of a spawned [`SessionSweeper`].
pub struct SweeperHandle {
    guard: DropGuard,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Cancel the sweeper and wait for it to exit.
    pub async fn stop(self) {
        let Self { guard, task } = self;
        drop(guard);
        if let Err(e) = task.await {
            warn!(error = %e, "Nonce session sweeper task failed");
        }
    }
}
