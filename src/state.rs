// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::boundary::TrustedBoundaryGateway;
use crate::sealing::SealingKeyManager;
use crate::signing::SigningSessionCoordinator;
use crate::storage::EncryptedStorage;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SigningSessionCoordinator>,
    pub sealing: Arc<SealingKeyManager>,
    pub gateway: Arc<TrustedBoundaryGateway>,
    pub storage: EncryptedStorage,
}

impl AppState {
    pub fn new(
        coordinator: Arc<SigningSessionCoordinator>,
        sealing: Arc<SealingKeyManager>,
        gateway: Arc<TrustedBoundaryGateway>,
        storage: EncryptedStorage,
    ) -> Self {
        Self {
            coordinator,
            sealing,
            gateway,
            storage,
        }
    }
}
