// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Signing Sessions
//!
//! Two-round co-signing per statechain: the client first obtains a public
//! nonce, then exchanges it for the server's partial signature over a
//! message. [`SigningSessionCoordinator`] sequences key issuance, nonce
//! issuance, partial signing, key rotation on transfer, and deletion.
//!
//! Concurrency is layered:
//!
//! - one async lock per statechain id ([`locks::StatechainLocks`])
//! - beneath it, the gateway's single process-wide boundary lock

pub mod coordinator;
pub mod locks;
pub mod session;
pub mod sweeper;

pub use coordinator::{IssuedSignature, SigningPolicy, SigningSessionCoordinator};
pub use session::{NonceSession, SessionState};
pub use sweeper::{SessionSweeper, SweeperHandle};
