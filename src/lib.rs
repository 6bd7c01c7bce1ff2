// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Statechain Enclave Host - Custodial Statechain Co-Signing Service
//!
//! This crate is the untrusted side of a statechain co-signer. It owns the
//! sealed master secret, drives the two-round nonce/partial-signature
//! protocol per statechain, and forwards every elliptic-curve operation to
//! a trusted boundary (Intel SGX enclave in production).
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `boundary` - Trusted boundary contract, serializing gateway, simulated backend
//! - `sealing` - Master secret lifecycle
//! - `signing` - Per-statechain signing sessions
//! - `storage` - Encrypted storage (Gramine sealed FS) and redb persistence

pub mod api;
pub mod boundary;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod sealing;
pub mod signing;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
