// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All binary values (keys,
//! nonces, signatures, messages, owner material) travel as lowercase hex
//! strings; handlers decode them and reject malformed input with 400.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Deposit
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublicKeyRequest {
    /// Client-chosen statechain identifier.
    pub statechain_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublicKeyResponse {
    /// Compressed SEC1 server public key (hex).
    pub server_pubkey: String,
}

// =============================================================================
// Signing
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublicNonceRequest {
    pub statechain_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublicNonceResponse {
    /// Compressed server nonce point (hex). Valid until the next nonce
    /// request for the same statechain.
    pub server_pubnonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PartialSignatureRequest {
    pub statechain_id: String,
    /// The nonce returned by the latest `/get_public_nonce` call (hex).
    pub server_pubnonce: String,
    /// Message to sign (hex), typically a transaction sighash.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PartialSignatureResponse {
    /// Server partial signature scalar (hex).
    pub partial_sig: String,
    /// Partial signatures issued under the current key, including this one.
    pub sig_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SignatureCountResponse {
    pub sig_count: u64,
}

// =============================================================================
// Transfer
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct KeyUpdateRequest {
    pub statechain_id: String,
    /// Material identifying the new owner (hex); bound into the rotated key.
    pub new_owner_material: String,
}

// =============================================================================
// Secret
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct GenerateSecretResponse {
    /// `generated` or `already_exists`.
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AddMnemonicRequest {
    /// 24-word BIP39 mnemonic encoding one 32-byte recovery share.
    pub mnemonic: String,
    /// Share index (x coordinate), 1-255.
    pub index: u8,
    /// Shares required to rebuild the secret.
    pub threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AddMnemonicResponse {
    /// `share_accepted`, `recovered` or `already_exists`.
    pub status: String,
    /// Distinct shares held so far, while recovery is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_received: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,
}
