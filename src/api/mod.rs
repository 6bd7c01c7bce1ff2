// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        AddMnemonicRequest, AddMnemonicResponse, GenerateSecretResponse, KeyUpdateRequest,
        PartialSignatureRequest, PartialSignatureResponse, PublicKeyRequest, PublicKeyResponse,
        PublicNonceRequest, PublicNonceResponse, SignatureCountResponse,
    },
    state::AppState,
};

pub mod deposit;
pub mod error;
pub mod health;
pub mod secret;
pub mod sign;
pub mod transfer;
pub mod withdraw;

use error::{ApiError, ErrorBody};

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/generate_secret", post(secret::generate_secret))
        .route("/add_mnemonic", post(secret::add_mnemonic))
        .route("/get_public_key", post(deposit::get_public_key))
        .route("/get_public_nonce", post(sign::get_public_nonce))
        .route("/get_partial_signature", post(sign::get_partial_signature))
        .route(
            "/signature_count/{statechain_id}",
            get(sign::signature_count),
        )
        .route("/keyupdate", post(transfer::keyupdate))
        .route(
            "/delete_statechain/{statechain_id}",
            delete(withdraw::delete_statechain),
        )
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Decode a hex request field, naming the field on failure.
pub(crate) fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, ApiError> {
    hex::decode(value.trim()).map_err(|e| ApiError::bad_request(format!("{field}: {e}")))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        secret::generate_secret,
        secret::add_mnemonic,
        deposit::get_public_key,
        sign::get_public_nonce,
        sign::get_partial_signature,
        sign::signature_count,
        transfer::keyupdate,
        withdraw::delete_statechain
    ),
    components(
        schemas(
            PublicKeyRequest,
            PublicKeyResponse,
            PublicNonceRequest,
            PublicNonceResponse,
            PartialSignatureRequest,
            PartialSignatureResponse,
            SignatureCountResponse,
            KeyUpdateRequest,
            GenerateSecretResponse,
            AddMnemonicRequest,
            AddMnemonicResponse,
            ErrorBody,
            health::HealthResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Health", description = "Liveness and component status"),
        (name = "Secret", description = "Master secret generation and recovery"),
        (name = "Deposit", description = "Server key issuance"),
        (name = "Signing", description = "Two-round partial signing"),
        (name = "Transfer", description = "Key rotation on ownership transfer"),
        (name = "Withdraw", description = "Statechain teardown")
    )
)]
struct ApiDoc;
