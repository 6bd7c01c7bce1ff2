// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use super::decode_hex;
use super::error::{ApiError, ErrorBody};
use crate::{
    boundary::PublicNonce,
    models::{
        PartialSignatureRequest, PartialSignatureResponse, PublicNonceRequest,
        PublicNonceResponse, SignatureCountResponse,
    },
    state::AppState,
};

/// First signing round: issue a fresh server nonce.
///
/// Any nonce previously issued for the statechain stops being valid.
#[utoipa::path(
    post,
    path = "/get_public_nonce",
    request_body = PublicNonceRequest,
    tag = "Signing",
    responses(
        (status = 200, body = PublicNonceResponse),
        (status = 404, description = "Unknown statechain", body = ErrorBody)
    )
)]
pub async fn get_public_nonce(
    State(state): State<AppState>,
    Json(request): Json<PublicNonceRequest>,
) -> Result<Json<PublicNonceResponse>, ApiError> {
    let nonce = state.coordinator.issue_nonce(&request.statechain_id).await?;
    Ok(Json(PublicNonceResponse {
        server_pubnonce: nonce.to_hex(),
    }))
}

/// Second signing round: exchange the outstanding nonce for a partial
/// signature over `message`.
#[utoipa::path(
    post,
    path = "/get_partial_signature",
    request_body = PartialSignatureRequest,
    tag = "Signing",
    responses(
        (status = 200, body = PartialSignatureResponse),
        (status = 400, body = ErrorBody),
        (status = 404, description = "Unknown statechain", body = ErrorBody),
        (status = 409, description = "Nonce not outstanding or stale", body = ErrorBody),
        (status = 429, description = "Signature limit reached", body = ErrorBody),
        (status = 504, description = "Trusted boundary timed out", body = ErrorBody)
    )
)]
pub async fn get_partial_signature(
    State(state): State<AppState>,
    Json(request): Json<PartialSignatureRequest>,
) -> Result<Json<PartialSignatureResponse>, ApiError> {
    let nonce = PublicNonce::from_bytes(decode_hex("server_pubnonce", &request.server_pubnonce)?);
    let message = decode_hex("message", &request.message)?;

    let issued = state
        .coordinator
        .issue_partial_signature(&request.statechain_id, &nonce, &message)
        .await?;

    Ok(Json(PartialSignatureResponse {
        partial_sig: issued.partial_signature.to_hex(),
        sig_count: issued.sig_count,
    }))
}

/// Partial signatures issued under the statechain's current key.
#[utoipa::path(
    get,
    path = "/signature_count/{statechain_id}",
    params(
        ("statechain_id" = String, Path, description = "Statechain identifier")
    ),
    tag = "Signing",
    responses((status = 200, body = SignatureCountResponse))
)]
pub async fn signature_count(
    Path(statechain_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SignatureCountResponse>, ApiError> {
    let sig_count = state.coordinator.count_signatures(&statechain_id).await?;
    Ok(Json(SignatureCountResponse { sig_count }))
}
