// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use super::decode_hex;
use super::error::{ApiError, ErrorBody};
use crate::{
    models::{KeyUpdateRequest, PublicKeyResponse},
    state::AppState,
};

/// Rotate the server key to the new owner.
///
/// Resets the signature count and invalidates any outstanding nonce. On
/// failure the previous key stays authoritative.
#[utoipa::path(
    post,
    path = "/keyupdate",
    request_body = KeyUpdateRequest,
    tag = "Transfer",
    responses(
        (status = 200, body = PublicKeyResponse),
        (status = 400, body = ErrorBody),
        (status = 404, description = "Unknown statechain", body = ErrorBody)
    )
)]
pub async fn keyupdate(
    State(state): State<AppState>,
    Json(request): Json<KeyUpdateRequest>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let material = decode_hex("new_owner_material", &request.new_owner_material)?;
    let public_key = state
        .coordinator
        .transfer(&request.statechain_id, &material)
        .await?;

    Ok(Json(PublicKeyResponse {
        server_pubkey: public_key.to_hex(),
    }))
}
