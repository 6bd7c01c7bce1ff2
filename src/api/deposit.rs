// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use super::error::{ApiError, ErrorBody};
use crate::{
    models::{PublicKeyRequest, PublicKeyResponse},
    state::AppState,
};

/// Issue (or return the existing) server key for a statechain deposit.
#[utoipa::path(
    post,
    path = "/get_public_key",
    request_body = PublicKeyRequest,
    tag = "Deposit",
    responses(
        (status = 200, body = PublicKeyResponse),
        (status = 400, body = ErrorBody),
        (status = 503, description = "Master secret not generated", body = ErrorBody)
    )
)]
pub async fn get_public_key(
    State(state): State<AppState>,
    Json(request): Json<PublicKeyRequest>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let public_key = state.coordinator.issue_key(&request.statechain_id).await?;
    Ok(Json(PublicKeyResponse {
        server_pubkey: public_key.to_hex(),
    }))
}
