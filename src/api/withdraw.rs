// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use super::error::ApiError;
use crate::state::AppState;

/// Remove the statechain's key, counter and any outstanding nonce.
///
/// Idempotent: unknown ids also return 204.
#[utoipa::path(
    delete,
    path = "/delete_statechain/{statechain_id}",
    params(
        ("statechain_id" = String, Path, description = "Statechain to delete")
    ),
    tag = "Withdraw",
    responses((status = 204))
)]
pub async fn delete_statechain(
    Path(statechain_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.coordinator.delete(&statechain_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
