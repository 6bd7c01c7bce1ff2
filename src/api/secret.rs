// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use super::error::{ApiError, ErrorBody};
use crate::{
    error::RecoveryStatus,
    models::{AddMnemonicRequest, AddMnemonicResponse, GenerateSecretResponse},
    state::AppState,
};

/// Generate the master secret. A no-op reporting `already_exists` when one
/// is present.
#[utoipa::path(
    post,
    path = "/generate_secret",
    tag = "Secret",
    responses(
        (status = 200, body = GenerateSecretResponse),
        (status = 500, description = "Secret could not be stored", body = ErrorBody)
    )
)]
pub async fn generate_secret(
    State(state): State<AppState>,
) -> Result<Json<GenerateSecretResponse>, ApiError> {
    let status = state.sealing.add_secret().await?;
    Ok(Json(GenerateSecretResponse {
        status: status.as_str().to_string(),
    }))
}

/// Submit one recovery share of a lost master secret.
///
/// The secret is rebuilt and sealed once `threshold` distinct shares have
/// been submitted. A no-op reporting `already_exists` when a secret is
/// present.
#[utoipa::path(
    post,
    path = "/add_mnemonic",
    request_body = AddMnemonicRequest,
    tag = "Secret",
    responses(
        (status = 200, body = AddMnemonicResponse),
        (status = 400, description = "Malformed mnemonic, index or threshold", body = ErrorBody),
        (status = 500, description = "Secret could not be stored", body = ErrorBody)
    )
)]
pub async fn add_mnemonic(
    State(state): State<AppState>,
    Json(request): Json<AddMnemonicRequest>,
) -> Result<Json<AddMnemonicResponse>, ApiError> {
    let status = state
        .sealing
        .add_mnemonic(&request.mnemonic, request.index, request.threshold)
        .await?;

    let (shares_received, threshold) = match status {
        RecoveryStatus::ShareAccepted {
            received,
            threshold,
        } => (Some(received), Some(threshold)),
        _ => (None, None),
    };
    Ok(Json(AddMnemonicResponse {
        status: status.as_str().to_string(),
        shares_received,
        threshold,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn generate_secret_reports_already_exists_on_repeat() {
        let stack = testing::stack().await;

        let Json(first) = generate_secret(State(stack.app_state())).await.unwrap();
        assert_eq!(first.status, "generated");

        let Json(second) = generate_secret(State(stack.app_state())).await.unwrap();
        assert_eq!(second.status, "already_exists");
    }

    #[tokio::test]
    async fn add_mnemonic_reports_progress_and_rejects_garbage() {
        let stack = testing::stack().await;
        let share = bip39::Mnemonic::from_entropy(&[0x11u8; 32]).unwrap().to_string();

        let Json(progress) = add_mnemonic(
            State(stack.app_state()),
            Json(AddMnemonicRequest {
                mnemonic: share,
                index: 1,
                threshold: 3,
            }),
        )
        .await
        .unwrap();
        assert_eq!(progress.status, "share_accepted");
        assert_eq!(progress.shares_received, Some(1));
        assert_eq!(progress.threshold, Some(3));

        let err = add_mnemonic(
            State(stack.app_state()),
            Json(AddMnemonicRequest {
                mnemonic: "abandon abandon".into(),
                index: 2,
                threshold: 3,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn add_mnemonic_after_generation_is_already_exists() {
        let stack = testing::stack_with_secret().await;
        let share = bip39::Mnemonic::from_entropy(&[0x11u8; 32]).unwrap().to_string();

        let Json(body) = add_mnemonic(
            State(stack.app_state()),
            Json(AddMnemonicRequest {
                mnemonic: share,
                index: 1,
                threshold: 1,
            }),
        )
        .await
        .unwrap();
        assert_eq!(body.status, "already_exists");
        assert_eq!(body.shares_received, None);
    }
}
