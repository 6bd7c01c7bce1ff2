// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
}

/// Error body returned by every endpoint.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Stable machine-readable code.
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::UnknownStatechain(_) => StatusCode::NOT_FOUND,
            ServiceError::SessionNotFound(_) | ServiceError::StaleNonce(_) => StatusCode::CONFLICT,
            ServiceError::SignatureLimitReached { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::SecretMissing => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::BoundaryTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::BoundaryCallFailure(_) => StatusCode::BAD_GATEWAY,
            ServiceError::BoundaryInitFailure(_)
            | ServiceError::PersistenceFailure(_)
            | ServiceError::SecretStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, code = err.code(), "Request failed");
        }

        // Internal details stay in the logs.
        let message = match &err {
            ServiceError::PersistenceFailure(_) => "persistence failure".to_string(),
            ServiceError::SecretStore(_) => "secret store failure".to_string(),
            _ => err.to_string(),
        };

        Self::new(status, err.code(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
        });
        (self.status, body).into_response()
    }
}
