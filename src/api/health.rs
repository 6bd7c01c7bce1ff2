// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Encrypted data directory write/read check.
    pub storage: String,
    /// Trusted boundary instance ("ok" or "down").
    pub boundary: String,
    /// Master secret lifecycle state.
    pub secret: String,
}

/// Health check endpoint handler.
///
/// Returns 200 if storage and the boundary are available, 503 otherwise.
/// A missing master secret is reported but does not fail the check: the
/// operator generates it through `/generate_secret`.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage_ok = state.storage.health_check().is_ok();
    let boundary_ok = state.gateway.is_initialized().await;
    let all_ok = storage_ok && boundary_ok;

    let response = HealthResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            storage: if storage_ok { "ok" } else { "unavailable" }.to_string(),
            boundary: if boundary_ok { "ok" } else { "down" }.to_string(),
            secret: state.sealing.state_name().await.to_string(),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn healthy_stack_reports_ok() {
        let stack = testing::stack().await;
        let (status, Json(body)) = health(State(stack.app_state())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.secret, "uninitialized");
    }

    #[tokio::test]
    async fn shut_down_boundary_is_unhealthy() {
        let stack = testing::stack_with_secret().await;
        stack.gateway.shutdown().await.unwrap();

        let (status, Json(body)) = health(State(stack.app_state())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.checks.boundary, "down");
        assert_eq!(body.checks.secret, "sealed");
    }
}
