// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::gate::Gatekeeper;

/// Shared application state for health endpoints.
#[derive(Clone)]
pub struct AppState {
    /// Reports whether the enterprise login configuration is cached
    pub gatekeeper: Arc<Gatekeeper>,
    /// Flag indicating if we're shutting down
    pub shutting_down: Arc<AtomicBool>,
}

/// Health check response body.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    login_status: Option<&'static str>,
}

/// Kubernetes liveness probe endpoint.
///
/// # Endpoint
/// `GET /health/live`
pub async fn health_live() -> Response {
    let response = HealthResponse {
        status: "ok",
        login_status: None,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Kubernetes readiness probe endpoint.
///
/// Returns 503 while shutting down. A login configuration that is not cached
/// yet is reported as degraded until a request loads it.
///
/// # Endpoint
/// `GET /health/ready`
pub async fn health_ready(State(state): State<AppState>) -> Response {
    if state.shutting_down.load(Ordering::SeqCst) {
        let response = HealthResponse {
            status: "shutting_down",
            login_status: None,
        };
        return (StatusCode::SERVICE_UNAVAILABLE, Json(response)).into_response();
    }

    let login_ready = state.gatekeeper.login_loaded().await;
    let response = HealthResponse {
        status: if login_ready { "ok" } else { "degraded" },
        login_status: Some(if login_ready { "loaded" } else { "pending" }),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Kubernetes startup probe endpoint.
///
/// # Endpoint
/// `GET /health/startup`
pub async fn health_startup() -> Response {
    let response = HealthResponse {
        status: "ok",
        login_status: None,
    };
    (StatusCode::OK, Json(response)).into_response()
}
