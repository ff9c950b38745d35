pub mod auth;
pub mod rest;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::health::HealthChecker;

/// 200 while healthy or degraded, 503 once a critical dependency is down.
pub async fn health(State(checker): State<HealthChecker>) -> impl IntoResponse {
    let report = checker.check().await;
    let status_code = if report.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(report))
}
