//! Health and metrics handlers

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::router::AppState;

/// Health payload
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub uptime_seconds: u64,
    pub env: String,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthDto)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "OK".to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        env: state.env.clone(),
    })
}

/// Prometheus metrics in text exposition format
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Prometheus metrics", body = String)
    )
)]
pub async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus.render()
}
