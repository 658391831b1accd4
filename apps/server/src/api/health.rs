use std::sync::Arc;

use crate::main_lib::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use coinlens_market_data::ServiceHealth;
use serde::Serialize;

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    started_at: DateTime<Utc>,
    #[serde(flatten)]
    service: ServiceHealth,
}

/// Cache connectivity and provider availability. 503 when no provider can
/// take calls.
async fn get_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let service = state.market_data_service.health_check().await;
    let (status, label) = if service.is_healthy() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let report = HealthReport {
        status: label,
        started_at: state.started_at,
        service,
    };
    (status, Json(report))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(get_health))
}
