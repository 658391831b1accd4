use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use coinlens_market_data::{
    AvailabilityState, GlobalMetrics, IndicatorValue, NormalizedSeries, PreloadReport,
    SymbolSnapshot,
};
use serde::{Deserialize, Serialize};

/// Longest lookback accepted for series requests.
const MAX_DAYS: u32 = 3650;

#[derive(Deserialize)]
struct DaysQuery {
    days: Option<u32>,
}

impl DaysQuery {
    fn resolve(&self, default: u32) -> ApiResult<u32> {
        match self.days.unwrap_or(default) {
            0 => Err(ApiError::BadRequest("days must be at least 1".to_string())),
            days if days > MAX_DAYS => Err(ApiError::BadRequest(format!(
                "days must be at most {}",
                MAX_DAYS
            ))),
            days => Ok(days),
        }
    }
}

fn validate_symbol(symbol: &str) -> ApiResult<&str> {
    let trimmed = symbol.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 20
        && trimmed.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(ApiError::BadRequest(format!("Invalid symbol '{}'", symbol)));
    }
    Ok(trimmed)
}

async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<SymbolSnapshot>> {
    let symbol = validate_symbol(&symbol)?;
    let snapshot = state.market_data_service.get_quote(symbol).await?;
    Ok(Json(snapshot))
}

async fn get_historical(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<NormalizedSeries>> {
    let symbol = validate_symbol(&symbol)?;
    let days = query.resolve(90)?;
    let series = state.market_data_service.fetch(symbol, days).await?;
    Ok(Json(series))
}

async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<NormalizedSeries>> {
    let symbol = validate_symbol(&symbol)?;
    let days = query.resolve(7)?;
    let series = state.market_data_service.fetch_chart(symbol, days).await?;
    Ok(Json(series))
}

async fn get_global_metrics(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<GlobalMetrics>> {
    let metrics = state.market_data_service.get_global_metrics().await?;
    Ok(Json(metrics))
}

async fn get_risk_free_rate(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<IndicatorValue>> {
    let rate = state.market_data_service.get_risk_free_rate().await?;
    Ok(Json(rate))
}

async fn get_fear_greed_index(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<IndicatorValue>> {
    let index = state.market_data_service.get_fear_greed_index().await?;
    Ok(Json(index))
}

async fn get_provider_status(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, AvailabilityState>> {
    Json(state.market_data_service.get_status())
}

async fn reset_provider(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state
        .market_data_service
        .reset_provider(&provider_id.to_ascii_uppercase())
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

async fn force_refresh(State(state): State<Arc<AppState>>) -> ApiResult<Json<PreloadReport>> {
    let report = state.market_data_service.force_refresh().await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct InvalidateQuery {
    pattern: String,
}

#[derive(Serialize)]
struct InvalidateResponse {
    removed: usize,
}

async fn invalidate_cache(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InvalidateQuery>,
) -> ApiResult<Json<InvalidateResponse>> {
    if query.pattern.trim().is_empty() {
        return Err(ApiError::BadRequest("pattern must not be empty".to_string()));
    }
    let removed = state.market_data_service.invalidate(&query.pattern).await;
    Ok(Json(InvalidateResponse { removed }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quote/{symbol}", get(get_quote))
        .route("/historical/{symbol}", get(get_historical))
        .route("/chart/{symbol}", get(get_chart))
        .route("/global", get(get_global_metrics))
        .route("/indicators/risk-free-rate", get(get_risk_free_rate))
        .route("/indicators/fear-greed", get(get_fear_greed_index))
        .route("/providers/status", get(get_provider_status))
        .route("/providers/{id}/reset", post(reset_provider))
        .route("/refresh", post(force_refresh))
        .route("/cache", delete(invalidate_cache))
}
