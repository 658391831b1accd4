use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coinlens_market_data::{MarketDataError, PreloadError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    MarketData(#[from] MarketDataError),
    #[error("{0}")]
    Preload(#[from] PreloadError),
    #[error("Not Found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            // Provider names and upstream details stay in the logs.
            ApiError::MarketData(e) => {
                tracing::warn!("Market data request failed: {}", e);
                match e {
                    MarketDataError::UnsupportedCapability { .. } => {
                        (StatusCode::NOT_IMPLEMENTED, e.public_message().to_string())
                    }
                    _ => (StatusCode::SERVICE_UNAVAILABLE, e.public_message().to_string()),
                }
            }
            ApiError::Preload(e) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            ApiError::Anyhow(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: msg,
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
