//! Shared HTTP transport for provider adapters.
//!
//! Centralizes the translation of HTTP outcomes into the error kinds the
//! orchestrator understands, so individual adapters only deal with
//! endpoints and payload shapes.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::errors::MarketDataError;

/// Default HTTP request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Back-off applied when a 429 carries no usable Retry-After header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Longest `Retry-After` honoured from an upstream response.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 3600);

const RATE_LIMIT_MARKERS: &[&str] = &["too many requests", "rate limit", "ratelimit"];
const EXHAUSTED_MARKERS: &[&str] = &[
    "credits",
    "quota exceeded",
    "quota exhausted",
    "invalid api key",
    "api key is invalid",
    "subscription",
];

/// Thin JSON client shared by the concrete adapters.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    provider: &'static str,
}

impl HttpTransport {
    pub fn new(provider: &'static str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("coinlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, provider }
    }

    /// GET a JSON document, classifying failures.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<Value, MarketDataError> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        debug!("{} request: {} with {} params", self.provider, url, query.len());

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: self.provider.to_string(),
                }
            } else {
                MarketDataError::transient(self.provider, format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();
        let retry_after = retry_after_from(response.headers());
        let body = response.text().await.map_err(|e| {
            MarketDataError::transient(self.provider, format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            return Err(classify_failure(self.provider, status, retry_after, &body));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| MarketDataError::parse(self.provider, format!("Invalid JSON: {}", e)))?;

        // Several APIs report throttling inside a 200 response body.
        if let Some(error) = classify_body_error(self.provider, &value) {
            return Err(error);
        }

        Ok(value)
    }
}

fn retry_after_from(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Translate a non-success HTTP status into an orchestrator error kind.
pub fn classify_failure(
    provider: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> MarketDataError {
    let lowered = body.to_ascii_lowercase();

    // Binance answers repeated 429s with 418 (temporary IP ban).
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::IM_A_TEAPOT
        || RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m))
    {
        return MarketDataError::RateLimited {
            provider: provider.to_string(),
            retry_after: retry_after
                .unwrap_or(DEFAULT_RETRY_AFTER)
                .min(MAX_RETRY_AFTER),
        };
    }

    if matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN
    ) {
        let reason = if body.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {} - {}", status.as_u16(), truncate(body, 200))
        };
        return MarketDataError::AuthExhausted {
            provider: provider.to_string(),
            reason,
        };
    }

    MarketDataError::transient(
        provider,
        format!("HTTP {} - {}", status.as_u16(), truncate(body, 200)),
    )
}

/// Detect error envelopes returned with HTTP 200.
fn classify_body_error(provider: &str, value: &Value) -> Option<MarketDataError> {
    let message = value
        .get("Response")
        .filter(|r| r.as_str() == Some("Error"))
        .and_then(|_| value.get("Message"))
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)?;

    let lowered = message.to_ascii_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Some(MarketDataError::RateLimited {
            provider: provider.to_string(),
            retry_after: DEFAULT_RETRY_AFTER,
        });
    }
    if EXHAUSTED_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Some(MarketDataError::AuthExhausted {
            provider: provider.to_string(),
            reason: message.to_string(),
        });
    }
    Some(MarketDataError::transient(provider, message))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AvailabilityTracker;
    use serde_json::json;

    #[test]
    fn test_429_is_rate_limited_with_retry_after() {
        let err = classify_failure(
            "COINX",
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(300)),
            "",
        );
        assert_eq!(
            err,
            MarketDataError::RateLimited {
                provider: "COINX".to_string(),
                retry_after: Duration::from_secs(300),
            }
        );
    }

    #[test]
    fn test_429_without_header_uses_default() {
        let err = classify_failure("COINX", StatusCode::TOO_MANY_REQUESTS, None, "");
        assert!(matches!(
            err,
            MarketDataError::RateLimited { retry_after, .. } if retry_after == DEFAULT_RETRY_AFTER
        ));
    }

    #[test]
    fn test_418_ip_ban_is_rate_limited() {
        let err = classify_failure("BINANCE", StatusCode::IM_A_TEAPOT, Some(Duration::from_secs(120)), "");
        assert!(matches!(
            err,
            MarketDataError::RateLimited { retry_after, .. } if retry_after == Duration::from_secs(120)
        ));
    }

    #[tokio::test]
    async fn test_absurd_retry_after_is_clamped() {
        let err = classify_failure(
            "COINX",
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(u64::MAX)),
            "",
        );
        let retry_after = match err {
            MarketDataError::RateLimited { retry_after, .. } => retry_after,
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(retry_after, MAX_RETRY_AFTER);

        let tracker = AvailabilityTracker::new();
        tracker.mark_rate_limited("COINX", retry_after);
        assert!(!tracker.is_available("COINX"));
    }

    #[test]
    fn test_403_is_auth_exhausted() {
        let err = classify_failure("COINY", StatusCode::FORBIDDEN, None, "credits exhausted");
        assert!(matches!(err, MarketDataError::AuthExhausted { .. }));
    }

    #[test]
    fn test_rate_limit_text_wins_over_status() {
        let err = classify_failure(
            "COINY",
            StatusCode::SERVICE_UNAVAILABLE,
            None,
            "Too Many Requests, slow down",
        );
        assert!(matches!(err, MarketDataError::RateLimited { .. }));
    }

    #[test]
    fn test_server_error_is_transient() {
        let err = classify_failure("COINZ", StatusCode::BAD_GATEWAY, None, "upstream");
        assert!(matches!(err, MarketDataError::Transient { .. }));
    }

    #[test]
    fn test_body_error_envelopes() {
        let throttled = json!({"Response": "Error", "Message": "You are over your rate limit"});
        assert!(matches!(
            classify_body_error("CC", &throttled),
            Some(MarketDataError::RateLimited { .. })
        ));

        let exhausted = json!({"error": "Invalid API key"});
        assert!(matches!(
            classify_body_error("CC", &exhausted),
            Some(MarketDataError::AuthExhausted { .. })
        ));

        let ok = json!({"Response": "Success", "Data": []});
        assert!(classify_body_error("CC", &ok).is_none());
    }
}
