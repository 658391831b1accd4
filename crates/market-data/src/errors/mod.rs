//! Error types and failure classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`FailureClass`]: Classification that drives provider availability

mod retry;

pub use retry::FailureClass;

use std::time::Duration;

use thiserror::Error;

use crate::models::Capability;

/// Message shown to callers when no provider could serve a request.
pub const PUBLIC_UNAVAILABLE_MESSAGE: &str = "Market data temporarily unavailable";

/// Errors that can occur during market data operations.
///
/// Provider-level variants are absorbed by the orchestrator; only the
/// exhaustion variants ([`AllProvidersUnavailable`](Self::AllProvidersUnavailable)
/// and [`AllProvidersFailed`](Self::AllProvidersFailed)) reach callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// The provider throttled the request (HTTP 429).
    #[error("Rate limited: {provider} (retry after {retry_after:?})")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
        /// How long the provider asked us to back off
        retry_after: Duration,
    },

    /// The provider's credentials or credits are exhausted (HTTP 403).
    #[error("Auth exhausted: {provider} - {reason}")]
    AuthExhausted {
        /// The provider that rejected the credentials
        provider: String,
        /// Why the provider refused the request
        reason: String,
    },

    /// A transport or upstream error that may not repeat.
    #[error("Provider error: {provider} - {message}")]
    Transient {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The request to the provider exceeded its per-attempt deadline.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered but the payload could not be interpreted.
    #[error("Parse error: {provider} - {message}")]
    Parse {
        /// The provider whose payload was malformed
        provider: String,
        /// What went wrong
        message: String,
    },

    /// The provider answered with too few data points to be useful.
    /// This is a data quality issue, not an availability failure.
    #[error("Insufficient data from {provider}: {points} points (need {required})")]
    InsufficientData {
        provider: String,
        points: usize,
        required: usize,
    },

    /// The provider cannot serve this kind of request.
    #[error("{provider} does not support {capability}")]
    UnsupportedCapability {
        provider: String,
        capability: Capability,
    },

    /// No provider was available on any attempt.
    #[error("All providers unavailable after {attempts} attempts")]
    AllProvidersUnavailable {
        /// Number of fallback passes attempted
        attempts: u32,
        /// Providers skipped because they were rate limited or disabled
        unavailable: Vec<String>,
    },

    /// Every available provider was tried and failed.
    #[error("All providers failed after {attempts} attempts")]
    AllProvidersFailed {
        /// Number of fallback passes attempted
        attempts: u32,
        /// Providers skipped because they were rate limited or disabled
        unavailable: Vec<String>,
        /// Providers that were called and failed
        failed: Vec<String>,
    },
}

impl MarketDataError {
    /// Returns the failure classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use coinlens_market_data::errors::{FailureClass, MarketDataError};
    ///
    /// let error = MarketDataError::RateLimited {
    ///     provider: "COINGECKO".to_string(),
    ///     retry_after: Duration::from_secs(60),
    /// };
    /// assert_eq!(error.failure_class(), FailureClass::Throttled);
    /// ```
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::RateLimited { .. } => FailureClass::Throttled,
            Self::AuthExhausted { .. } => FailureClass::Exhausted,

            Self::Transient { .. }
            | Self::Timeout { .. }
            | Self::Parse { .. }
            | Self::InsufficientData { .. }
            | Self::UnsupportedCapability { .. } => FailureClass::NextProvider,

            Self::AllProvidersUnavailable { .. } | Self::AllProvidersFailed { .. } => {
                FailureClass::Terminal
            }
        }
    }

    /// Whether this error is meant to reach end users.
    ///
    /// Everything else is absorbed by the orchestrator's fallback loop.
    pub fn is_user_visible(&self) -> bool {
        self.failure_class() == FailureClass::Terminal
    }

    /// Provider-agnostic text safe to show to end users.
    pub fn public_message(&self) -> &'static str {
        PUBLIC_UNAVAILABLE_MESSAGE
    }

    /// Number of fallback passes made before giving up, if this is an
    /// exhaustion error.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::AllProvidersUnavailable { attempts, .. }
            | Self::AllProvidersFailed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    pub(crate) fn transient(provider: &str, message: impl Into<String>) -> Self {
        Self::Transient {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(provider: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_throttled() {
        let error = MarketDataError::RateLimited {
            provider: "COINGECKO".to_string(),
            retry_after: Duration::from_secs(300),
        };
        assert_eq!(error.failure_class(), FailureClass::Throttled);
    }

    #[test]
    fn test_auth_exhausted_disables() {
        let error = MarketDataError::AuthExhausted {
            provider: "CRYPTOCOMPARE".to_string(),
            reason: "HTTP 403".to_string(),
        };
        assert_eq!(error.failure_class(), FailureClass::Exhausted);
    }

    #[test]
    fn test_insufficient_data_is_not_an_availability_failure() {
        let error = MarketDataError::InsufficientData {
            provider: "BINANCE".to_string(),
            points: 3,
            required: 10,
        };
        assert_eq!(error.failure_class(), FailureClass::NextProvider);
    }

    #[test]
    fn test_transient_variants_try_next_provider() {
        let errors = [
            MarketDataError::transient("A", "HTTP 500"),
            MarketDataError::Timeout {
                provider: "B".to_string(),
            },
            MarketDataError::parse("C", "missing field"),
        ];
        for error in errors {
            assert_eq!(error.failure_class(), FailureClass::NextProvider);
        }
    }

    #[test]
    fn test_exhaustion_is_terminal() {
        let error = MarketDataError::AllProvidersFailed {
            attempts: 3,
            unavailable: vec!["A".to_string()],
            failed: vec!["B".to_string()],
        };
        assert_eq!(error.failure_class(), FailureClass::Terminal);
        assert_eq!(error.attempts(), Some(3));
    }

    #[test]
    fn test_public_message_hides_provider_details() {
        let error = MarketDataError::AllProvidersFailed {
            attempts: 2,
            unavailable: vec![],
            failed: vec!["COINGECKO".to_string()],
        };
        assert!(!error.public_message().contains("COINGECKO"));
        assert!(error.is_user_visible());
        assert!(!MarketDataError::transient("COINGECKO", "HTTP 500").is_user_visible());
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::transient("BINANCE", "HTTP 502");
        assert_eq!(format!("{}", error), "Provider error: BINANCE - HTTP 502");

        let error = MarketDataError::InsufficientData {
            provider: "COINGECKO".to_string(),
            points: 3,
            required: 10,
        };
        assert_eq!(
            format!("{}", error),
            "Insufficient data from COINGECKO: 3 points (need 10)"
        );
    }
}
