//! Provider pacing configuration.

use std::time::Duration;

/// Client-side pacing for a provider.
///
/// Spaces calls to a provider so we stay below its published limits
/// instead of discovering them through HTTP 429 responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Minimum delay between two calls to the same provider.
    pub min_interval: Duration,
}

impl RateLimit {
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1) as u64;
        Self {
            min_interval: Duration::from_millis(60_000 / requests),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            min_interval: Duration::ZERO,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_minute_interval() {
        assert_eq!(
            RateLimit::per_minute(30).min_interval,
            Duration::from_secs(2)
        );
        assert_eq!(
            RateLimit::per_minute(0).min_interval,
            Duration::from_secs(60)
        );
    }
}
