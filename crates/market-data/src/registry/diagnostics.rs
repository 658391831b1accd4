//! Per-fetch diagnostics for provider selection.

use crate::models::ProviderId;

use super::availability::ProviderState;

/// Why a provider was skipped during a fallback pass.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// Provider is suppressed until its retry-after deadline.
    RateLimited,

    /// Provider is disabled until an operator reset.
    Disabled,
}

impl SkipReason {
    pub(crate) fn from_state(state: ProviderState) -> Option<Self> {
        match state {
            ProviderState::Available => None,
            ProviderState::RateLimited => Some(Self::RateLimited),
            ProviderState::Disabled => Some(Self::Disabled),
        }
    }
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    /// Fallback pass this attempt belongs to, starting at 1.
    pub pass: u32,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    /// The provider returned a valid payload that was rejected for quality.
    pub insufficient: bool,
    /// The provider answered with a rate limit.
    pub throttled: bool,
    pub success: bool,
}

/// Everything that happened while serving one fetch request.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
    /// Number of fallback passes started.
    pub passes: u32,
    pub served_from_cache: bool,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cached() -> Self {
        Self {
            served_from_cache: true,
            ..Self::default()
        }
    }

    fn push(&mut self, provider_id: ProviderId) -> &mut ProviderAttempt {
        self.attempts.push(ProviderAttempt {
            provider_id,
            pass: self.passes,
            skipped: None,
            error: None,
            insufficient: false,
            throttled: false,
            success: false,
        });
        let last = self.attempts.len() - 1;
        &mut self.attempts[last]
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.push(provider_id).skipped = Some(reason);
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: String) {
        self.push(provider_id).error = Some(error);
    }

    pub fn record_throttled(&mut self, provider_id: ProviderId, error: String) {
        let attempt = self.push(provider_id);
        attempt.throttled = true;
        attempt.error = Some(error);
    }

    pub fn record_insufficient(&mut self, provider_id: ProviderId, error: String) {
        let attempt = self.push(provider_id);
        attempt.insufficient = true;
        attempt.error = Some(error);
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.push(provider_id).success = true;
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.served_from_cache {
            return "CACHE HIT".to_string();
        }
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("#{} {}: SUCCESS", a.pass, a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("#{} {}: SKIPPED ({:?})", a.pass, a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("#{} {}: ERROR ({})", a.pass, a.provider_id, err)
                } else {
                    format!("#{} {}: UNKNOWN", a.pass, a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// Whether any provider reported throttling while serving this request.
    pub fn saw_rate_limit(&self) -> bool {
        self.attempts.iter().any(|a| a.throttled)
    }

    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (&a.provider_id, s)))
            .collect()
    }

    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (&a.provider_id, e.as_str())))
            .collect()
    }

    /// Providers that were actually called, in first-seen order.
    pub fn contacted(&self) -> Vec<String> {
        self.unique(|a| a.skipped.is_none())
    }

    /// Providers skipped as unavailable at least once, in first-seen order.
    pub fn unavailable_providers(&self) -> Vec<String> {
        self.unique(|a| a.skipped.is_some())
    }

    /// Providers that were called and failed, in first-seen order.
    pub fn failed_providers(&self) -> Vec<String> {
        self.unique(|a| a.error.is_some())
    }

    fn unique(&self, keep: impl Fn(&ProviderAttempt) -> bool) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for attempt in self.attempts.iter().filter(|a| keep(a)) {
            if !ids.iter().any(|id| id == attempt.provider_id.as_ref()) {
                ids.push(attempt.provider_id.to_string());
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn test_diagnostics_summary() {
        let mut diag = FetchDiagnostics::new();
        diag.passes = 1;
        diag.record_skip(Cow::Borrowed("COINGECKO"), SkipReason::Disabled);
        diag.record_error(Cow::Borrowed("CRYPTOCOMPARE"), "Timeout".to_string());
        diag.record_success(Cow::Borrowed("BINANCE"));

        let summary = diag.summary();
        assert!(summary.contains("#1 COINGECKO: SKIPPED"));
        assert!(summary.contains("CRYPTOCOMPARE: ERROR"));
        assert!(summary.contains("BINANCE: SUCCESS"));
    }

    #[test]
    fn test_has_success() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(Cow::Borrowed("A"), SkipReason::RateLimited);
        assert!(!diag.has_success());

        diag.record_success(Cow::Borrowed("B"));
        assert!(diag.has_success());
    }

    #[test]
    fn test_provider_lists_are_deduplicated() {
        let mut diag = FetchDiagnostics::new();
        diag.passes = 1;
        diag.record_skip(Cow::Borrowed("A"), SkipReason::Disabled);
        diag.record_error(Cow::Borrowed("B"), "boom".to_string());
        diag.passes = 2;
        diag.record_skip(Cow::Borrowed("A"), SkipReason::Disabled);
        diag.record_insufficient(Cow::Borrowed("B"), "3 points".to_string());

        assert_eq!(diag.unavailable_providers(), vec!["A".to_string()]);
        assert_eq!(diag.failed_providers(), vec!["B".to_string()]);
        assert_eq!(diag.contacted(), vec!["B".to_string()]);
        assert_eq!(diag.skip_reasons().len(), 2);
    }

    #[test]
    fn test_saw_rate_limit() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(Cow::Borrowed("A"), SkipReason::RateLimited);
        assert!(!diag.saw_rate_limit());

        diag.record_error(Cow::Borrowed("B"), "HTTP 500".to_string());
        assert!(!diag.saw_rate_limit());

        diag.record_throttled(Cow::Borrowed("C"), "retry after 60s".to_string());
        assert!(diag.saw_rate_limit());
    }
}
