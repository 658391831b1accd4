//! Priority-ordered provider fallback.
//!
//! One fetch runs up to `max_attempts` fallback passes. Each pass walks the
//! available providers in priority order and returns the first valid result:
//!
//! 1. Filter providers by capability and availability.
//! 2. If none are available, back off `unavailable_backoff * attempt` and
//!    start the next pass (or give up with `AllProvidersUnavailable`).
//! 3. Call each candidate once. Throttling and exhaustion update the
//!    [`AvailabilityTracker`]; transient errors and short series only skip
//!    the provider for this pass.
//! 4. If every candidate failed, wait `failure_delay` and start the next pass
//!    (or give up with `AllProvidersFailed`).
//!
//! Successful results are written to the cache before being returned.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

use super::availability::AvailabilityTracker;
use super::diagnostics::{FetchDiagnostics, SkipReason};
use super::rate_limiter::RateLimiter;
use crate::cache::{CacheStore, CacheTtls};
use crate::errors::{FailureClass, MarketDataError};
use crate::models::{FetchRequest, NormalizedResult, ProviderId};
use crate::provider::{MarketDataProvider, RateLimit};

/// Stand-in deadline for budgets too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 3600);

/// Fallback policy knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackConfig {
    /// Number of fallback passes per fetch.
    pub max_attempts: u32,
    /// Backoff when no provider is available, multiplied by the attempt number.
    pub unavailable_backoff: Duration,
    /// Delay after a pass in which every provider failed.
    pub failure_delay: Duration,
    /// Series shorter than this are rejected as insufficient data.
    pub min_series_points: usize,
    /// Deadline for a single provider call.
    pub provider_timeout: Duration,
    /// Upper bound on the whole fetch, sleeps included.
    pub fetch_budget: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            unavailable_backoff: Duration::from_secs(60),
            failure_delay: Duration::from_secs(5),
            min_series_points: 10,
            provider_timeout: Duration::from_secs(30),
            fetch_budget: Duration::from_secs(600),
        }
    }
}

enum PassOutcome {
    Success(NormalizedResult),
    NoCandidates,
    AllFailed,
    Terminal(MarketDataError),
}

/// Tries providers in priority order, consulting the availability tracker
/// and caching successes.
pub struct FallbackOrchestrator {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    tracker: Arc<AvailabilityTracker>,
    cache: Arc<CacheStore>,
    rate_limiter: RateLimiter,
    ttls: CacheTtls,
    config: FallbackConfig,
}

impl FallbackOrchestrator {
    /// Build an orchestrator over `providers`.
    ///
    /// Providers are sorted by priority (stable, so registration order breaks
    /// ties), registered with the tracker, and paced by their declared
    /// [`RateLimit`].
    pub fn new(
        mut providers: Vec<Arc<dyn MarketDataProvider>>,
        tracker: Arc<AvailabilityTracker>,
        cache: Arc<CacheStore>,
        config: FallbackConfig,
    ) -> Self {
        providers.sort_by_key(|p| p.priority());

        let rate_limiter = RateLimiter::new();
        for provider in &providers {
            tracker.register(provider.id());
            rate_limiter.configure(provider.id(), provider.rate_limit());
        }

        Self {
            providers,
            tracker,
            cache,
            rate_limiter,
            ttls: CacheTtls::default(),
            config,
        }
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Override the pacing interval of one provider.
    pub fn with_rate_limit(self, provider: &str, limit: RateLimit) -> Self {
        self.rate_limiter.configure(provider, limit);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    pub fn tracker(&self) -> &Arc<AvailabilityTracker> {
        &self.tracker
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Cached read-through fetch.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<NormalizedResult, MarketDataError> {
        self.fetch_with_diagnostics(request).await.0
    }

    /// Fetch from providers, ignoring any cached value. The result is still cached.
    pub async fn fetch_fresh(
        &self,
        request: &FetchRequest,
    ) -> Result<NormalizedResult, MarketDataError> {
        self.fetch_fresh_with_diagnostics(request).await.0
    }

    /// Cached read-through fetch, returning what happened along the way.
    pub async fn fetch_with_diagnostics(
        &self,
        request: &FetchRequest,
    ) -> (Result<NormalizedResult, MarketDataError>, FetchDiagnostics) {
        let key = request.cache_key();
        if let Some((cached, _)) = self.cache.get_fresh_as::<NormalizedResult>(&key).await {
            debug!("Cache hit for '{}'", key);
            return (Ok(cached), FetchDiagnostics::cached());
        }
        self.fetch_fresh_with_diagnostics(request).await
    }

    pub async fn fetch_fresh_with_diagnostics(
        &self,
        request: &FetchRequest,
    ) -> (Result<NormalizedResult, MarketDataError>, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();

        if !self.providers.iter().any(|p| p.supports(request.capability)) {
            warn!("No provider registered for {}", request.capability);
            let error = MarketDataError::UnsupportedCapability {
                provider: "all".to_string(),
                capability: request.capability,
            };
            return (Err(error), diagnostics);
        }

        let deadline = deadline_after(self.config.fetch_budget);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            diagnostics.passes = attempt;
            let outcome = self.run_pass(request, deadline, &mut diagnostics).await;

            let (delay, exhausted_error) = match outcome {
                PassOutcome::Success(result) => {
                    let key = request.cache_key();
                    let ttl = self.ttls.for_capability(request.capability);
                    self.cache.set_as(&key, &result, ttl).await;
                    info!(
                        "Fetched '{}' from {}. Diagnostics: {}",
                        key,
                        result.source_provider(),
                        diagnostics.summary()
                    );
                    return (Ok(result), diagnostics);
                }
                PassOutcome::Terminal(error) => return (Err(error), diagnostics),
                PassOutcome::NoCandidates => (
                    self.config.unavailable_backoff.saturating_mul(attempt),
                    MarketDataError::AllProvidersUnavailable {
                        attempts: attempt,
                        unavailable: diagnostics.unavailable_providers(),
                    },
                ),
                PassOutcome::AllFailed => (
                    self.config.failure_delay,
                    MarketDataError::AllProvidersFailed {
                        attempts: attempt,
                        unavailable: diagnostics.unavailable_providers(),
                        failed: diagnostics.failed_providers(),
                    },
                ),
            };

            if attempt >= max_attempts || !sleep_within(deadline, delay).await {
                warn!(
                    "Giving up on '{}' after {} attempts. Diagnostics: {}",
                    request.cache_key(),
                    attempt,
                    diagnostics.summary()
                );
                return (Err(exhausted_error), diagnostics);
            }

            debug!(
                "Pass {} for '{}' found no result, retrying after {:?}",
                attempt,
                request.cache_key(),
                delay
            );
            attempt += 1;
        }
    }

    /// Walk the candidates once.
    async fn run_pass(
        &self,
        request: &FetchRequest,
        deadline: Instant,
        diagnostics: &mut FetchDiagnostics,
    ) -> PassOutcome {
        let candidates = self.candidates(request, diagnostics);
        if candidates.is_empty() {
            return PassOutcome::NoCandidates;
        }

        for provider in candidates {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Fetch budget spent before calling '{}'", provider_id);
                break;
            }

            self.rate_limiter.acquire(&provider_id).await;

            let timeout = self.config.provider_timeout.min(remaining);
            let outcome = match tokio::time::timeout(timeout, provider.fetch(request)).await {
                Ok(result) => result.and_then(|r| self.validate(provider.id(), request, r)),
                Err(_) => Err(MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                }),
            };

            match outcome {
                Ok(result) => {
                    diagnostics.record_success(provider_id);
                    return PassOutcome::Success(result);
                }
                Err(e) => {
                    if let Some(terminal) = self.apply_failure(&provider_id, e, diagnostics) {
                        return PassOutcome::Terminal(terminal);
                    }
                }
            }
        }

        PassOutcome::AllFailed
    }

    /// Providers for this request in priority order, recording skips.
    fn candidates(
        &self,
        request: &FetchRequest,
        diagnostics: &mut FetchDiagnostics,
    ) -> Vec<&Arc<dyn MarketDataProvider>> {
        let mut eligible = Vec::new();
        for provider in self.providers.iter().filter(|p| p.supports(request.capability)) {
            let state = self.tracker.state(provider.id());
            match SkipReason::from_state(state) {
                Some(reason) => {
                    debug!("Provider '{}' is {}, skipping", provider.id(), state);
                    diagnostics.record_skip(Cow::Borrowed(provider.id()), reason);
                }
                None => eligible.push(provider),
            }
        }
        eligible
    }

    /// Reject series that are too short to be useful.
    fn validate(
        &self,
        provider: &str,
        request: &FetchRequest,
        result: NormalizedResult,
    ) -> Result<NormalizedResult, MarketDataError> {
        let points = result.data_points();
        if request.capability.is_series() && points < self.config.min_series_points {
            return Err(MarketDataError::InsufficientData {
                provider: provider.to_string(),
                points,
                required: self.config.min_series_points,
            });
        }
        Ok(result)
    }

    /// Record a provider failure and apply its tracker side effect.
    ///
    /// Returns the error back when it ends the fetch outright.
    fn apply_failure(
        &self,
        provider_id: &ProviderId,
        error: MarketDataError,
        diagnostics: &mut FetchDiagnostics,
    ) -> Option<MarketDataError> {
        match error.failure_class() {
            FailureClass::Throttled => {
                if let MarketDataError::RateLimited { retry_after, .. } = &error {
                    self.tracker.mark_rate_limited(provider_id, *retry_after);
                }
                diagnostics.record_throttled(provider_id.clone(), error.to_string());
            }
            FailureClass::Exhausted => {
                if let MarketDataError::AuthExhausted { reason, .. } = &error {
                    self.tracker.mark_disabled(provider_id, reason);
                }
                diagnostics.record_error(provider_id.clone(), error.to_string());
            }
            FailureClass::NextProvider => {
                if matches!(error, MarketDataError::InsufficientData { .. }) {
                    debug!("{}, trying next provider", error);
                    diagnostics.record_insufficient(provider_id.clone(), error.to_string());
                } else {
                    warn!("Provider '{}' failed: {}, trying next provider", provider_id, error);
                    diagnostics.record_error(provider_id.clone(), error.to_string());
                }
            }
            FailureClass::Terminal => {
                diagnostics.record_error(provider_id.clone(), error.to_string());
                return Some(error);
            }
        }
        None
    }
}

/// `budget` from now, saturating to a deadline decades away.
fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Sleep for `delay` unless that would overrun `deadline`.
async fn sleep_within(deadline: Instant, delay: Duration) -> bool {
    match Instant::now().checked_add(delay) {
        Some(wake) if wake <= deadline => {}
        _ => return false,
    }
    tokio::time::sleep(delay).await;
    true
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::models::{Capability, NormalizedSeries, SeriesPoint};
    use crate::provider::RawPayload;

    const SERIES_ONLY: &[Capability] = &[Capability::HistoricalSeries];

    /// Scripted provider: pops one response per call, repeating the last.
    struct MockProvider {
        id: &'static str,
        priority: u8,
        script: Mutex<Vec<Result<usize, MarketDataError>>>,
        delay: Duration,
        call_count: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: &'static str, priority: u8, script: Vec<Result<usize, MarketDataError>>) -> Self {
            Self {
                id,
                priority,
                script: Mutex::new(script),
                delay: Duration::ZERO,
                call_count: AtomicUsize::new(0),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    fn series(symbol: &str, source: &str, points: usize) -> NormalizedSeries {
        let start = Utc::now() - ChronoDuration::days(points as i64);
        let points = (0..points)
            .map(|i| SeriesPoint::new(start + ChronoDuration::days(i as i64), 100.0 + i as f64))
            .collect();
        NormalizedSeries::new(symbol, source, points)
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn capabilities(&self) -> &'static [Capability] {
            SERIES_ONLY
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit::unlimited()
        }

        async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.remove(0)
                } else {
                    script[0].clone()
                }
            };
            let points = next?;
            let result = NormalizedResult::Series(series(&request.symbol, self.id, points));
            Ok(RawPayload(serde_json::to_value(result).unwrap()))
        }

        fn parse(
            &self,
            _request: &FetchRequest,
            raw: RawPayload,
        ) -> Result<NormalizedResult, MarketDataError> {
            Ok(serde_json::from_value(raw.into_inner()).unwrap())
        }
    }

    fn rate_limited(id: &str, secs: u64) -> MarketDataError {
        MarketDataError::RateLimited {
            provider: id.to_string(),
            retry_after: Duration::from_secs(secs),
        }
    }

    fn exhausted(id: &str) -> MarketDataError {
        MarketDataError::AuthExhausted {
            provider: id.to_string(),
            reason: "HTTP 403".to_string(),
        }
    }

    fn transient(id: &str) -> MarketDataError {
        MarketDataError::transient(id, "HTTP 502")
    }

    fn orchestrator(providers: &[Arc<MockProvider>]) -> FallbackOrchestrator {
        let providers = providers
            .iter()
            .map(|p| p.clone() as Arc<dyn MarketDataProvider>)
            .collect();
        FallbackOrchestrator::new(
            providers,
            Arc::new(AvailabilityTracker::new()),
            Arc::new(CacheStore::memory_only()),
            FallbackConfig::default(),
        )
    }

    #[test]
    fn test_providers_sorted_by_priority() {
        let a = Arc::new(MockProvider::new("LOW", 20, vec![Ok(30)]));
        let b = Arc::new(MockProvider::new("HIGH", 1, vec![Ok(30)]));
        let c = Arc::new(MockProvider::new("MID", 5, vec![Ok(30)]));
        let orch = orchestrator(&[a, b, c]);

        let ids: Vec<_> = orch.providers().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["HIGH", "MID", "LOW"]);
        assert_eq!(orch.tracker().counts().total, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_wins() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Ok(30)]));
        let b = Arc::new(MockProvider::new("B", 2, vec![Ok(30)]));
        let orch = orchestrator(&[a.clone(), b.clone()]);

        let result = orch.fetch(&FetchRequest::historical("BTC", 30)).await.unwrap();
        assert_eq!(result.source_provider(), "A");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classification_side_effects() {
        let x = Arc::new(MockProvider::new("COINX", 1, vec![Err(exhausted("COINX"))]));
        let y = Arc::new(MockProvider::new("COINY", 2, vec![Err(rate_limited("COINY", 300))]));
        let z = Arc::new(MockProvider::new("COINZ", 3, vec![Ok(30)]));
        let orch = orchestrator(&[x, y, z]);

        let (result, diagnostics) = orch
            .fetch_with_diagnostics(&FetchRequest::historical("BTC", 90))
            .await;
        assert_eq!(result.unwrap().source_provider(), "COINZ");
        assert!(diagnostics.saw_rate_limit());

        let status = orch.tracker().get_status();
        assert!(status["COINX"].disabled);
        assert!(status["COINY"].rate_limited_until.is_some());
        assert!(orch.tracker().is_available("COINZ"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_has_no_tracker_side_effect() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Err(transient("A"))]));
        let b = Arc::new(MockProvider::new("B", 2, vec![Ok(30)]));
        let orch = orchestrator(&[a, b]);

        let result = orch.fetch(&FetchRequest::historical("BTC", 30)).await.unwrap();
        assert_eq!(result.source_provider(), "B");
        assert!(orch.tracker().is_available("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_data_moves_on_without_penalty() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Ok(3)]));
        let b = Arc::new(MockProvider::new("B", 2, vec![Ok(30)]));
        let orch = orchestrator(&[a.clone(), b.clone()]);

        let (result, diagnostics) = orch
            .fetch_with_diagnostics(&FetchRequest::historical("BTC", 30))
            .await;
        assert_eq!(result.unwrap().data_points(), 30);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert!(orch.tracker().is_available("A"));
        assert!(diagnostics.attempts[0].insufficient);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_cached_before_return() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Ok(30)]));
        let orch = orchestrator(&[a.clone()]);
        let request = FetchRequest::historical("ETH", 90);

        let first = orch.fetch(&request).await.unwrap();
        let entry = orch.cache().get("historical:ETH:90").await.unwrap();
        assert_eq!(entry.ttl_seconds, 86_400);

        let (second, diagnostics) = orch.fetch_with_diagnostics(&request).await;
        assert_eq!(second.unwrap(), first);
        assert!(diagnostics.served_from_cache);
        assert_eq!(a.calls(), 1);

        orch.fetch_fresh(&request).await.unwrap();
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_unavailable_reports_skipped_providers() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Ok(30)]));
        let b = Arc::new(MockProvider::new("B", 2, vec![Ok(30)]));
        let orch = orchestrator(&[a.clone(), b.clone()]);
        orch.tracker().mark_disabled("A", "HTTP 403");
        orch.tracker().mark_disabled("B", "HTTP 401");

        let start = Instant::now();
        let err = orch.fetch(&FetchRequest::historical("BTC", 30)).await.unwrap_err();

        assert_eq!(
            err,
            MarketDataError::AllProvidersUnavailable {
                attempts: 3,
                unavailable: vec!["A".to_string(), "B".to_string()],
            }
        );
        // 60s after pass 1, 120s after pass 2.
        assert_eq!(start.elapsed(), Duration::from_secs(180));
        assert_eq!(a.calls() + b.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failed_retries_with_short_delay() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Err(transient("A"))]));
        let b = Arc::new(MockProvider::new("B", 2, vec![Ok(2)]));
        let orch = orchestrator(&[a.clone(), b.clone()]);

        let start = Instant::now();
        let err = orch.fetch(&FetchRequest::historical("BTC", 30)).await.unwrap_err();

        assert_eq!(
            err,
            MarketDataError::AllProvidersFailed {
                attempts: 3,
                unavailable: vec![],
                failed: vec!["A".to_string(), "B".to_string()],
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(a.calls(), 3);
        assert_eq!(b.calls(), 3);
        assert_eq!(err.public_message(), crate::errors::PUBLIC_UNAVAILABLE_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_when_rate_limit_expires() {
        let y = Arc::new(MockProvider::new("COINY", 2, vec![Ok(30)]));
        let orch = orchestrator(&[y.clone()]);
        orch.tracker().mark_rate_limited("COINY", Duration::from_secs(30));

        let result = orch.fetch(&FetchRequest::historical("BTC", 90)).await.unwrap();
        assert_eq!(result.source_provider(), "COINY");
        assert_eq!(y.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout_moves_on() {
        let slow = Arc::new(MockProvider::new("SLOW", 1, vec![Ok(30)]).slow(Duration::from_secs(120)));
        let fast = Arc::new(MockProvider::new("FAST", 2, vec![Ok(30)]));
        let orch = orchestrator(&[slow.clone(), fast]);

        let start = Instant::now();
        let (result, diagnostics) = orch
            .fetch_with_diagnostics(&FetchRequest::historical("BTC", 30))
            .await;

        assert_eq!(result.unwrap().source_provider(), "FAST");
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert!(diagnostics.errors()[0].1.starts_with("Timeout"));
        assert!(orch.tracker().is_available("SLOW"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_budget_bounds_backoff() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Ok(30)]));
        let providers: Vec<Arc<dyn MarketDataProvider>> = vec![a];
        let config = FallbackConfig {
            fetch_budget: Duration::from_secs(90),
            ..FallbackConfig::default()
        };
        let tracker = Arc::new(AvailabilityTracker::new());
        tracker.mark_disabled("A", "HTTP 403");
        let orch = FallbackOrchestrator::new(
            providers,
            tracker,
            Arc::new(CacheStore::memory_only()),
            config,
        );

        let start = Instant::now();
        let err = orch.fetch(&FetchRequest::historical("BTC", 30)).await.unwrap_err();

        // The 120s backoff before pass 3 would overrun the budget.
        assert_eq!(err.attempts(), Some(2));
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_extreme_backoff_settings_end_without_sleeping() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Ok(30)]));
        let providers: Vec<Arc<dyn MarketDataProvider>> = vec![a];
        let config = FallbackConfig {
            max_attempts: u32::MAX,
            unavailable_backoff: Duration::MAX,
            fetch_budget: Duration::MAX,
            ..FallbackConfig::default()
        };
        let tracker = Arc::new(AvailabilityTracker::new());
        tracker.mark_disabled("A", "HTTP 403");
        let orch = FallbackOrchestrator::new(
            providers,
            tracker,
            Arc::new(CacheStore::memory_only()),
            config,
        );

        let start = Instant::now();
        let err = orch.fetch(&FetchRequest::historical("BTC", 30)).await.unwrap_err();

        assert_eq!(err.attempts(), Some(1));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_capability_fails_fast() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Ok(30)]));
        let orch = orchestrator(&[a.clone()]);

        let err = orch.fetch(&FetchRequest::spot("BTC")).await.unwrap_err();
        assert!(matches!(err, MarketDataError::UnsupportedCapability { .. }));
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_override_paces_calls() {
        let a = Arc::new(MockProvider::new("A", 1, vec![Ok(30)]));
        let orch = orchestrator(&[a]).with_rate_limit(
            "A",
            RateLimit {
                min_interval: Duration::from_secs(2),
            },
        );

        let start = Instant::now();
        orch.fetch_fresh(&FetchRequest::historical("BTC", 30)).await.unwrap();
        orch.fetch_fresh(&FetchRequest::historical("BTC", 30)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
