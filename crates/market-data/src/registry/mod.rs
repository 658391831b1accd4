//! Provider registry module.
//!
//! This module provides orchestration for market data providers, including:
//! - Availability tracking (timed rate limits, permanent disablement)
//! - Client-side pacing per provider
//! - Priority-ordered fallback with bounded retries
//! - Diagnostics for debugging provider selection

mod availability;
mod diagnostics;
mod orchestrator;
mod rate_limiter;

pub use availability::{AvailabilityCounts, AvailabilityState, AvailabilityTracker, ProviderState};
pub use diagnostics::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use orchestrator::{FallbackConfig, FallbackOrchestrator};
pub use rate_limiter::RateLimiter;
