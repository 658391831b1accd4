/// Classification of a provider failure.
///
/// Used by the orchestrator to decide which side effect, if any, a failed
/// provider call has on the availability tracker.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Tracker Side Effect |
/// |-------|-------------------|---------------------|
/// | `Throttled` | Yes | Timed suppression (auto-reverts) |
/// | `Exhausted` | Yes | Permanent disablement |
/// | `NextProvider` | Yes | None |
/// | `Terminal` | No | None |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureClass {
    /// Provider throttled the request (HTTP 429).
    ///
    /// The provider is suppressed until its retry-after deadline passes and
    /// then becomes available again without intervention.
    Throttled,

    /// Provider credentials or credits are gone (HTTP 401/402/403).
    ///
    /// Retrying will not help for the rest of the process lifetime, so the
    /// provider is disabled until an operator resets it.
    Exhausted,

    /// Skip this provider for the current pass only.
    ///
    /// Used for transient transport errors, timeouts, parse failures and
    /// insufficient data. Nothing is carried forward to future requests.
    NextProvider,

    /// Not a provider failure at all; the request itself cannot succeed.
    Terminal,
}
