//! Diagnostic hook points
//!
//! A [`Limiter`](super::Limiter) reports what it does to an optional [`LimiterObserver`].
//! Without one, nothing is recorded and no work is done. With the `tracing` feature,
//! [`TracingObserver`] forwards every event to the `tracing` facade.

use std::time::Instant;

/// Receives limiter events
///
/// Every method has an empty default, so implementors only override what they need.
/// Methods run on the calling thread, outside the store lock, and should return quickly.
///
/// # Example
///
/// ```
/// use burstgate::{Limiter, LimiterObserver};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::{Duration, Instant};
///
/// #[derive(Default)]
/// struct ClaimCounter(AtomicUsize);
///
/// impl LimiterObserver for ClaimCounter {
///     fn on_claimed(&self, _name: &str, _reason: Option<&str>, _became_eligible: Instant) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counter = Arc::new(ClaimCounter::default());
/// let limiter = Limiter::builder("api")
///     .size(2)
///     .timeframe(Duration::from_secs(1))
///     .observer(counter.clone())
///     .build()?;
///
/// limiter.claim();
/// assert_eq!(counter.0.load(Ordering::Relaxed), 1);
/// # Ok::<(), burstgate::LimiterError>(())
/// ```
pub trait LimiterObserver: Send + Sync {
    /// A slot was created at construction time
    fn on_populate(&self, name: &str, earliest_release: Instant) {
        let _ = (name, earliest_release);
    }

    /// Construction finished with `size` slots
    fn on_populated(&self, name: &str, size: usize) {
        let _ = (name, size);
    }

    /// A claim is about to wait for a slot; `first_available` is the current head
    fn on_claim_start(&self, name: &str, reason: Option<&str>, first_available: Option<Instant>) {
        let _ = (name, reason, first_available);
    }

    /// A claim took a slot that became eligible at `became_eligible`
    fn on_claimed(&self, name: &str, reason: Option<&str>, became_eligible: Instant) {
        let _ = (name, reason, became_eligible);
    }

    /// A claimed slot was put back, eligible again at `next_release`
    fn on_refill(&self, name: &str, next_release: Instant) {
        let _ = (name, next_release);
    }

    /// One slot was removed while reducing from `size_before` towards `target`
    fn on_reduce(&self, name: &str, target: usize, size_before: usize, removed_release: Instant) {
        let _ = (name, target, size_before, removed_release);
    }

    /// `added` slots were inserted, leaving `new_size` slots
    fn on_add(&self, name: &str, added: usize, new_size: usize) {
        let _ = (name, added, new_size);
    }
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LimiterObserver for NoopObserver {}

/// Observer that logs every event through `tracing`
///
/// Per-slot events (populate, claim start, refill) are emitted at TRACE, summaries and
/// rebalancing at DEBUG. All events use the `burstgate` target and carry the limiter name.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl TracingObserver {
    /// Create a new tracing observer
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "tracing")]
impl LimiterObserver for TracingObserver {
    fn on_populate(&self, name: &str, earliest_release: Instant) {
        tracing::trace!(target: "burstgate", limiter = name, ?earliest_release, "populating slot");
    }

    fn on_populated(&self, name: &str, size: usize) {
        tracing::debug!(target: "burstgate", limiter = name, size, "populated");
    }

    fn on_claim_start(&self, name: &str, reason: Option<&str>, first_available: Option<Instant>) {
        tracing::trace!(
            target: "burstgate",
            limiter = name,
            reason = reason.unwrap_or_default(),
            ?first_available,
            "claiming slot"
        );
    }

    fn on_claimed(&self, name: &str, reason: Option<&str>, became_eligible: Instant) {
        tracing::debug!(
            target: "burstgate",
            limiter = name,
            reason = reason.unwrap_or_default(),
            ?became_eligible,
            "claimed slot"
        );
    }

    fn on_refill(&self, name: &str, next_release: Instant) {
        tracing::trace!(target: "burstgate", limiter = name, ?next_release, "refilled slot");
    }

    fn on_reduce(&self, name: &str, target: usize, size_before: usize, removed_release: Instant) {
        tracing::debug!(
            target: "burstgate",
            limiter = name,
            target_size = target,
            size_before,
            ?removed_release,
            "removed slot while reducing"
        );
    }

    fn on_add(&self, name: &str, added: usize, new_size: usize) {
        tracing::debug!(target: "burstgate", limiter = name, added, new_size, "added slots");
    }
}
