//! Rolling window limiter
//!
//! This module provides the main [`Limiter`] struct: at most N claims are admitted in any
//! window of length T. All N slots may be claimed at once; afterwards each slot becomes
//! claimable again exactly T after it was last claimed.

use super::{LimiterError, LimiterObserver, Result, Slot, SlotStore};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Builder defaults
const DEFAULT_SIZE: usize = 1;
const DEFAULT_TIMEFRAME_SECS: u64 = 1;

/// Record of a completed claim
///
/// Returned by [`Limiter::claim_ticket`] for instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    /// When the claimed slot became eligible
    pub became_eligible: Instant,
    /// When the recycled slot becomes eligible again
    pub next_release: Instant,
    /// How long the caller waited for the slot
    pub waited: Duration,
}

/// Burst-permitting rolling window limiter
///
/// Holds a [`SlotStore`] of capacity slots and a fixed timeframe T. A claim takes the
/// earliest due slot, waiting if none is due, and puts it back due `now + T`. The slot
/// count is therefore unchanged by claims and only moves through
/// [`reduce_to`](Self::reduce_to) and [`add`](Self::add).
///
/// `Limiter` is `Send + Sync`; share it between threads with an [`Arc`].
///
/// # Example
///
/// ```
/// use burstgate::Limiter;
/// use std::time::Duration;
///
/// // At most 10 claims in any minute
/// let limiter = Limiter::new("mailer", 10, Duration::from_secs(60));
///
/// // The whole burst is available up front
/// for _ in 0..10 {
///     limiter.claim_for("send newsletter");
/// }
///
/// // The 11th claim would block for a minute
/// assert!(limiter.try_claim().is_err());
/// assert_eq!(limiter.size(), 10);
/// ```
pub struct Limiter {
    name: String,
    timeframe: Duration,
    store: SlotStore,
    observer: Option<Arc<dyn LimiterObserver>>,
}

/// Builder for configuring a Limiter
///
/// # Example
///
/// ```
/// use burstgate::Limiter;
/// use std::time::Duration;
///
/// let limiter = Limiter::builder("uploads")
///     .size(5)
///     .timeframe(Duration::from_secs(10))
///     .build()?;
///
/// assert_eq!(limiter.size(), 5);
/// # Ok::<(), burstgate::LimiterError>(())
/// ```
pub struct LimiterBuilder {
    name: String,
    size: usize,
    timeframe: Duration,
    observer: Option<Arc<dyn LimiterObserver>>,
}

impl Limiter {
    /// Create a limiter with `size` slots that are all claimable immediately
    ///
    /// An empty limiter (`size == 0`) is allowed; slots with chosen release instants can
    /// then be supplied through [`add`](Self::add).
    ///
    /// # Panics
    ///
    /// If `timeframe` is too large to be added to the current instant. Use
    /// [`builder`](Self::builder) to get an error instead.
    pub fn new(name: impl Into<String>, size: usize, timeframe: Duration) -> Self {
        assert!(
            Instant::now().checked_add(timeframe).is_some(),
            "timeframe {timeframe:?} overflows the monotonic clock"
        );
        Self::populate(name.into(), size, timeframe, None)
    }

    /// Create a new builder for configuring a Limiter
    pub fn builder(name: impl Into<String>) -> LimiterBuilder {
        LimiterBuilder {
            name: name.into(),
            size: DEFAULT_SIZE,
            timeframe: Duration::from_secs(DEFAULT_TIMEFRAME_SECS),
            observer: None,
        }
    }

    fn populate(
        name: String,
        size: usize,
        timeframe: Duration,
        observer: Option<Arc<dyn LimiterObserver>>,
    ) -> Self {
        let limiter = Limiter {
            name,
            timeframe,
            store: SlotStore::with_capacity(size),
            observer,
        };

        let now = Instant::now();
        limiter.observe(|o| {
            for _ in 0..size {
                o.on_populate(&limiter.name, now);
            }
        });
        let populated = limiter
            .store
            .insert_many(std::iter::repeat_with(|| Slot::new(now)).take(size));
        limiter.observe(|o| o.on_populated(&limiter.name, populated));

        limiter
    }

    /// The diagnostic name of this limiter
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cooldown applied to a slot each time it is claimed
    pub fn timeframe(&self) -> Duration {
        self.timeframe
    }

    /// Number of slots currently held
    pub fn size(&self) -> usize {
        self.store.len()
    }

    /// The earliest instant at which a slot is claimable
    ///
    /// # Errors
    ///
    /// [`LimiterError::Empty`] if the limiter holds no slots, which only happens after
    /// construction with size 0 or [`reduce_to(0)`](Self::reduce_to).
    pub fn peek(&self) -> Result<Instant> {
        self.store.peek_min()
    }

    /// Claim a slot, blocking until one is eligible
    ///
    /// Returns the instant at which the claimed slot became eligible. There is no
    /// internal timeout; an empty limiter blocks until slots are [added](Self::add).
    pub fn claim(&self) -> Instant {
        self.claim_ticket(None).became_eligible
    }

    /// Like [`claim`](Self::claim), with a reason reported to the observer
    pub fn claim_for(&self, reason: &str) -> Instant {
        self.claim_ticket(Some(reason)).became_eligible
    }

    /// Claim a slot, blocking until one is eligible, and describe the claim
    ///
    /// # Example
    ///
    /// ```
    /// use burstgate::Limiter;
    /// use std::time::Duration;
    ///
    /// let limiter = Limiter::new("reports", 1, Duration::from_secs(30));
    /// let claim = limiter.claim_ticket(Some("nightly"));
    ///
    /// assert!(claim.next_release >= claim.became_eligible + Duration::from_secs(30));
    /// assert_eq!(limiter.peek(), Ok(claim.next_release));
    /// ```
    pub fn claim_ticket(&self, reason: Option<&str>) -> Claim {
        let start = Instant::now();
        self.observe_claim_start(reason);
        let slot = self.store.take_min();
        self.refill(slot, reason, start)
    }

    /// Claim a slot only if one is eligible right now
    ///
    /// # Errors
    ///
    /// - [`LimiterError::Empty`] if the limiter holds no slots
    /// - [`LimiterError::NotReady`] with the time until the next slot is eligible
    pub fn try_claim(&self) -> Result<Instant> {
        let start = Instant::now();
        let slot = self.store.try_take_min()?;
        Ok(self.refill(slot, None, start).became_eligible)
    }

    /// Claim a slot, giving up at `deadline`
    ///
    /// # Errors
    ///
    /// [`LimiterError::Timeout`] if no slot became eligible before `deadline`. The limiter
    /// is left exactly as it was.
    pub fn claim_until(&self, deadline: Instant) -> Result<Instant> {
        let start = Instant::now();
        self.observe_claim_start(None);
        match self.store.take_min_until(deadline) {
            Some(slot) => Ok(self.refill(slot, None, start).became_eligible),
            None => Err(LimiterError::Timeout {
                waited: start.elapsed(),
            }),
        }
    }

    /// Claim a slot, giving up after `timeout`
    ///
    /// # Errors
    ///
    /// [`LimiterError::Timeout`] if no slot became eligible in time.
    ///
    /// # Example
    ///
    /// ```
    /// use burstgate::{Limiter, LimiterError};
    /// use std::time::Duration;
    ///
    /// let limiter = Limiter::new("search", 1, Duration::from_secs(60));
    /// limiter.claim();
    ///
    /// let result = limiter.claim_timeout(Duration::from_millis(10));
    /// assert!(matches!(result, Err(LimiterError::Timeout { .. })));
    /// assert_eq!(limiter.size(), 1);
    /// ```
    pub fn claim_timeout(&self, timeout: Duration) -> Result<Instant> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.claim_until(deadline),
            None => Ok(self.claim()),
        }
    }

    /// Claim a slot without blocking the runtime thread
    ///
    /// Dropping the returned future, e.g. through `tokio::time::timeout`, cancels the claim
    /// and leaves the limiter untouched.
    ///
    /// # Example
    ///
    /// ```
    /// use burstgate::Limiter;
    /// use std::time::Duration;
    ///
    /// let limiter = Limiter::new("crawler", 2, Duration::from_secs(1));
    ///
    /// tokio_test::block_on(async {
    ///     limiter.claim_async().await;
    ///     limiter.claim_async_for("robots.txt").await;
    /// });
    /// assert!(limiter.try_claim().is_err());
    /// ```
    #[cfg(feature = "tokio")]
    pub async fn claim_async(&self) -> Instant {
        self.claim_ticket_async(None).await.became_eligible
    }

    /// Like [`claim_async`](Self::claim_async), with a reason reported to the observer
    #[cfg(feature = "tokio")]
    pub async fn claim_async_for(&self, reason: &str) -> Instant {
        self.claim_ticket_async(Some(reason)).await.became_eligible
    }

    /// Async counterpart of [`claim_ticket`](Self::claim_ticket)
    #[cfg(feature = "tokio")]
    pub async fn claim_ticket_async(&self, reason: Option<&str>) -> Claim {
        let start = Instant::now();
        self.observe_claim_start(reason);
        let slot = self.store.take_min_async().await;
        self.refill(slot, reason, start)
    }

    /// Remove slots until `target` remain, latest release instants first
    ///
    /// Returns the removed slots in removal order. Hand them to another limiter sharing
    /// the same budget with [`add`](Self::add) to move capacity without creating any.
    /// Does nothing when the limiter already holds `target` slots or fewer. Reducing to 0
    /// empties the limiter.
    ///
    /// # Example
    ///
    /// ```
    /// use burstgate::Limiter;
    /// use std::time::Duration;
    ///
    /// let east = Limiter::new("east", 6, Duration::from_secs(1));
    /// let west = Limiter::new("west", 0, Duration::from_secs(1));
    ///
    /// let moved = east.reduce_to(3);
    /// assert_eq!(moved.len(), 3);
    /// assert_eq!(west.add(moved), 3);
    /// assert_eq!(east.size() + west.size(), 6);
    /// ```
    pub fn reduce_to(&self, target: usize) -> Vec<Slot> {
        let removed = self.store.split_latest(target);
        if !removed.is_empty() {
            let size_before = target + removed.len();
            self.observe(|o| {
                for slot in &removed {
                    o.on_reduce(&self.name, target, size_before, slot.earliest_release());
                }
            });
        }
        removed
    }

    /// Insert slots, keeping their release instants, and return the new size
    ///
    /// Usually the slots come from [`reduce_to`](Self::reduce_to) on a limiter that shares
    /// this limiter's budget. They may also be built with [`Slot::new`] to seed chosen
    /// release instants.
    pub fn add<I>(&self, slots: I) -> usize
    where
        I: IntoIterator<Item = Slot>,
    {
        let mut added = 0;
        let new_size = self
            .store
            .insert_many(slots.into_iter().inspect(|_| added += 1));
        self.observe(|o| o.on_add(&self.name, added, new_size));
        new_size
    }

    fn refill(&self, slot: Slot, reason: Option<&str>, start: Instant) -> Claim {
        let became_eligible = slot.earliest_release();
        self.observe(|o| o.on_claimed(&self.name, reason, became_eligible));

        let now = Instant::now();
        let waited = now.saturating_duration_since(start);
        let next_release = now + self.timeframe;
        self.store.insert(Slot::new(next_release));
        self.observe(|o| o.on_refill(&self.name, next_release));

        Claim {
            became_eligible,
            next_release,
            waited,
        }
    }

    fn observe_claim_start(&self, reason: Option<&str>) {
        self.observe(|o| o.on_claim_start(&self.name, reason, self.store.peek_min().ok()));
    }

    fn observe(&self, event: impl FnOnce(&dyn LimiterObserver)) {
        if let Some(observer) = &self.observer {
            event(observer.as_ref());
        }
    }
}

impl fmt::Debug for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limiter")
            .field("name", &self.name)
            .field("timeframe", &self.timeframe)
            .field("store", &self.store)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl LimiterBuilder {
    /// Set the initial number of slots
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Set the cooldown applied to a slot each time it is claimed
    pub fn timeframe(mut self, timeframe: Duration) -> Self {
        self.timeframe = timeframe;
        self
    }

    /// Attach an observer that receives every limiter event
    pub fn observer(mut self, observer: Arc<dyn LimiterObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Log limiter events through `tracing`
    #[cfg(feature = "tracing")]
    pub fn with_tracing(self) -> Self {
        self.observer(Arc::new(super::TracingObserver::new()))
    }

    /// Build the Limiter with the configured settings
    ///
    /// # Errors
    ///
    /// [`LimiterError::InvalidTimeframe`] if the timeframe is too large to be added to the
    /// current instant.
    pub fn build(self) -> Result<Limiter> {
        if Instant::now().checked_add(self.timeframe).is_none() {
            return Err(LimiterError::InvalidTimeframe(self.timeframe));
        }
        Ok(Limiter::populate(
            self.name,
            self.size,
            self.timeframe,
            self.observer,
        ))
    }
}
