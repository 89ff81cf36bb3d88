//! A single unit of admission capacity

use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

/// One unit of admission capacity, represented by the instant it next becomes claimable
///
/// A `Slot` is a move-only value: it is neither `Clone` nor `Copy`, so at any moment it
/// lives either inside a [`SlotStore`](super::SlotStore) or with the caller that just took
/// it out. Slots order by their release instant, earliest first.
///
/// # Example
///
/// ```
/// use burstgate::Slot;
/// use std::time::{Duration, Instant};
///
/// let now = Instant::now();
/// let slot = Slot::new(now + Duration::from_secs(1));
///
/// assert!(!slot.is_due(now));
/// assert_eq!(slot.remaining(now), Duration::from_secs(1));
/// ```
pub struct Slot {
    earliest_release: Instant,
}

impl Slot {
    /// Create a slot that becomes claimable at `earliest_release`
    pub fn new(earliest_release: Instant) -> Self {
        Slot { earliest_release }
    }

    /// Create a slot that is claimable right away
    pub fn now() -> Self {
        Slot::new(Instant::now())
    }

    /// The earliest instant this slot may be claimed
    pub fn earliest_release(&self) -> Instant {
        self.earliest_release
    }

    /// Whether the slot may be claimed at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.earliest_release <= now
    }

    /// Time left until the slot becomes claimable, zero if it already is
    pub fn remaining(&self, now: Instant) -> Duration {
        self.earliest_release.saturating_duration_since(now)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("earliest_release", &self.earliest_release)
            .finish()
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.earliest_release == other.earliest_release
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.earliest_release.cmp(&other.earliest_release)
    }
}

impl From<Instant> for Slot {
    fn from(earliest_release: Instant) -> Self {
        Slot::new(earliest_release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_ordering() {
        let now = Instant::now();
        let early = Slot::new(now);
        let late = Slot::new(now + Duration::from_millis(5));

        assert!(early < late);
        assert_eq!(early, Slot::new(now));
    }

    #[test]
    fn test_slot_due_and_remaining() {
        let now = Instant::now();
        let slot = Slot::new(now + Duration::from_millis(50));

        assert!(!slot.is_due(now));
        assert!(slot.is_due(now + Duration::from_millis(50)));
        assert_eq!(slot.remaining(now), Duration::from_millis(50));
        assert_eq!(slot.remaining(now + Duration::from_secs(1)), Duration::ZERO);
    }
}
