//! Deadline-ordered slot storage with blocking extraction
//!
//! [`SlotStore`] is a min-heap of [`Slot`]s keyed by their release instant. Takers block
//! until the earliest slot is due, then remove exactly that slot. Every waiter re-reads the
//! head after each wake, so an insert with an earlier deadline never leaves a waiter
//! sleeping past it.

use super::{LimiterError, Result, Slot};
use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Instant;

type Heap = BinaryHeap<Reverse<Slot>>;

/// State of the heap head at a given instant
enum Head {
    /// The earliest slot was due and has been removed
    Due(Slot),
    /// The earliest slot becomes due at this instant
    Pending(Instant),
    Empty,
}

fn pop_due(heap: &mut Heap, now: Instant) -> Head {
    let release = match heap.peek() {
        Some(Reverse(slot)) => slot.earliest_release(),
        None => return Head::Empty,
    };
    if release > now {
        return Head::Pending(release);
    }
    match heap.pop() {
        Some(Reverse(slot)) => Head::Due(slot),
        None => Head::Empty,
    }
}

/// Thread-safe priority collection of slots with a blocking take
///
/// All operations lock one internal mutex. Only the `take_*` family ever waits, and only
/// while the store is empty or its earliest slot lies in the future.
///
/// # Example
///
/// ```
/// use burstgate::{Slot, SlotStore};
/// use std::time::{Duration, Instant};
///
/// let store = SlotStore::new();
/// let now = Instant::now();
/// store.insert(Slot::new(now + Duration::from_secs(60)));
/// store.insert(Slot::new(now));
///
/// // The due slot comes out first, without waiting
/// let slot = store.take_min();
/// assert_eq!(slot.earliest_release(), now);
/// assert_eq!(store.len(), 1);
/// ```
pub struct SlotStore {
    heap: Mutex<Heap>,
    available: Condvar,
    #[cfg(feature = "tokio")]
    notify: tokio::sync::Notify,
}

impl SlotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty store with room for `capacity` slots
    pub fn with_capacity(capacity: usize) -> Self {
        SlotStore {
            heap: Mutex::new(BinaryHeap::with_capacity(capacity)),
            available: Condvar::new(),
            #[cfg(feature = "tokio")]
            notify: tokio::sync::Notify::new(),
        }
    }

    /// Number of slots currently held
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Whether the store holds no slots
    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Release instant of the earliest slot, without removing it
    ///
    /// # Errors
    ///
    /// [`LimiterError::Empty`] if the store holds no slots.
    pub fn peek_min(&self) -> Result<Instant> {
        self.heap
            .lock()
            .peek()
            .map(|Reverse(slot)| slot.earliest_release())
            .ok_or(LimiterError::Empty)
    }

    /// Remove and return the earliest slot, blocking until it is due
    ///
    /// Waits while the store is empty or its earliest slot lies in the future. Concurrent
    /// callers always receive distinct slots. There is no timeout; see
    /// [`take_min_until`](Self::take_min_until) for bounded waiting.
    pub fn take_min(&self) -> Slot {
        let mut heap = self.heap.lock();
        loop {
            match pop_due(&mut heap, Instant::now()) {
                Head::Due(slot) => return slot,
                Head::Pending(release) => {
                    self.available.wait_until(&mut heap, release);
                }
                Head::Empty => self.available.wait(&mut heap),
            }
        }
    }

    /// Like [`take_min`](Self::take_min), but gives up at `deadline`
    ///
    /// Returns `None` when `deadline` passes first. Giving up leaves the store untouched.
    pub fn take_min_until(&self, deadline: Instant) -> Option<Slot> {
        let mut heap = self.heap.lock();
        loop {
            let now = Instant::now();
            let wake_at = match pop_due(&mut heap, now) {
                Head::Due(slot) => return Some(slot),
                Head::Pending(release) => release.min(deadline),
                Head::Empty => deadline,
            };
            if now >= deadline {
                return None;
            }
            self.available.wait_until(&mut heap, wake_at);
        }
    }

    /// Remove and return the earliest slot only if it is already due
    ///
    /// # Errors
    ///
    /// - [`LimiterError::Empty`] if the store holds no slots
    /// - [`LimiterError::NotReady`] with the time left if the earliest slot is not due
    pub fn try_take_min(&self) -> Result<Slot> {
        let now = Instant::now();
        match pop_due(&mut self.heap.lock(), now) {
            Head::Due(slot) => Ok(slot),
            Head::Pending(release) => Err(LimiterError::NotReady {
                retry_after: release.saturating_duration_since(now),
            }),
            Head::Empty => Err(LimiterError::Empty),
        }
    }

    /// Async counterpart of [`take_min`](Self::take_min)
    ///
    /// Waits without blocking the runtime thread. Dropping the future before it completes
    /// leaves the store untouched: the slot is removed in the same poll that returns it.
    #[cfg(feature = "tokio")]
    pub async fn take_min_async(&self) -> Slot {
        loop {
            // Register before looking at the heap so an insert in between still wakes us
            let mut notified = std::pin::pin!(self.notify.notified());
            notified.as_mut().enable();

            let head = pop_due(&mut self.heap.lock(), Instant::now());
            match head {
                Head::Due(slot) => return slot,
                Head::Pending(release) => {
                    let release = tokio::time::Instant::from_std(release);
                    let _ = tokio::time::timeout_at(release, notified).await;
                }
                Head::Empty => notified.await,
            }
        }
    }

    /// Add a slot
    ///
    /// Never blocks. Waiters are woken when the slot could be the new earliest one, so
    /// they can re-arm their wait against its deadline.
    pub fn insert(&self, slot: Slot) {
        let wake = {
            let mut heap = self.heap.lock();
            let wake = heap.peek().is_none_or(|Reverse(head)| slot <= *head);
            heap.push(Reverse(slot));
            wake
        };
        if wake {
            self.wake_waiters();
        }
    }

    /// Add several slots under a single lock acquisition
    ///
    /// Returns the number of slots held afterwards.
    pub fn insert_many<I>(&self, slots: I) -> usize
    where
        I: IntoIterator<Item = Slot>,
    {
        let (wake, len) = {
            let mut heap = self.heap.lock();
            let head = heap.peek().map(|Reverse(slot)| slot.earliest_release());
            let mut wake = false;
            for slot in slots {
                wake |= head.is_none_or(|head| slot.earliest_release() <= head);
                heap.push(Reverse(slot));
            }
            (wake, heap.len())
        };
        if wake {
            self.wake_waiters();
        }
        len
    }

    /// Release instants of all slots, latest first
    ///
    /// A point-in-time copy; nothing is claimed.
    pub fn snapshot_descending(&self) -> Vec<Instant> {
        let mut releases: Vec<Instant> = self
            .heap
            .lock()
            .iter()
            .map(|Reverse(slot)| slot.earliest_release())
            .collect();
        releases.sort_unstable_by(|a, b| b.cmp(a));
        releases
    }

    /// Remove one slot whose release instant equals `earliest_release`
    ///
    /// Returns `None` if no such slot is held anymore, e.g. because a concurrent taker
    /// got it first.
    pub fn remove(&self, earliest_release: Instant) -> Option<Slot> {
        let mut heap = self.heap.lock();
        if !heap
            .iter()
            .any(|Reverse(slot)| slot.earliest_release() == earliest_release)
        {
            return None;
        }

        let head_changed = heap
            .peek()
            .is_some_and(|Reverse(head)| head.earliest_release() == earliest_release);
        let mut slots = std::mem::take(&mut *heap).into_vec();
        let removed = slots
            .iter()
            .position(|Reverse(slot)| slot.earliest_release() == earliest_release)
            .map(|index| slots.swap_remove(index).0);
        *heap = BinaryHeap::from(slots);
        drop(heap);

        // Waiters armed against the old head re-read the new one
        if head_changed {
            self.wake_waiters();
        }
        removed
    }

    /// Remove the latest slots until at most `target` remain
    ///
    /// The removed slots are returned latest first. Sorting happens once, under a single
    /// lock acquisition. Removing slots never makes the head earlier, so nobody is woken.
    pub fn split_latest(&self, target: usize) -> Vec<Slot> {
        let mut heap = self.heap.lock();
        if heap.len() <= target {
            return Vec::new();
        }

        // Ascending order of `Reverse` is descending order of release instants
        let mut slots = std::mem::take(&mut *heap).into_sorted_vec();
        let kept = slots.split_off(slots.len() - target);
        *heap = BinaryHeap::from(kept);
        slots.into_iter().map(|Reverse(slot)| slot).collect()
    }

    fn wake_waiters(&self) {
        self.available.notify_all();
        #[cfg(feature = "tokio")]
        self.notify.notify_waiters();
    }
}

impl Default for SlotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Slot> for SlotStore {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        let store = SlotStore::new();
        store.insert_many(iter);
        store
    }
}

impl fmt::Debug for SlotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = self.heap.lock();
        f.debug_struct("SlotStore")
            .field("len", &heap.len())
            .field(
                "next_release",
                &heap.peek().map(|Reverse(slot)| slot.earliest_release()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_peek_min_empty() {
        let store = SlotStore::new();
        assert_eq!(store.peek_min(), Err(LimiterError::Empty));
        assert!(store.is_empty());
    }

    #[test]
    fn test_peek_min_returns_earliest() {
        let now = Instant::now();
        let store: SlotStore = [
            Slot::new(now + Duration::from_secs(3)),
            Slot::new(now + Duration::from_secs(1)),
            Slot::new(now + Duration::from_secs(2)),
        ]
        .into_iter()
        .collect();

        assert_eq!(store.peek_min(), Ok(now + Duration::from_secs(1)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_take_min_serves_earliest_first() {
        let now = Instant::now();
        let store = SlotStore::new();
        store.insert(Slot::new(now - Duration::from_millis(1)));
        store.insert(Slot::new(now - Duration::from_millis(3)));
        store.insert(Slot::new(now - Duration::from_millis(2)));

        assert_eq!(
            store.take_min().earliest_release(),
            now - Duration::from_millis(3)
        );
        assert_eq!(
            store.take_min().earliest_release(),
            now - Duration::from_millis(2)
        );
        assert_eq!(
            store.take_min().earliest_release(),
            now - Duration::from_millis(1)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_take_min_waits_until_due() {
        let start = Instant::now();
        let store = SlotStore::new();
        store.insert(Slot::new(start + Duration::from_millis(50)));

        let slot = store.take_min();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(slot.earliest_release(), start + Duration::from_millis(50));
    }

    #[test]
    fn test_insert_wakes_waiter_on_empty_store() {
        let store = Arc::new(SlotStore::new());

        let taker = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.take_min())
        };

        thread::sleep(Duration::from_millis(20));
        let release = Instant::now();
        store.insert(Slot::new(release));

        let slot = taker.join().unwrap();
        assert_eq!(slot.earliest_release(), release);
        assert!(store.is_empty());
    }

    #[test]
    fn test_earlier_insert_rewakes_sleeping_waiter() {
        let start = Instant::now();
        let store = Arc::new(SlotStore::new());
        store.insert(Slot::new(start + Duration::from_secs(10)));

        let taker = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.take_min())
        };

        thread::sleep(Duration::from_millis(20));
        store.insert(Slot::new(Instant::now()));

        let slot = taker.join().unwrap();
        assert!(slot.earliest_release() < start + Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_take_min_until_gives_up_without_mutation() {
        let now = Instant::now();
        let store = SlotStore::new();
        store.insert(Slot::new(now + Duration::from_secs(60)));

        let taken = store.take_min_until(Instant::now() + Duration::from_millis(20));
        assert!(taken.is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.peek_min(), Ok(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_take_min_until_on_empty_store() {
        let store = SlotStore::new();
        let start = Instant::now();
        assert!(store.take_min_until(start + Duration::from_millis(10)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_take_min_until_returns_slot_that_becomes_due() {
        let start = Instant::now();
        let store = SlotStore::new();
        store.insert(Slot::new(start + Duration::from_millis(20)));

        let slot = store.take_min_until(start + Duration::from_secs(5));
        assert!(slot.is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_try_take_min() {
        let now = Instant::now();
        let store = SlotStore::new();
        assert_eq!(store.try_take_min().unwrap_err(), LimiterError::Empty);

        store.insert(Slot::new(now + Duration::from_secs(60)));
        match store.try_take_min() {
            Err(LimiterError::NotReady { retry_after }) => {
                assert!(retry_after > Duration::from_secs(59));
                assert!(retry_after <= Duration::from_secs(60));
            }
            other => panic!("expected NotReady, got {other:?}"),
        }
        assert_eq!(store.len(), 1);

        store.insert(Slot::new(now));
        assert_eq!(store.try_take_min().unwrap().earliest_release(), now);
    }

    #[test]
    fn test_snapshot_descending() {
        let now = Instant::now();
        let store: SlotStore = (0..5)
            .map(|i| Slot::new(now + Duration::from_millis(i * 10)))
            .collect();

        let snapshot = store.snapshot_descending();
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot[0], now + Duration::from_millis(40));
        assert_eq!(snapshot[4], now);
        assert!(snapshot.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_remove_present_and_absent() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        let store: SlotStore = [Slot::new(now), Slot::new(later)].into_iter().collect();

        let removed = store.remove(later).unwrap();
        assert_eq!(removed.earliest_release(), later);
        assert_eq!(store.len(), 1);

        assert!(store.remove(later).is_none());
        assert_eq!(store.peek_min(), Ok(now));
    }

    #[test]
    fn test_remove_one_of_equal_slots() {
        let now = Instant::now();
        let store: SlotStore = [Slot::new(now), Slot::new(now)].into_iter().collect();

        assert!(store.remove(now).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_split_latest() {
        let now = Instant::now();
        let store: SlotStore = (0..6)
            .map(|i| Slot::new(now + Duration::from_millis(i * 10)))
            .collect();

        let removed = store.split_latest(2);
        let releases: Vec<Instant> = removed.iter().map(Slot::earliest_release).collect();
        assert_eq!(
            releases,
            vec![
                now + Duration::from_millis(50),
                now + Duration::from_millis(40),
                now + Duration::from_millis(30),
                now + Duration::from_millis(20),
            ]
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.peek_min(), Ok(now));
    }

    #[test]
    fn test_split_latest_noop_and_to_zero() {
        let now = Instant::now();
        let store: SlotStore = [Slot::new(now)].into_iter().collect();

        assert!(store.split_latest(1).is_empty());
        assert!(store.split_latest(5).is_empty());
        assert_eq!(store.len(), 1);

        let removed = store.split_latest(0);
        assert_eq!(removed.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_many_reports_len() {
        let now = Instant::now();
        let store = SlotStore::new();
        assert_eq!(store.insert_many((0..3).map(|_| Slot::new(now))), 3);
        assert_eq!(store.insert_many(std::iter::empty()), 3);
    }

    #[test]
    fn test_concurrent_takers_get_distinct_slots() {
        let now = Instant::now();
        let store: Arc<SlotStore> = Arc::new(
            (0..16)
                .map(|i| Slot::new(now - Duration::from_micros(i)))
                .collect(),
        );

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.take_min().earliest_release())
            })
            .collect();

        let mut releases: Vec<Instant> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        releases.sort();
        releases.dedup();
        assert_eq!(releases.len(), 16);
        assert!(store.is_empty());
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_take_min_async_waits_for_insert() {
        let store = Arc::new(SlotStore::new());

        let taker = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.take_min_async().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let release = Instant::now();
        store.insert(Slot::new(release));

        let slot = taker.await.unwrap();
        assert_eq!(slot.earliest_release(), release);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_take_min_async_cancelled_without_mutation() {
        let now = Instant::now();
        let store = SlotStore::new();
        store.insert(Slot::new(now + Duration::from_secs(60)));

        let result =
            tokio::time::timeout(Duration::from_millis(20), store.take_min_async()).await;
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.peek_min(), Ok(now + Duration::from_secs(60)));
    }
}
