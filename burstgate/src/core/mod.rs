//! Core components of the burstgate limiter
//!
//! This module contains the fundamental building blocks:
//! - [`slot`]: The unit of admission capacity
//! - [`store`]: The deadline-ordered, blocking slot store
//! - [`limiter`]: The claim/rebalance facade over a store
//! - [`observer`]: Hook points for diagnostics

pub mod limiter;
pub mod observer;
pub mod slot;
pub mod store;

pub use limiter::{Claim, Limiter, LimiterBuilder};
#[cfg(feature = "tracing")]
pub use observer::TracingObserver;
pub use observer::{LimiterObserver, NoopObserver};
pub use slot::Slot;
pub use store::SlotStore;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during limiter operations
///
/// # Variants
///
/// - [`Empty`](LimiterError::Empty): The limiter holds no slots at all
/// - [`NotReady`](LimiterError::NotReady): No slot is claimable yet (non-blocking calls only)
/// - [`Timeout`](LimiterError::Timeout): A bounded claim gave up before a slot became claimable
/// - [`InvalidTimeframe`](LimiterError::InvalidTimeframe): The timeframe overflows the monotonic clock
///
/// # Example
///
/// ```
/// use burstgate::{Limiter, LimiterError};
/// use std::time::Duration;
///
/// let limiter = Limiter::new("empty", 0, Duration::from_secs(1));
///
/// match limiter.peek() {
///     Err(LimiterError::Empty) => println!("no capacity configured"),
///     other => println!("next slot: {:?}", other),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// The store holds no slots
    #[error("limiter holds no slots")]
    Empty,

    /// The earliest slot is not claimable yet
    #[error("no slot claimable yet, retry after {retry_after:?}")]
    NotReady {
        /// Time until the earliest slot becomes claimable
        retry_after: Duration,
    },

    /// A bounded claim gave up
    #[error("timed out after {waited:?} waiting for a slot")]
    Timeout {
        /// How long the caller waited before giving up
        waited: Duration,
    },

    /// The timeframe cannot be added to the current instant
    #[error("invalid timeframe: {0:?}")]
    InvalidTimeframe(Duration),
}

/// Result type for limiter operations
pub type Result<T> = std::result::Result<T, LimiterError>;
