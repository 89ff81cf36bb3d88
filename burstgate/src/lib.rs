//! # burstgate
//!
//! A burst-permitting rolling window limiter for Rust: at most N claims are admitted in
//! any window of length T.
//!
//! ## Overview
//!
//! A limiter holds N slots. Each slot carries the instant it next becomes claimable:
//! - **Full bursts**: all N slots are claimable right after construction
//! - **Rolling release**: a claimed slot becomes claimable again exactly T after the claim
//! - **No smoothing**: claims never wait longer than the window itself requires
//! - **Blocking or bounded**: claims block, give up at a deadline, or fail fast
//!
//! ## Quick Start
//!
//! ```
//! use burstgate::Limiter;
//! use std::time::Duration;
//!
//! // At most 3 jobs per 100ms window
//! let limiter = Limiter::new("jobs", 3, Duration::from_millis(100));
//!
//! for job in 0..5 {
//!     // Jobs 0-2 start immediately, jobs 3 and 4 wait for the window to roll
//!     limiter.claim_for(&format!("job {job}"));
//! }
//! assert_eq!(limiter.size(), 3);
//! ```
//!
//! ## Bounded Waiting
//!
//! ```
//! use burstgate::{Limiter, LimiterError};
//! use std::time::Duration;
//!
//! let limiter = Limiter::new("exports", 1, Duration::from_secs(60));
//! limiter.claim();
//!
//! // Never blocks
//! assert!(matches!(limiter.try_claim(), Err(LimiterError::NotReady { .. })));
//!
//! // Gives up after 10ms and leaves the limiter untouched
//! assert!(matches!(
//!     limiter.claim_timeout(Duration::from_millis(10)),
//!     Err(LimiterError::Timeout { .. })
//! ));
//! ```
//!
//! ## Rebalancing
//!
//! Limiters that share one budget can move capacity between each other. The slots that
//! [`Limiter::reduce_to`] removes keep their release instants when handed to
//! [`Limiter::add`], so no capacity is created along the way:
//!
//! ```
//! use burstgate::Limiter;
//! use std::time::Duration;
//!
//! let primary = Limiter::new("primary", 8, Duration::from_secs(1));
//! let secondary = Limiter::new("secondary", 0, Duration::from_secs(1));
//!
//! secondary.add(primary.reduce_to(4));
//! assert_eq!(primary.size(), 4);
//! assert_eq!(secondary.size(), 4);
//! ```
//!
//! ## Thread Safety
//!
//! [`Limiter`] is `Send + Sync`. Share it with an `Arc`; concurrent claims always receive
//! distinct slots:
//!
//! ```
//! use burstgate::Limiter;
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let limiter = Arc::new(Limiter::new("shared", 4, Duration::from_secs(1)));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let limiter = Arc::clone(&limiter);
//!         thread::spawn(move || limiter.claim())
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): [`TracingObserver`] logs limiter events through `tracing`
//! - `tokio` (default): [`Limiter::claim_async`] waits without blocking a runtime thread

pub mod core;

#[cfg(feature = "tracing")]
pub use crate::core::TracingObserver;
pub use crate::core::{
    Claim, Limiter, LimiterBuilder, LimiterError, LimiterObserver, NoopObserver, Result, Slot,
    SlotStore,
};
