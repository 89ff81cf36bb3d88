//! Concurrent load against one or more limiters sharing a budget
//!
//! The whole budget starts on the first segment and is then handed out to the others
//! with `reduce_to` / `add`, the same way a segmented setup would rebalance at runtime.
//! Workers are tokio tasks assigned to segments round-robin.

use crate::config::{LimiterConfig, LoadConfig};
use crate::report::Report;
use anyhow::{Result, anyhow};
use burstgate::{Claim, Limiter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Claims and timeouts observed by one worker
#[derive(Debug, Default)]
struct WorkerOutcome {
    claims: Vec<Claim>,
    timeouts: usize,
}

/// A set of limiters sharing one budget, ready to be driven
pub struct Simulation {
    size: usize,
    timeframe: Duration,
    limiters: Vec<Arc<Limiter>>,
}

impl Simulation {
    /// Build the limiters and split the budget between them
    ///
    /// # Errors
    ///
    /// Returns an error if the limiter cannot be built from the configuration.
    pub fn new(config: &LimiterConfig) -> Result<Self> {
        let segments = config.segments.max(1);
        let limiters = (0..segments)
            .map(|segment| {
                Limiter::builder(format!("segment-{segment}"))
                    .size(if segment == 0 { config.size } else { 0 })
                    .timeframe(config.timeframe())
                    .with_tracing()
                    .build()
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let simulation = Simulation {
            size: config.size,
            timeframe: config.timeframe(),
            limiters,
        };
        simulation.rebalance();
        Ok(simulation)
    }

    /// Move slots off the first segment until every segment holds its share
    fn rebalance(&self) {
        let segments = self.limiters.len();
        let (base, extra) = (self.size / segments, self.size % segments);
        let Some((primary, others)) = self.limiters.split_first() else {
            return;
        };

        for (index, limiter) in others.iter().enumerate() {
            let share = base + usize::from(index + 1 < extra);
            let keep = primary.size().saturating_sub(share);
            let moved = primary.reduce_to(keep);
            let new_size = limiter.add(moved);
            tracing::info!(
                from = primary.name(),
                to = limiter.name(),
                new_size,
                "rebalanced segment"
            );
        }
    }

    /// Sizes of all segments by name
    pub fn segment_sizes(&self) -> Vec<(String, usize)> {
        self.limiters
            .iter()
            .map(|limiter| (limiter.name().to_string(), limiter.size()))
            .collect()
    }

    /// Run the configured load and summarize it
    ///
    /// # Errors
    ///
    /// Returns an error if a worker task panics.
    pub async fn run(&self, load: &LoadConfig) -> Result<Report> {
        let start = Instant::now();
        let mut tasks = JoinSet::new();

        for worker in 0..load.workers {
            let limiter = Arc::clone(&self.limiters[worker % self.limiters.len()]);
            let claims = load.claims;
            let timeout = load.timeout();
            tasks.spawn(run_worker(worker, limiter, claims, timeout));
        }

        let mut claims = Vec::with_capacity(load.workers * load.claims);
        let mut timeouts = 0;
        while let Some(result) = tasks.join_next().await {
            let outcome = result.map_err(|e| anyhow!("Worker task panicked: {e}"))?;
            claims.extend(outcome.claims);
            timeouts += outcome.timeouts;
        }

        Ok(Report::new(
            self.size,
            self.timeframe,
            self.segment_sizes(),
            &claims,
            timeouts,
            start.elapsed(),
        ))
    }
}

async fn run_worker(
    worker: usize,
    limiter: Arc<Limiter>,
    claims: usize,
    timeout: Option<Duration>,
) -> WorkerOutcome {
    let mut outcome = WorkerOutcome::default();

    for index in 0..claims {
        let reason = format!("worker {worker} claim {index}");
        let claim = limiter.claim_ticket_async(Some(&reason));
        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, claim).await {
                Ok(claim) => outcome.claims.push(claim),
                Err(_) => {
                    outcome.timeouts += 1;
                    tracing::warn!(worker, claim = index, ?timeout, "claim timed out");
                }
            },
            None => outcome.claims.push(claim.await),
        }
    }

    tracing::debug!(
        worker,
        limiter = limiter.name(),
        claims = outcome.claims.len(),
        timeouts = outcome.timeouts,
        "worker finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter_config(size: usize, timeframe_ms: u64, segments: usize) -> LimiterConfig {
        LimiterConfig {
            size,
            timeframe_ms,
            segments,
        }
    }

    #[test]
    fn test_budget_split_across_segments() {
        let simulation = Simulation::new(&limiter_config(10, 1000, 3)).unwrap();
        let sizes: Vec<usize> = simulation
            .segment_sizes()
            .into_iter()
            .map(|(_, size)| size)
            .collect();

        assert_eq!(sizes.iter().sum::<usize>(), 10);
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_single_segment_keeps_budget() {
        let simulation = Simulation::new(&limiter_config(5, 1000, 1)).unwrap();
        assert_eq!(simulation.segment_sizes(), vec![("segment-0".to_string(), 5)]);
    }

    #[tokio::test]
    async fn test_run_respects_window() {
        let simulation = Simulation::new(&limiter_config(3, 50, 1)).unwrap();
        let load = LoadConfig {
            workers: 4,
            claims: 3,
            timeout_ms: 0,
        };

        let report = simulation.run(&load).await.unwrap();
        assert_eq!(report.claims, 12);
        assert_eq!(report.timeouts, 0);
        assert!(report.within_limit(), "{report}");
        // 12 claims at 3 per 50ms need at least three full windows
        assert!(report.elapsed >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_run_counts_timeouts() {
        let simulation = Simulation::new(&limiter_config(1, 60_000, 1)).unwrap();
        let load = LoadConfig {
            workers: 1,
            claims: 2,
            timeout_ms: 20,
        };

        let report = simulation.run(&load).await.unwrap();
        assert_eq!(report.claims, 1);
        assert_eq!(report.timeouts, 1);
        assert!(report.within_limit());
    }

    #[tokio::test]
    async fn test_run_across_segments() {
        let simulation = Simulation::new(&limiter_config(4, 40, 2)).unwrap();
        let load = LoadConfig {
            workers: 4,
            claims: 4,
            timeout_ms: 0,
        };

        let report = simulation.run(&load).await.unwrap();
        assert_eq!(report.claims, 16);
        assert!(report.within_limit(), "{report}");
        assert_eq!(report.segments.iter().map(|(_, size)| size).sum::<usize>(), 4);
    }
}
