//! Run summary and window verification

use burstgate::Claim;
use std::fmt;
use std::time::{Duration, Instant};

/// Largest number of instants falling into any half-open window of length `window`
///
/// `instants` is sorted in place.
pub fn max_in_window(instants: &mut [Instant], window: Duration) -> usize {
    instants.sort_unstable();

    let mut max = 0usize;
    let mut first = 0;
    for last in 0..instants.len() {
        while first < last && instants[last] >= instants[first] + window {
            first += 1;
        }
        max = max.max(last - first + 1);
    }
    max
}

/// Outcome of one driver run
#[derive(Debug)]
pub struct Report {
    pub size: usize,
    pub timeframe: Duration,
    pub segments: Vec<(String, usize)>,
    pub claims: usize,
    pub timeouts: usize,
    pub elapsed: Duration,
    pub max_waited: Duration,
    pub max_in_window: usize,
}

impl Report {
    pub fn new(
        size: usize,
        timeframe: Duration,
        segments: Vec<(String, usize)>,
        claims: &[Claim],
        timeouts: usize,
        elapsed: Duration,
    ) -> Self {
        // A claim is admitted when its slot is put back, one timeframe before it is due again
        let mut admitted: Vec<Instant> = claims
            .iter()
            .map(|claim| claim.next_release - timeframe)
            .collect();

        Report {
            size,
            timeframe,
            segments,
            claims: claims.len(),
            timeouts,
            elapsed,
            max_waited: claims
                .iter()
                .map(|claim| claim.waited)
                .max()
                .unwrap_or_default(),
            max_in_window: max_in_window(&mut admitted, timeframe),
        }
    }

    /// Whether no window admitted more claims than the limiter's size
    pub fn within_limit(&self) -> bool {
        self.max_in_window <= self.size
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "burstgate run")?;
        writeln!(f, "=============")?;
        writeln!(f, "size:           {}", self.size)?;
        writeln!(f, "timeframe:      {:?}", self.timeframe)?;
        for (name, size) in &self.segments {
            writeln!(f, "segment {name}: {size} slots")?;
        }
        writeln!(f, "claims:         {}", self.claims)?;
        writeln!(f, "timeouts:       {}", self.timeouts)?;
        writeln!(f, "elapsed:        {:?}", self.elapsed)?;
        writeln!(f, "max wait:       {:?}", self.max_waited)?;
        write!(
            f,
            "max per window: {} ({})",
            self.max_in_window,
            if self.within_limit() { "ok" } else { "EXCEEDED" }
        )
    }
}
