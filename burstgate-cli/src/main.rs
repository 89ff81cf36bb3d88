//! # burstgate
//!
//! Load driver for the burstgate rolling window limiter.
//!
//! Runs concurrent workers against a limiter (optionally split into segments that share
//! one budget), then checks that no window of the configured length admitted more claims
//! than the limiter's size.
//!
//! ```bash
//! # Show all available options
//! burstgate --help
//!
//! # 5 claims per 200ms, 8 workers, budget split over 2 limiters
//! burstgate --size 5 --timeframe-ms 200 --workers 8 --segments 2
//!
//! # Give up on claims that wait longer than 50ms
//! burstgate --size 2 --timeframe-ms 1000 --claims 5 --timeout-ms 50
//! ```

mod config;
mod report;
mod simulation;

use anyhow::{Result, bail};

use crate::config::Config;
use crate::simulation::Simulation;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("burstgate={}", config.log_level).parse()?)
                .add_directive(format!("burstgate_cli={}", config.log_level).parse()?),
        )
        .init();

    let simulation = Simulation::new(&config.limiter)?;
    tracing::info!(
        size = config.limiter.size,
        timeframe = ?config.limiter.timeframe(),
        segments = config.limiter.segments,
        workers = config.load.workers,
        claims = config.load.claims,
        "starting run"
    );

    let report = simulation.run(&config.load).await?;
    println!("{report}");

    if !report.within_limit() {
        bail!(
            "{} claims admitted within one {:?} window, limit is {}",
            report.max_in_window,
            report.timeframe,
            report.size
        );
    }

    Ok(())
}
