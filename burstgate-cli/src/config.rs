//! Driver configuration and CLI argument parsing
//!
//! Every option can be given on the command line or through an environment variable
//! with the `BURSTGATE_` prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # 10 claims per second, 4 workers claiming 25 times each
//! burstgate --size 10 --timeframe-ms 1000 --workers 4 --claims 25
//!
//! # Same budget split across 3 limiters
//! export BURSTGATE_SEGMENTS=3
//! burstgate --size 10
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the driver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Limiter under test
    pub limiter: LimiterConfig,
    /// Load applied to it
    pub load: LoadConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Limiter configuration
///
/// The total budget of `size` slots is split across `segments` limiters that share it.
#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    /// Total number of slots
    pub size: usize,
    /// Window length in milliseconds
    pub timeframe_ms: u64,
    /// Number of limiters sharing the budget
    pub segments: usize,
}

/// Load configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Claims issued by each worker
    pub claims: usize,
    /// Per-claim timeout in milliseconds, 0 waits forever
    pub timeout_ms: u64,
}

impl LimiterConfig {
    pub fn timeframe(&self) -> Duration {
        Duration::from_millis(self.timeframe_ms)
    }
}

impl LoadConfig {
    /// The per-claim timeout, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Command-line arguments for the driver
///
/// All arguments can also be set via environment variables with the
/// BURSTGATE_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "burstgate",
    about = "Drive a rolling window limiter and verify its window",
    long_about = "Runs concurrent workers against a burstgate limiter, then checks that no window of the configured length admitted more claims than the limiter's size.\n\nEnvironment variables with BURSTGATE_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // Limiter
    #[arg(
        long,
        value_name = "N",
        help = "Total number of slots (claims per window)",
        default_value_t = 10,
        env = "BURSTGATE_SIZE"
    )]
    pub size: usize,
    #[arg(
        long,
        value_name = "MS",
        help = "Window length in milliseconds",
        default_value_t = 1000,
        env = "BURSTGATE_TIMEFRAME_MS"
    )]
    pub timeframe_ms: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Number of limiters sharing the budget",
        default_value_t = 1,
        env = "BURSTGATE_SEGMENTS"
    )]
    pub segments: usize,

    // Load
    #[arg(
        long,
        value_name = "N",
        help = "Number of concurrent workers",
        default_value_t = 4,
        env = "BURSTGATE_WORKERS"
    )]
    pub workers: usize,
    #[arg(
        long,
        value_name = "N",
        help = "Claims issued by each worker",
        default_value_t = 10,
        env = "BURSTGATE_CLAIMS"
    )]
    pub claims: usize,
    #[arg(
        long,
        value_name = "MS",
        help = "Per-claim timeout in milliseconds, 0 waits forever",
        default_value_t = 0,
        env = "BURSTGATE_TIMEOUT_MS"
    )]
    pub timeout_ms: u64,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "BURSTGATE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration is invalid.
    pub fn from_env_and_args() -> Result<Self> {
        // Clap resolves CLI > env > default
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let config = Self::from_args(args);
        config.validate()?;
        Ok(config)
    }

    fn from_args(args: Args) -> Self {
        Config {
            limiter: LimiterConfig {
                size: args.size,
                timeframe_ms: args.timeframe_ms,
                segments: args.segments,
            },
            load: LoadConfig {
                workers: args.workers,
                claims: args.claims,
                timeout_ms: args.timeout_ms,
            },
            log_level: args.log_level,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    fn validate(&self) -> Result<()> {
        if self.limiter.size == 0 {
            return Err(anyhow!("--size must be at least 1"));
        }
        if self.limiter.timeframe_ms == 0 {
            return Err(anyhow!("--timeframe-ms must be at least 1"));
        }
        if self.limiter.segments == 0 || self.limiter.segments > self.limiter.size {
            return Err(anyhow!(
                "--segments must be between 1 and --size ({}), got {}",
                self.limiter.size,
                self.limiter.segments
            ));
        }
        if self.load.workers == 0 {
            return Err(anyhow!("--workers must be at least 1"));
        }
        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("burstgate Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the BURSTGATE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Limiter Configuration:");
        println!("  BURSTGATE_SIZE=<n>            Total number of slots [default: 10]");
        println!("  BURSTGATE_TIMEFRAME_MS=<ms>   Window length in milliseconds [default: 1000]");
        println!("  BURSTGATE_SEGMENTS=<n>        Limiters sharing the budget [default: 1]");
        println!();

        println!("Load Configuration:");
        println!("  BURSTGATE_WORKERS=<n>         Concurrent workers [default: 4]");
        println!("  BURSTGATE_CLAIMS=<n>          Claims per worker [default: 10]");
        println!("  BURSTGATE_TIMEOUT_MS=<ms>     Per-claim timeout, 0 waits forever [default: 0]");
        println!();

        println!("General Configuration:");
        println!(
            "  BURSTGATE_LOG_LEVEL=<level>   Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # 5 claims per 200ms, split over 2 limiters");
        println!("  export BURSTGATE_SIZE=5");
        println!("  export BURSTGATE_TIMEFRAME_MS=200");
        println!("  export BURSTGATE_SEGMENTS=2");
        println!();
        println!("  # Run (CLI args override env vars)");
        println!("  burstgate --workers 8  # Will use 8 workers");
    }
}
