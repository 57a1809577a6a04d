//! Command-line interface definitions for api_digest.
//!
//! Every option is optional and can also be supplied through an environment
//! variable. With no options the binary polls the built-in sources using the
//! default retry policy.

use crate::fetcher::{DEFAULT_TIMEOUT, RetryPolicy};
use crate::sink::DEFAULT_SINK_DELAY;
use clap::Parser;
use std::time::Duration;

/// Command-line arguments for a single batch run.
///
/// # Examples
///
/// ```sh
/// # Poll the built-in sources
/// api_digest
///
/// # Poll a custom registry with a tighter retry budget
/// api_digest --sources ./sources.yaml --max-attempts 2 --backoff-secs 0.5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML file listing the sources to poll (defaults to the built-in set)
    #[arg(short, long, env = "API_DIGEST_SOURCES")]
    pub sources: Option<String>,

    /// Attempts per source, including the first
    #[arg(long, env = "API_DIGEST_MAX_ATTEMPTS", default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_attempts: u16,

    /// Per-attempt HTTP timeout in seconds
    #[arg(long, env = "API_DIGEST_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs_f64(), value_parser = parse_secs)]
    pub timeout_secs: f64,

    /// Backoff step in seconds; attempt n waits step * n before retrying
    #[arg(long, env = "API_DIGEST_BACKOFF_SECS", default_value_t = 1.5, value_parser = parse_secs)]
    pub backoff_secs: f64,

    /// Delay before the console sink prints each article, in milliseconds
    #[arg(long, env = "API_DIGEST_SINK_DELAY_MS", default_value_t = DEFAULT_SINK_DELAY.as_millis() as u64)]
    pub sink_delay_ms: u64,
}

impl Cli {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: usize::from(self.max_attempts),
            backoff_step: Duration::from_secs_f64(self.backoff_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn sink_delay(&self) -> Duration {
        Duration::from_millis(self.sink_delay_ms)
    }
}

fn parse_secs(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e| format!("not a number: {e}"))?;
    if (0.0..=86_400.0).contains(&secs) {
        Ok(secs)
    } else {
        Err(format!("{secs} is not a duration between 0 and 86400 seconds"))
    }
}
