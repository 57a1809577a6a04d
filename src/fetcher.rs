//! HTTP JSON fetching with bounded retries and linear backoff.
//!
//! # Architecture
//!
//! The module uses a trait-based design so the retry loop can be exercised
//! without a network:
//! - [`JsonSource`]: one GET returning decoded JSON or a classified error
//! - [`HttpSource`]: the production [`JsonSource`] over a shared `reqwest::Client`
//! - [`Sleep`]: the backoff wait, injectable so delays can be audited
//! - [`Fetcher`]: wraps any [`JsonSource`] with the retry loop and hands the
//!   first decoded payload to the normalizer
//!
//! # Retry Strategy
//!
//! - 3 attempts per source by default
//! - After failed attempt `i` (0-based) wait `1.5s * (i + 1)`, so 1.5s then 3.0s
//! - No wait after the final attempt
//! - Budgets are per source; one source's retries never delay another's

use crate::error::FetchError;
use crate::models::FetchOutcome;
use crate::normalize::normalize;
use crate::registry::SourceSpec;
use crate::utils::truncate_for_log;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Default per-attempt timeout for outbound requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A transport that performs one GET and decodes the body as JSON.
///
/// Implementations classify failures into [`FetchError`] variants; retrying is
/// the caller's job.
pub trait JsonSource {
    /// Issue a single request to `url`.
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// Something that can wait between attempts.
pub trait Sleep {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleep`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry knobs for a [`Fetcher`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per source, including the first. Values below 1 act as 1.
    pub max_attempts: usize,
    /// Unit of the linear backoff.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt with 0-based index `attempt_index`.
    pub fn delay_after(&self, attempt_index: usize) -> Duration {
        let factor = u32::try_from(attempt_index + 1).unwrap_or(u32::MAX);
        self.backoff_step.saturating_mul(factor)
    }
}

/// Production [`JsonSource`] using a shared `reqwest::Client`.
///
/// The client pools connections internally and is safe to use from every
/// concurrent fetch at once; cloning is cheap.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl JsonSource for HttpSource {
    #[instrument(level = "debug", skip(self))]
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = resp.bytes().await?;
        let dt = t0.elapsed();
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => {
                debug!(bytes = body.len(), elapsed_ms = dt.as_millis() as u64, "Decoded JSON body");
                Ok(value)
            }
            Err(e) => {
                debug!(
                    error = %e,
                    preview = %truncate_for_log(&String::from_utf8_lossy(&body), 200),
                    "Body is not JSON"
                );
                Err(e.into())
            }
        }
    }
}

/// Retrying fetcher that turns one [`SourceSpec`] into a [`FetchOutcome`].
#[derive(Debug)]
pub struct Fetcher<T, S = TokioSleep> {
    inner: T,
    policy: RetryPolicy,
    sleeper: S,
}

impl<T> Fetcher<T, TokioSleep>
where
    T: JsonSource,
{
    /// Create a fetcher that backs off with real tokio timers.
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self::with_sleep(inner, policy, TokioSleep)
    }
}

impl<T, S> Fetcher<T, S>
where
    T: JsonSource,
    S: Sleep,
{
    /// Create a fetcher with a custom [`Sleep`] implementation.
    pub fn with_sleep(inner: T, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            inner,
            policy,
            sleeper,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch and normalize one source.
    ///
    /// Never returns an error: an exhausted retry budget becomes
    /// [`FetchOutcome::Failure`] carrying the last attempt's reason.
    #[instrument(level = "info", skip_all, fields(source = %source.name))]
    pub async fn fetch(&self, source: &SourceSpec) -> FetchOutcome {
        match self.fetch_payload(source).await {
            Ok(payload) => {
                let article = normalize(&source.name, &payload);
                info!(title = %article.title, "Normalized article");
                FetchOutcome::Success(article)
            }
            Err(error) => FetchOutcome::Failure {
                source: source.name.clone(),
                error,
            },
        }
    }

    /// Run the retry loop and return the first decoded payload.
    pub async fn fetch_payload(&self, source: &SourceSpec) -> Result<Value, FetchError> {
        let total_t0 = Instant::now();
        let max = self.policy.max_attempts.max(1);
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.get_json(&source.url).await {
                Ok(payload) => {
                    debug!(
                        attempt = attempt + 1,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "Fetch succeeded"
                    );
                    return Ok(payload);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();

                    if attempt >= max {
                        error!(
                            source = %source.name,
                            attempt,
                            max,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "Fetch exhausted retries; dropping source"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay_after(attempt - 1);
                    warn!(
                        source = %source.name,
                        attempt,
                        max,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "Fetch attempt failed; backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}
