//! Data models shared by the fetcher, normalizer, dispatcher and sink.
//!
//! This module defines the records that flow through one batch:
//! - [`Article`]: the normalized, human-readable record built from one payload
//! - [`FetchOutcome`]: what a single source produced after its retry budget
//! - [`Summary`]: batch-level statistics printed at the end of a run

use crate::error::FetchError;
use std::time::Duration;

/// A normalized article derived from one source's successful response.
///
/// Articles are only ever constructed by the normalizer, fully formed, and
/// are never mutated afterwards.
///
/// # Fields
///
/// * `source` - Registry name of the source the payload came from
/// * `title` - Human-readable headline
/// * `timestamp` - Local capture time in `YYYY-MM-DD HH:MM:SS` format
/// * `body` - Multi-line text extracted from the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Registry name of the originating source.
    pub source: String,
    /// Headline shown by the sink.
    pub title: String,
    /// Local wall-clock time at normalization.
    pub timestamp: String,
    /// Extracted content, possibly spanning several lines.
    pub body: String,
}

/// Result of running one source through the fetcher.
///
/// Failures carry the reason of the last attempt. The orchestrator drops them
/// from the batch; they are never retried at batch level.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Article),
    Failure { source: String, error: FetchError },
}

/// Statistics for one completed batch.
///
/// `count` is the number of articles fetched successfully and handed to the
/// sink. Failed deliveries are reported separately in `sink_failures` and do
/// not reduce `count`.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// Articles fetched and dispatched.
    pub count: usize,
    /// Wall-clock duration of fetch, normalization and dispatch.
    pub elapsed: Duration,
    /// Names of sources that exhausted their retry budget.
    pub failed_sources: Vec<String>,
    /// Deliveries the sink reported as failed.
    pub sink_failures: usize,
}

impl Summary {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Render the end-of-run report printed by the binary.
    pub fn report(&self) -> String {
        format!(
            "=== BATCH SUMMARY ===\nArticles processed : {}\nTotal elapsed time : {:.2} seconds",
            self.count,
            self.elapsed_secs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_report_format() {
        let summary = Summary {
            count: 4,
            elapsed: Duration::from_millis(3400),
            failed_sources: vec!["bitcoin".to_string()],
            sink_failures: 0,
        };
        let report = summary.report();
        assert!(report.starts_with("=== BATCH SUMMARY ==="));
        assert!(report.contains("Articles processed : 4"));
        assert!(report.contains("Total elapsed time : 3.40 seconds"));
    }
}
