//! Batch orchestration: scatter every source across the fetcher, gather the
//! articles, fan them out to the sink and report a [`Summary`].
//!
//! # Phases
//!
//! 1. **Fetch**: one fetch per source, all in flight at once
//! 2. **Filter**: failures are logged and dropped from the batch
//! 3. **Dispatch**: every article is delivered concurrently; sink errors are
//!    logged and counted
//!
//! All fetches finish before dispatch begins, and all deliveries finish before
//! the summary is built.

use crate::fetcher::{Fetcher, JsonSource, Sleep};
use crate::models::{Article, FetchOutcome, Summary};
use crate::registry::SourceSpec;
use crate::sink::ArticleSink;
use futures::stream::{self, StreamExt};
use itertools::{Either, Itertools};
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

/// Run one batch over `sources` and deliver the results to `sink`.
///
/// Always completes; a batch where every source fails reports `count == 0`.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn run_batch<T, S, K>(sources: &[SourceSpec], fetcher: &Fetcher<T, S>, sink: &K) -> Summary
where
    T: JsonSource,
    S: Sleep,
    K: ArticleSink,
{
    let t0 = Instant::now();
    info!(
        max_attempts = fetcher.policy().max_attempts,
        "Starting fetch phase"
    );

    let outcomes: Vec<FetchOutcome> = stream::iter(sources)
        .map(|source| fetcher.fetch(source))
        .buffer_unordered(sources.len().max(1))
        .collect()
        .await;

    let (articles, failed_sources): (Vec<Article>, Vec<String>) =
        outcomes.into_iter().partition_map(|outcome| match outcome {
            FetchOutcome::Success(article) => Either::Left(article),
            FetchOutcome::Failure { source, error } => {
                warn!(%source, error = %error, "Source produced no article");
                Either::Right(source)
            }
        });

    info!(
        fetched = articles.len(),
        failed = failed_sources.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Fetch phase complete"
    );

    let sink_failures = dispatch(&articles, sink).await;

    let summary = Summary {
        count: articles.len(),
        elapsed: t0.elapsed(),
        failed_sources,
        sink_failures,
    };
    info!(
        count = summary.count,
        sink_failures = summary.sink_failures,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Batch complete"
    );
    summary
}

/// Deliver every article concurrently; returns how many deliveries failed.
async fn dispatch<K: ArticleSink>(articles: &[Article], sink: &K) -> usize {
    stream::iter(articles)
        .map(|article| async move {
            match sink.deliver(article).await {
                Ok(()) => true,
                Err(e) => {
                    error!(source = %article.source, title = %article.title, error = %e, "Sink delivery failed");
                    false
                }
            }
        })
        .buffer_unordered(articles.len().max(1))
        .filter(|delivered| std::future::ready(!*delivered))
        .count()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, SinkError};
    use crate::fetcher::RetryPolicy;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves a fixed response per URL and counts calls; unknown URLs refuse
    /// the connection.
    #[derive(Default)]
    struct MapSource {
        responses: HashMap<String, Result<Value, FetchError>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl MapSource {
        fn with(mut self, url: &str, response: Result<Value, FetchError>) -> Self {
            self.responses.insert(url.to_string(), response);
            self
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    impl JsonSource for &MapSource {
        async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            self.responses
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Network("connection refused".into())))
        }
    }

    struct NoSleep;

    impl Sleep for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    /// Records delivered articles; rejects articles from the listed sources.
    #[derive(Default)]
    struct RecordingSink {
        reject: Vec<String>,
        delivered: Mutex<Vec<Article>>,
    }

    impl ArticleSink for RecordingSink {
        async fn deliver(&self, article: &Article) -> Result<(), SinkError> {
            tokio::task::yield_now().await;
            if self.reject.contains(&article.source) {
                return Err(SinkError::Io(std::io::Error::other("downstream unavailable")));
            }
            self.delivered.lock().unwrap().push(article.clone());
            Ok(())
        }
    }

    fn fetcher(source: &MapSource) -> Fetcher<&MapSource, NoSleep> {
        Fetcher::with_sleep(source, RetryPolicy::default(), NoSleep)
    }

    #[tokio::test]
    async fn test_scenario_one_success_one_exhausted() {
        let transport = MapSource::default()
            .with("http://a.test/agify", Ok(json!({"age": 34, "count": 1200})))
            .with("http://b.test/rates", Err(FetchError::HttpStatus(500)));
        let sources = vec![
            SourceSpec::new("age_name", "http://a.test/agify"),
            SourceSpec::new("exchange", "http://b.test/rates"),
        ];
        let sink = RecordingSink::default();

        let summary = run_batch(&sources, &fetcher(&transport), &sink).await;

        assert_eq!(summary.count, 1);
        assert_eq!(summary.failed_sources, vec!["exchange".to_string()]);
        assert_eq!(summary.sink_failures, 0);
        assert_eq!(transport.calls("http://b.test/rates"), 3);
        assert_eq!(transport.calls("http://a.test/agify"), 1);

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].title.starts_with("Age estimate"));
        assert!(delivered[0].body.contains("34"));
    }

    #[tokio::test]
    async fn test_count_matches_successes_for_every_k() {
        const N: usize = 4;
        for k in 0..=N {
            let mut transport = MapSource::default();
            let mut sources = Vec::new();
            for i in 0..N {
                let url = format!("http://s{i}.test/");
                let response = if i < k {
                    Ok(json!({"i": i}))
                } else {
                    Err(FetchError::Decode("expected value".into()))
                };
                transport = transport.with(&url, response);
                sources.push(SourceSpec::new(format!("src{i}"), url));
            }
            let sink = RecordingSink::default();

            let summary = run_batch(&sources, &fetcher(&transport), &sink).await;

            assert_eq!(summary.count, k, "k = {k}");
            assert_eq!(summary.failed_sources.len(), N - k);
            assert_eq!(sink.delivered.lock().unwrap().len(), k);
        }
    }

    #[tokio::test]
    async fn test_empty_registry_completes_with_zero() {
        let transport = MapSource::default();
        let sink = RecordingSink::default();

        let summary = run_batch(&[], &fetcher(&transport), &sink).await;

        assert_eq!(summary.count, 0);
        assert!(summary.failed_sources.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_reduce_count_or_abort_others() {
        let transport = MapSource::default()
            .with("http://a.test/", Ok(json!({"temp": 20})))
            .with("http://b.test/", Ok(json!({"temp": 21})))
            .with("http://c.test/", Ok(json!({"temp": 22})));
        let sources = vec![
            SourceSpec::new("weather_a", "http://a.test/"),
            SourceSpec::new("weather_b", "http://b.test/"),
            SourceSpec::new("weather_c", "http://c.test/"),
        ];
        let sink = RecordingSink {
            reject: vec!["weather_b".to_string()],
            ..Default::default()
        };

        let summary = run_batch(&sources, &fetcher(&transport), &sink).await;

        assert_eq!(summary.count, 3);
        assert_eq!(summary.sink_failures, 1);
        let delivered: Vec<String> = sink
            .delivered
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.source.clone())
            .sorted()
            .collect();
        assert_eq!(delivered, vec!["weather_a", "weather_c"]);
    }

    #[tokio::test]
    async fn test_unknown_source_uses_generic_rule() {
        let transport = MapSource::default().with("http://w.test/", Ok(json!({"temp": 20})));
        let sources = vec![SourceSpec::new("weather", "http://w.test/")];
        let sink = RecordingSink::default();

        run_batch(&sources, &fetcher(&transport), &sink).await;

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered[0].title, "Data from weather");
        assert_eq!(delivered[0].body, r#"{"temp": 20}"#);
    }

    #[tokio::test]
    async fn test_repeated_batches_produce_identical_content() {
        let transport = MapSource::default()
            .with("http://a.test/", Ok(json!({"name": "laura", "age": 34, "count": 1200})))
            .with(
                "http://b.test/",
                Ok(json!({"rates": {"USD": 1.0853, "GBP": 0.8561}})),
            )
            .with("http://c.test/", Err(FetchError::HttpStatus(503)));
        let sources = vec![
            SourceSpec::new("age_name", "http://a.test/"),
            SourceSpec::new("exchange", "http://b.test/"),
            SourceSpec::new("bitcoin", "http://c.test/"),
        ];

        let mut runs = Vec::new();
        for _ in 0..2 {
            let sink = RecordingSink::default();
            run_batch(&sources, &fetcher(&transport), &sink).await;
            let content: Vec<(String, String)> = sink
                .delivered
                .lock()
                .unwrap()
                .iter()
                .map(|a| (a.title.clone(), a.body.clone()))
                .sorted()
                .collect();
            runs.push(content);
        }

        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[0], runs[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_back_off_concurrently() {
        let transport = MapSource::default();
        let sources: Vec<SourceSpec> = (0..3)
            .map(|i| SourceSpec::new(format!("down{i}"), format!("http://down{i}.test/")))
            .collect();
        let sink = RecordingSink::default();
        let fetcher = Fetcher::new(&transport, RetryPolicy::default());

        let summary = run_batch(&sources, &fetcher, &sink).await;

        assert_eq!(summary.count, 0);
        assert_eq!(summary.failed_sources.len(), 3);
        // Each source waits 1.5s + 3.0s; run serially that would be 13.5s.
        assert!(summary.elapsed >= Duration::from_millis(4500));
        assert!(summary.elapsed < Duration::from_secs(6));
    }
}
