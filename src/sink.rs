//! Article sinks: where finished articles go.
//!
//! The batch dispatcher hands each article to an [`ArticleSink`] exactly once.
//! A failed delivery is logged and counted by the dispatcher; it never stops
//! the other deliveries.

use crate::error::SinkError;
use crate::models::Article;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default artificial delay before the console sink prints an article.
pub const DEFAULT_SINK_DELAY: Duration = Duration::from_millis(100);

/// Downstream consumer of finished articles.
pub trait ArticleSink {
    async fn deliver(&self, article: &Article) -> Result<(), SinkError>;
}

/// Prints each article to stdout after a short delay.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    delay: Duration,
}

impl ConsoleSink {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(DEFAULT_SINK_DELAY)
    }
}

impl ArticleSink for ConsoleSink {
    #[instrument(level = "debug", skip_all, fields(source = %article.source))]
    async fn deliver(&self, article: &Article) -> Result<(), SinkError> {
        tokio::time::sleep(self.delay).await;
        let block = render_article(article);
        // One locked write per article so concurrent deliveries never interleave.
        let mut out = std::io::stdout().lock();
        out.write_all(block.as_bytes())?;
        out.flush()?;
        debug!(bytes = block.len(), "Article printed");
        Ok(())
    }
}

/// Format an article the way the console sink prints it.
pub fn render_article(article: &Article) -> String {
    format!(
        "\n--- Article delivery ---\nTitle     : {}\nTimestamp : {}\nBody      :\n{}\n\n",
        article.title, article.timestamp, article.body
    )
}
