use crate::parser::{sort_newest_first, FeedParser};
use crate::sources::{FeedSpec, Publisher};
use crate::types::{DigestError, FetchConfig, FetchReport, Result};
use backoff::{backoff::Backoff, ExponentialBackoff};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch every feed of every publisher and parse the results.
    ///
    /// Requests run concurrently; a failing feed is logged and counted but
    /// never stops the others.
    pub async fn fetch_all(&self, publishers: &[Publisher], cutoff: Option<DateTime<Utc>>) -> FetchReport {
        let targets: Vec<(&Publisher, &FeedSpec)> = publishers
            .iter()
            .flat_map(|p| p.feeds.iter().map(move |f| (p, f)))
            .collect();

        info!("Fetching {} feeds from {} sources", targets.len(), publishers.len());

        let bodies = join_all(targets.iter().map(|(_, feed)| self.fetch_feed(&feed.url))).await;

        let mut parser = match cutoff {
            Some(cutoff) => FeedParser::new().with_cutoff(cutoff),
            None => FeedParser::new(),
        };
        let mut report = FetchReport::default();

        for ((publisher, feed), body) in targets.into_iter().zip(bodies) {
            let parsed = body.and_then(|content| parser.parse_feed(&content, publisher, feed));
            match parsed {
                Ok(articles) => {
                    report.succeeded_sources += 1;
                    report.articles.extend(articles);
                }
                Err(e) => {
                    error!("Error fetching feed {} ({}): {}", feed.url, publisher.name, e);
                    report.failed_sources += 1;
                }
            }
        }

        sort_newest_first(&mut report.articles);

        info!(
            "Fetched {} articles ({} feeds ok, {} failed)",
            report.articles.len(),
            report.succeeded_sources,
            report.failed_sources
        );
        report
    }

    /// GET one feed body. Retries only when `max_retries` is non-zero.
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let mut backoff = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 8),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.timeout_seconds * 2)),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(
                        "Fetched {} ({} bytes in {}ms)",
                        url,
                        body.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(body);
                }
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!("Attempt {} failed for {}, retrying in {:?}: {}", attempt, url, delay, e);
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(DigestError::Provider(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let limit = self.config.max_feed_size_mb.saturating_mul(1024 * 1024);
        if let Some(content_length) = response.content_length() {
            if content_length > limit as u64 {
                return Err(feed_too_large(content_length, self.config.max_feed_size_mb));
            }
        }

        // Content-Length may be absent (chunked) or wrong, so cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                let read = (body.len() + chunk.len()) as u64;
                return Err(feed_too_large(read, self.config.max_feed_size_mb));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn feed_too_large(bytes: u64, max_mb: usize) -> DigestError {
    DigestError::Provider(format!("Feed too large: {} bytes exceeds {}MB limit", bytes, max_mb))
}
