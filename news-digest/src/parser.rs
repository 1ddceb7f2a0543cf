use crate::sources::{FeedSpec, Publisher};
use crate::types::{Article, DigestError, Result};
use crate::utils::text::strip_html;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::{debug, info};

/// Turns raw RSS/Atom documents into [`Article`]s.
pub struct FeedParser {
    seen_links: HashSet<String>,
    cutoff: Option<DateTime<Utc>>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            seen_links: HashSet::new(),
            cutoff: None,
        }
    }

    /// Drop entries published before `cutoff`. Undated entries are always kept.
    pub fn with_cutoff(mut self, cutoff: DateTime<Utc>) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    pub fn parse_feed(&mut self, content: &[u8], publisher: &Publisher, feed: &FeedSpec) -> Result<Vec<Article>> {
        debug!("Parsing feed content ({} bytes) from {}", content.len(), feed.url);

        let parsed = parser::parse(content)
            .map_err(|e| DigestError::Parse(format!("Failed to parse feed {}: {}", feed.url, e)))?;

        let total = parsed.entries.len();
        let articles: Vec<Article> = parsed
            .entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry, publisher, feed))
            .collect();

        info!(
            "Parsed {} of {} entries from {} ({})",
            articles.len(),
            total,
            publisher.name,
            feed.category
        );
        Ok(articles)
    }

    fn parse_entry(&mut self, entry: feed_rs::model::Entry, publisher: &Publisher, feed: &FeedSpec) -> Option<Article> {
        let title = entry
            .title
            .map(|t| strip_html(&t.content))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No title".to_string());

        let url = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_else(|| entry.id.clone());

        let published_at = entry.published.or(entry.updated);
        if let (Some(cutoff), Some(published)) = (self.cutoff, published_at) {
            if published < cutoff {
                debug!("Skipping stale entry: {} ({})", title, published);
                return None;
            }
        }

        if !url.is_empty() && !self.seen_links.insert(url.clone()) {
            debug!("Skipping duplicate entry with URL: {}", url);
            return None;
        }

        // Prefer the short summary; fall back to full content.
        let raw_summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();
        let summary = match strip_html(&raw_summary) {
            s if s.is_empty() => "No summary available".to_string(),
            s => s,
        };

        Some(Article {
            title,
            source: publisher.name.clone(),
            source_id: publisher.id.clone(),
            category: feed.category.clone(),
            published_at,
            summary,
            url,
            matched_tickers: Vec::new(),
            sentiment: None,
        })
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first; undated articles go last, fetch order kept among equals.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}
