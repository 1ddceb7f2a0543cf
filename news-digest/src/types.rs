use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A single news item pulled from a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub source: String,
    pub source_id: String,
    pub category: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub url: String,
    pub matched_tickers: Vec<String>,
    pub sentiment: Option<Sentiment>,
}

impl Article {
    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    /// Title and body joined the way matchers see them.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// -1.0 (negative) ..= 1.0 (positive)
    pub score: f64,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerSentiment {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub headlines: Vec<String>,
}

impl TickerSentiment {
    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }

    pub fn record(&mut self, label: SentimentLabel, headline: &str) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Negative => self.negative += 1,
            SentimentLabel::Neutral => self.neutral += 1,
        }
        self.headlines.push(headline.to_string());
    }
}

/// Per-ticker sentiment counts, keyed by ticker symbol.
pub type SentimentBreakdown = BTreeMap<String, TickerSentiment>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub ticker: String,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub volume: Option<u64>,
    pub trading_day: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub title: String,
    pub summary: String,
    pub prices: Vec<PriceQuote>,
    pub sentiment: Option<SentimentBreakdown>,
    pub generated_at: DateTime<Utc>,
    pub article_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Outcome of fetching every configured source once.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub articles: Vec<Article>,
    pub succeeded_sources: usize,
    pub failed_sources: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "News-Digest/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 0,
            retry_delay_seconds: 2,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Pdf,
    Both,
}

impl ExportFormat {
    pub fn wants_markdown(self) -> bool {
        matches!(self, ExportFormat::Markdown | ExportFormat::Both)
    }

    pub fn wants_pdf(self) -> bool {
        matches!(self, ExportFormat::Pdf | ExportFormat::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// Summary generated and at least one channel accepted it.
    Delivered,
    AllChannelsFailed,
    NoChannelsEnabled,
    SummaryFailed,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Delivered => 0,
            RunOutcome::SummaryFailed => 1,
            RunOutcome::AllChannelsFailed => 2,
            RunOutcome::NoChannelsEnabled => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageError {
    pub stage: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub fetched: usize,
    pub failed_sources: usize,
    pub relevant: usize,
    pub digest: Digest,
    pub export_paths: Vec<std::path::PathBuf>,
    pub deliveries: Vec<DeliveryResult>,
    pub stage_errors: Vec<StageError>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn delivered_count(&self) -> usize {
        self.deliveries.iter().filter(|d| d.success).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Delivery via {channel} failed: {message}")]
    Delivery { channel: String, message: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DigestError {
    pub fn delivery(channel: &str, message: impl Into<String>) -> Self {
        DigestError::Delivery {
            channel: channel.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
