use crate::config::AiSettings;
use crate::llm_adapter::{CompletionRequest, LlmAdapter};
use crate::types::{Article, Digest, PriceQuote, Result, SentimentBreakdown};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info};

pub const NO_NEWS_SUMMARY: &str = "No relevant news articles found for your preferences today.";

const SYSTEM_PROMPT: &str = "You are a financial news analyst assistant that provides concise, informative \
summaries of financial news. Focus on key information relevant to investors and market trends.";

/// Headlines listed in the fallback digest.
const FALLBACK_HEADLINES: usize = 10;

/// Everything the summarizer may fold into its single request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryContext<'a> {
    pub prices: &'a [PriceQuote],
    pub sentiment: Option<&'a SentimentBreakdown>,
    /// Drop the ticker/keyword focus from the prompt.
    pub bypass: bool,
}

/// Turns the ranked article set into digest text with one completion call.
pub struct Summarizer {
    llm: Arc<dyn LlmAdapter>,
    max_tokens: u32,
    temperature: f32,
    summary_length: String,
    tickers: Vec<String>,
    keywords: Vec<String>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmAdapter>, ai: &AiSettings, tickers: &[String], keywords: &[String]) -> Self {
        Self {
            llm,
            max_tokens: ai.max_tokens,
            temperature: ai.temperature,
            summary_length: ai.summary_length.clone(),
            tickers: tickers.to_vec(),
            keywords: keywords.to_vec(),
        }
    }

    /// Summarize `articles`. An empty list yields [`NO_NEWS_SUMMARY`] without
    /// contacting the provider; any provider error is returned to the caller.
    pub async fn summarize(&self, articles: &[Article], context: SummaryContext<'_>) -> Result<String> {
        if articles.is_empty() {
            info!("No articles to summarize");
            return Ok(NO_NEWS_SUMMARY.to_string());
        }

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: self.build_prompt(articles, context),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        debug!("Summary prompt is {} chars", request.user.len());

        let summary = self.llm.complete(&request).await?;
        info!(
            "Generated summary of {} chars from {} articles via {}",
            summary.len(),
            articles.len(),
            self.llm.adapter_name()
        );
        Ok(summary)
    }

    pub fn build_prompt(&self, articles: &[Article], context: SummaryContext<'_>) -> String {
        let mut articles_text = String::new();
        for (i, article) in articles.iter().enumerate() {
            let date = article
                .published_at
                .map(|d| d.to_rfc2822())
                .unwrap_or_else(|| "Unknown date".to_string());
            let _ = write!(
                articles_text,
                "Article {}:\nTitle: {}\nSource: {}\nDate: {}\nSummary: {}\nURL: {}\n\n",
                i + 1,
                article.title,
                article.source,
                date,
                article.summary,
                article.url
            );
        }

        let mut prompt = String::from("Please provide a concise summary of the following financial news articles.\n\n");
        if !context.bypass {
            let _ = write!(
                prompt,
                "Focus on these stocks/tickers of interest: {}\nAnd these keywords/topics: {}\n\n",
                self.tickers.join(", "),
                self.keywords.join(", ")
            );
        }
        let _ = write!(prompt, "Here are the articles to summarize:\n\n{}", articles_text);

        if !context.prices.is_empty() {
            prompt.push_str("Current stock prices:\n");
            for quote in context.prices {
                let _ = writeln!(
                    prompt,
                    "- {}: ${:.2} ({:+.2}, {:+.2}%)",
                    quote.ticker, quote.price, quote.change, quote.percent_change
                );
            }
            prompt.push('\n');
        }

        if let Some(sentiment) = context.sentiment.filter(|s| !s.is_empty()) {
            prompt.push_str("Sentiment across today's articles:\n");
            for (ticker, counts) in sentiment {
                let _ = writeln!(
                    prompt,
                    "- {}: {} positive, {} negative, {} neutral",
                    ticker, counts.positive, counts.negative, counts.neutral
                );
            }
            prompt.push('\n');
        }

        prompt.push_str("Please create a well-structured summary that:\n");
        let mut asks = Vec::new();
        if !context.bypass {
            asks.push("Highlights the most important news for the specified tickers".to_string());
        }
        asks.push("Identifies key market trends and insights".to_string());
        asks.push("Organizes information by topic or relevance".to_string());
        asks.push(format!("Is concise and easy to read (around {} words)", self.summary_length));
        asks.push("Includes a brief market outlook based on the news".to_string());
        for (i, ask) in asks.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", i + 1, ask);
        }
        prompt
    }
}

/// "Stock News Summary - March 04, 2025", dated in `tz`.
pub fn digest_title(now: DateTime<Utc>, tz: Tz) -> String {
    format!("Stock News Summary - {}", now.with_timezone(&tz).format("%B %d, %Y"))
}

/// Plain headline list used when the summarizer is unavailable.
pub fn fallback_summary(articles: &[Article]) -> String {
    if articles.is_empty() {
        return NO_NEWS_SUMMARY.to_string();
    }
    let mut text = String::from("AI summary unavailable. Top headlines:\n\n");
    for article in articles.iter().take(FALLBACK_HEADLINES) {
        let _ = writeln!(text, "- {} ({}) {}", article.title, article.source, article.url);
    }
    text
}

impl Digest {
    pub fn new(title: String, summary: String, article_count: usize) -> Self {
        Self {
            title,
            summary,
            prices: Vec::new(),
            sentiment: None,
            generated_at: Utc::now(),
            article_count,
        }
    }

    pub fn with_prices(mut self, prices: Vec<PriceQuote>) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_sentiment(mut self, sentiment: Option<SentimentBreakdown>) -> Self {
        self.sentiment = sentiment;
        self
    }
}
