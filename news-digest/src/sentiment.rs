use crate::llm_adapter::{CompletionRequest, LlmAdapter};
use crate::types::{Article, DigestError, Result, Sentiment, SentimentBreakdown, SentimentLabel, TickerSentiment};
use futures::stream::{self, StreamExt};
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::{debug, info, warn};

const POSITIVE_WORDS: &[&str] = &[
    "up", "rise", "gain", "growth", "profit", "positive", "bullish", "outperform", "beat", "exceed", "strong",
    "success", "opportunity", "improve", "advantage",
];

const NEGATIVE_WORDS: &[&str] = &[
    "down", "fall", "drop", "decline", "loss", "negative", "bearish", "underperform", "miss", "weak", "fail",
    "risk", "concern", "problem", "challenge",
];

const SYSTEM_PROMPT: &str =
    "You are a financial sentiment analyzer that classifies text as positive, negative, or neutral.";

/// Concurrent classification requests in AI mode.
const AI_CONCURRENCY: usize = 4;

/// Fixed word-list classifier.
pub struct Lexicon {
    positive: Vec<Regex>,
    negative: Vec<Regex>,
}

impl Lexicon {
    pub fn new() -> Result<Self> {
        Ok(Self {
            positive: word_patterns(POSITIVE_WORDS)?,
            negative: word_patterns(NEGATIVE_WORDS)?,
        })
    }

    /// Each listed word counts once, however often it appears.
    pub fn classify(&self, text: &str) -> Sentiment {
        let positive = self.positive.iter().filter(|p| p.is_match(text)).count() as f64;
        let negative = self.negative.iter().filter(|p| p.is_match(text)).count() as f64;
        if positive + negative == 0.0 {
            return Sentiment::neutral();
        }

        let score = (positive - negative) / (positive + negative);
        let label = if score > 0.0 {
            SentimentLabel::Positive
        } else if score < 0.0 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };
        Sentiment { label, score }
    }
}

fn word_patterns(words: &[&str]) -> Result<Vec<Regex>> {
    words.iter().map(|w| word_pattern(w)).collect()
}

fn word_pattern(word: &str) -> Result<Regex> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(word)))
        .case_insensitive(true)
        .build()
        .map_err(|e| DigestError::Config(format!("Bad pattern for '{}': {}", word, e)))
}

pub enum SentimentMode {
    Lexicon,
    Ai(Arc<dyn LlmAdapter>),
}

/// Labels articles and aggregates the labels per configured ticker.
pub struct SentimentAnalyzer {
    mode: SentimentMode,
    lexicon: Lexicon,
    tickers: Vec<(String, Regex)>,
}

impl SentimentAnalyzer {
    pub fn new(mode: SentimentMode, tickers: &[String]) -> Result<Self> {
        let tickers = tickers
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Ok((t.trim().to_string(), word_pattern(t.trim())?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            mode,
            lexicon: Lexicon::new()?,
            tickers,
        })
    }

    /// Label every article and build the per-ticker breakdown.
    ///
    /// Never fails: a provider error leaves that article neutral.
    pub async fn analyze(&self, articles: Vec<Article>) -> (Vec<Article>, SentimentBreakdown) {
        let labelled: Vec<Article> = match &self.mode {
            SentimentMode::Lexicon => articles
                .into_iter()
                .map(|article| {
                    let sentiment = self.lexicon.classify(&article.searchable_text());
                    article.with_sentiment(sentiment)
                })
                .collect(),
            SentimentMode::Ai(llm) => {
                stream::iter(articles)
                    .map(|article| {
                        let llm = Arc::clone(llm);
                        async move {
                            let sentiment = classify_with_ai(llm.as_ref(), &article.searchable_text()).await;
                            article.with_sentiment(sentiment)
                        }
                    })
                    .buffered(AI_CONCURRENCY)
                    .collect::<Vec<_>>()
                    .await
            }
        };

        let breakdown = self.breakdown(&labelled);
        info!(
            "Sentiment assigned to {} articles across {} tickers",
            labelled.len(),
            breakdown.len()
        );
        (labelled, breakdown)
    }

    /// Counts for every configured ticker, including ones no article mentions.
    pub fn breakdown(&self, articles: &[Article]) -> SentimentBreakdown {
        let mut breakdown: SentimentBreakdown = self
            .tickers
            .iter()
            .map(|(ticker, _)| (ticker.clone(), TickerSentiment::default()))
            .collect();

        for article in articles {
            let label = article.sentiment.map(|s| s.label).unwrap_or(SentimentLabel::Neutral);
            let text = article.searchable_text();
            for (ticker, pattern) in &self.tickers {
                if pattern.is_match(&text) {
                    if let Some(entry) = breakdown.get_mut(ticker) {
                        entry.record(label, &article.title);
                    }
                }
            }
        }
        breakdown
    }
}

async fn classify_with_ai(llm: &dyn LlmAdapter, text: &str) -> Sentiment {
    let request = CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Analyze the sentiment of the following financial news text regarding stock market or company performance.\n\
             Classify it as 'positive', 'negative', or 'neutral'.\n\n\
             Text: {}\n\n\
             Sentiment:",
            text
        ),
        max_tokens: 10,
        temperature: 0.1,
    };

    match llm.complete(&request).await {
        Ok(reply) => {
            let reply = reply.to_lowercase();
            debug!("Sentiment reply: {}", reply);
            if reply.contains("positive") {
                Sentiment {
                    label: SentimentLabel::Positive,
                    score: 1.0,
                }
            } else if reply.contains("negative") {
                Sentiment {
                    label: SentimentLabel::Negative,
                    score: -1.0,
                }
            } else {
                Sentiment::neutral()
            }
        }
        Err(e) => {
            warn!("Sentiment provider failed, marking article neutral: {}", e);
            Sentiment::neutral()
        }
    }
}
