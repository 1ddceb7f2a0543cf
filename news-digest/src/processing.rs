use crate::types::{Article, DigestError, Result};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Points per occurrence, by where the match was found.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub title: f64,
    pub body: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { title: 3.0, body: 1.0 }
    }
}

/// An article that survived filtering, with the score it was ranked by.
#[derive(Debug, Clone)]
pub struct ScoredArticle {
    pub article: Article,
    pub score: f64,
}

struct Matcher {
    term: String,
    pattern: Regex,
}

impl Matcher {
    /// Tickers match whole words only.
    fn ticker(term: &str) -> Result<Self> {
        Self::build(term, format!(r"\b{}\b", regex::escape(term)))
    }

    /// Keywords match anywhere, so "earn" also hits "earnings".
    fn keyword(term: &str) -> Result<Self> {
        Self::build(term, regex::escape(term))
    }

    fn build(term: &str, pattern: String) -> Result<Self> {
        let pattern = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DigestError::Config(format!("Bad match term '{}': {}", term, e)))?;
        Ok(Self {
            term: term.to_string(),
            pattern,
        })
    }

    fn count(&self, text: &str) -> usize {
        self.pattern.find_iter(text).count()
    }
}

/// Filters and ranks articles against configured tickers and keywords.
pub struct NewsProcessor {
    tickers: Vec<Matcher>,
    keywords: Vec<Matcher>,
    allowed_sources: Vec<String>,
    weights: ScoreWeights,
}

impl NewsProcessor {
    pub fn new(tickers: &[String], keywords: &[String]) -> Result<Self> {
        let tickers = tickers
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Matcher::ticker(t.trim()))
            .collect::<Result<Vec<_>>>()?;
        let keywords = keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| Matcher::keyword(k.trim()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tickers,
            keywords,
            allowed_sources: Vec::new(),
            weights: ScoreWeights::default(),
        })
    }

    /// Restrict output to these source ids or display names. Empty allows all.
    pub fn with_allowed_sources(mut self, sources: &[String]) -> Self {
        self.allowed_sources = sources.iter().map(|s| s.to_lowercase()).collect();
        self
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    fn has_criteria(&self) -> bool {
        !self.tickers.is_empty() || !self.keywords.is_empty()
    }

    fn source_allowed(&self, article: &Article) -> bool {
        self.allowed_sources.is_empty()
            || self.allowed_sources.contains(&article.source_id.to_lowercase())
            || self.allowed_sources.contains(&article.source.to_lowercase())
    }

    /// Filter and rank. With `bypass` set the input comes back untouched.
    pub fn process(&self, articles: Vec<Article>, bypass: bool) -> Vec<Article> {
        if bypass {
            info!("Bypassing filtering, returning all {} articles", articles.len());
            return articles;
        }
        self.rank(articles).into_iter().map(|scored| scored.article).collect()
    }

    /// Score every article, keep those above zero and sort them.
    ///
    /// Order: score descending, then newer first, then fetch order.
    pub fn rank(&self, articles: Vec<Article>) -> Vec<ScoredArticle> {
        let total = articles.len();
        let candidates = articles.into_iter().filter(|a| self.source_allowed(a));

        let mut scored: Vec<ScoredArticle> = if self.has_criteria() {
            candidates
                .filter_map(|article| {
                    let score = self.score(&article);
                    if score > 0.0 {
                        let matched_tickers = self.matched_tickers(&article);
                        Some(ScoredArticle {
                            article: Article {
                                matched_tickers,
                                ..article
                            },
                            score,
                        })
                    } else {
                        None
                    }
                })
                .collect()
        } else {
            debug!("No filtering criteria specified, keeping all articles");
            candidates.map(|article| ScoredArticle { article, score: 0.0 }).collect()
        };

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.article.published_at.cmp(&a.article.published_at))
        });

        info!("Filtered {} articles down to {} relevant articles", total, scored.len());
        scored
    }

    pub fn score(&self, article: &Article) -> f64 {
        self.tickers
            .iter()
            .chain(self.keywords.iter())
            .map(|m| {
                m.count(&article.title) as f64 * self.weights.title
                    + m.count(&article.summary) as f64 * self.weights.body
            })
            .sum()
    }

    pub fn matched_tickers(&self, article: &Article) -> Vec<String> {
        let text = article.searchable_text();
        self.tickers
            .iter()
            .filter(|m| m.count(&text) > 0)
            .map(|m| m.term.clone())
            .collect()
    }
}
