use crate::config::Settings;
use crate::digest::{digest_title, fallback_summary, Summarizer, SummaryContext};
use crate::export::Exporter;
use crate::fetcher::Fetcher;
use crate::llm_adapter::{LlmAdapter, OpenAiCompatibleAdapter};
use crate::notify::Dispatcher;
use crate::prices::PriceLookup;
use crate::processing::NewsProcessor;
use crate::sentiment::{SentimentAnalyzer, SentimentMode};
use crate::types::{Digest, ExportFormat, Result, RunOutcome, RunReport, StageError};
use chrono::{Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Per-invocation switches that do not belong in the settings file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip ticker/keyword filtering and summarize everything fetched.
    pub bypass: bool,
    /// Overrides `export.format` from the settings.
    pub export_format: Option<ExportFormat>,
}

/// Registry → fetch → filter → sentiment/prices → summarize → export → deliver.
pub struct DigestPipeline {
    settings: Arc<Settings>,
    fetcher: Fetcher,
    processor: NewsProcessor,
    sentiment: Option<SentimentAnalyzer>,
    prices: Option<PriceLookup>,
    summarizer: Summarizer,
    exporter: Exporter,
    dispatcher: Dispatcher,
    tz: Tz,
}

impl DigestPipeline {
    /// Build every stage from settings, talking to the configured AI provider.
    pub fn from_settings(settings: Arc<Settings>) -> Result<Self> {
        let llm: Arc<dyn LlmAdapter> = Arc::new(OpenAiCompatibleAdapter::from_settings(&settings.ai)?);
        Self::with_llm(settings, llm)
    }

    /// Build every stage from settings around an existing completion adapter.
    pub fn with_llm(settings: Arc<Settings>, llm: Arc<dyn LlmAdapter>) -> Result<Self> {
        let tz = settings.schedule.tz()?;
        let fetcher = Fetcher::new(settings.fetch.clone())?;
        let processor =
            NewsProcessor::new(&settings.tickers, &settings.keywords)?.with_allowed_sources(&settings.allowed_sources);

        let sentiment = if settings.sentiment.enabled {
            let mode = if settings.sentiment.use_ai {
                SentimentMode::Ai(Arc::clone(&llm))
            } else {
                SentimentMode::Lexicon
            };
            Some(SentimentAnalyzer::new(mode, &settings.tickers)?)
        } else {
            None
        };

        let prices = if settings.stock_prices.enabled {
            match PriceLookup::from_settings(&settings.stock_prices) {
                Ok(lookup) => Some(lookup),
                Err(e) => {
                    warn!("Stock prices disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let summarizer = Summarizer::new(llm, &settings.ai, &settings.tickers, &settings.keywords);
        let exporter = Exporter::from_settings(&settings.export, tz);
        let dispatcher = Dispatcher::from_settings(&settings.delivery)?;

        Ok(Self {
            settings,
            fetcher,
            processor,
            sentiment,
            prices,
            summarizer,
            exporter,
            dispatcher,
            tz,
        })
    }

    /// Execute one complete run. Stage failures are collected in the report;
    /// nothing short of a panic aborts the run.
    pub async fn run_once(&self, options: RunOptions) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("digest_run", %run_id);
        self.run_stages(run_id, options).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid, options: RunOptions) -> RunReport {
        let settings = &self.settings;
        let mut stage_errors = Vec::new();
        info!("Starting digest run (bypass filtering: {})", options.bypass);

        let publishers = settings.publishers();
        let cutoff = (settings.lookback_hours > 0).then(|| Utc::now() - Duration::hours(settings.lookback_hours));
        let fetched = self.fetcher.fetch_all(&publishers, cutoff).await;
        if fetched.failed_sources > 0 {
            stage_errors.push(StageError {
                stage: "fetch",
                message: format!(
                    "{} of {} feeds failed",
                    fetched.failed_sources,
                    fetched.failed_sources + fetched.succeeded_sources
                ),
            });
        }
        let fetched_count = fetched.articles.len();

        let mut relevant = self.processor.process(fetched.articles, options.bypass);
        let relevant_count = relevant.len();
        if relevant.len() > settings.max_articles {
            info!("Summarizing the top {} of {} relevant articles", settings.max_articles, relevant.len());
            relevant.truncate(settings.max_articles);
        }

        let sentiment = match &self.sentiment {
            Some(analyzer) => {
                let (labelled, breakdown) = analyzer.analyze(relevant).await;
                relevant = labelled;
                Some(breakdown)
            }
            None => None,
        };

        let prices = match &self.prices {
            Some(lookup) if !settings.tickers.is_empty() => {
                let quotes = lookup.fetch_all(&settings.tickers).await;
                if quotes.len() < settings.tickers.len() {
                    stage_errors.push(StageError {
                        stage: "prices",
                        message: format!("{} of {} tickers had no quote", settings.tickers.len() - quotes.len(), settings.tickers.len()),
                    });
                }
                quotes
            }
            _ => Vec::new(),
        };

        let context = SummaryContext {
            prices: &prices,
            sentiment: sentiment.as_ref(),
            bypass: options.bypass,
        };
        let (summary, summary_failed) = match self.summarizer.summarize(&relevant, context).await {
            Ok(summary) => (summary, false),
            Err(e) => {
                error!("Summarization failed: {}", e);
                stage_errors.push(StageError {
                    stage: "summarize",
                    message: e.to_string(),
                });
                (fallback_summary(&relevant), true)
            }
        };

        let digest = Digest::new(digest_title(Utc::now(), self.tz), summary, relevant.len())
            .with_prices(prices)
            .with_sentiment(sentiment);

        let mut export_paths = Vec::new();
        if let Some(format) = options.export_format.or(settings.export.format) {
            match self.exporter.export(&digest, format).await {
                Ok(paths) => export_paths = paths,
                Err(e) => {
                    error!("Export failed: {}", e);
                    stage_errors.push(StageError {
                        stage: "export",
                        message: e.to_string(),
                    });
                }
            }
        }

        let deliveries = if self.dispatcher.is_empty() {
            warn!("No delivery channels enabled");
            Vec::new()
        } else {
            self.dispatcher.dispatch(&digest).await
        };
        for failed in deliveries.iter().filter(|d| !d.success) {
            stage_errors.push(StageError {
                stage: "deliver",
                message: format!("{}: {}", failed.channel, failed.error.as_deref().unwrap_or("unknown error")),
            });
        }

        let outcome = if summary_failed {
            RunOutcome::SummaryFailed
        } else if deliveries.is_empty() {
            RunOutcome::NoChannelsEnabled
        } else if deliveries.iter().any(|d| d.success) {
            RunOutcome::Delivered
        } else {
            RunOutcome::AllChannelsFailed
        };

        let report = RunReport {
            run_id,
            fetched: fetched_count,
            failed_sources: fetched.failed_sources,
            relevant: relevant_count,
            digest,
            export_paths,
            deliveries,
            stage_errors,
            outcome,
        };
        info!(
            "Run finished: {:?} (fetched {}, relevant {}, delivered {}/{}, {} stage errors)",
            report.outcome,
            report.fetched,
            report.relevant,
            report.delivered_count(),
            report.deliveries.len(),
            report.stage_errors.len()
        );
        report
    }
}
