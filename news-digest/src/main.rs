use anyhow::{Context, Result};
use clap::Parser;
use news_digest::{DailySchedule, DigestPipeline, ExportFormat, RunOptions, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_ERROR_EXIT: i32 = 4;

/// Fetch financial news, summarize it and deliver the digest.
#[derive(Debug, Parser)]
#[command(name = "news-digest", version, about)]
struct Cli {
    /// Path to the JSON settings file
    #[arg(long, default_value = "config/config.json")]
    config: PathBuf,

    /// Run once now instead of waiting for the daily schedule
    #[arg(long)]
    instant: bool,

    /// Summarize every fetched article, ignoring tickers and keywords
    #[arg(long)]
    all_articles: bool,

    /// Also write the digest to the export directory
    #[arg(long, value_enum)]
    export: Option<ExportFormat>,

    /// Debug logging for this crate
    #[arg(long, short)]
    verbose: bool,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let directive = if verbose { "news_digest=debug" } else { "news_digest=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();
    Ok(())
}

fn load_settings(path: &PathBuf) -> Result<Arc<Settings>> {
    let settings = Settings::load(path)?;
    settings.validate()?;
    Ok(Arc::new(settings))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let settings = match load_settings(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(CONFIG_ERROR_EXIT);
        }
    };

    let pipeline = match DigestPipeline::from_settings(Arc::clone(&settings)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Cannot set up pipeline: {}", e);
            std::process::exit(CONFIG_ERROR_EXIT);
        }
    };

    let options = RunOptions {
        bypass: cli.all_articles,
        export_format: cli.export,
    };

    if cli.instant {
        info!("Running digest now");
        let report = pipeline.run_once(options).await;
        for stage_error in &report.stage_errors {
            error!("[{}] {}", stage_error.stage, stage_error.message);
        }
        std::process::exit(report.outcome.exit_code());
    }

    let schedule = DailySchedule::from_settings(&settings.schedule).context("invalid schedule")?;
    info!(
        "Scheduled mode: daily at {} {}",
        settings.schedule.time, settings.schedule.timezone
    );
    let pipeline = &pipeline;
    schedule
        .run_forever(|| async move {
            let report = pipeline.run_once(options).await;
            if report.outcome.exit_code() != 0 {
                error!("Scheduled run {} ended with {:?}", report.run_id, report.outcome);
            }
        })
        .await;

    info!("Scheduler stopped");
    Ok(())
}
