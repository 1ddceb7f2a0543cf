mod common;

use common::{init_tracing, rss_feed};
use httpmock::{Method::GET, Method::POST, Mock, MockServer};
use news_digest::config::Settings;
use news_digest::digest::NO_NEWS_SUMMARY;
use news_digest::llm_adapter::{LlmAdapter, MockLlmAdapter};
use news_digest::sources::Publisher;
use news_digest::{DigestError, DigestPipeline, ExportFormat, Result, RunOptions, RunOutcome};
use std::sync::Arc;

fn settings_for(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.news_sources = Vec::new();
    settings.custom_sources = vec![Publisher::new(
        "wire",
        "Test Wire",
        &[(server.url("/feed.xml").as_str(), "Markets")],
    )];
    settings.tickers = vec!["AAPL".to_string()];
    settings.keywords = vec!["earnings".to_string()];
    settings.stock_prices.enabled = true;
    settings.stock_prices.api_key = "demo".to_string();
    settings.stock_prices.base_url = Some(server.base_url());
    settings.delivery.ntfy.enabled = true;
    settings.delivery.ntfy.server = server.base_url();
    settings.delivery.ntfy.topic = "digest".to_string();
    settings
}

fn serve_feed(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/feed.xml");
        then.status(200).header("content-type", "application/rss+xml").body(rss_feed(&[
            ("Oil slides on supply worries", "Crude fell 2%.", "https://news.example.com/oil", 1),
            ("AAPL unveils new chips", "The company showed its latest silicon.", "https://news.example.com/aapl", 2),
            ("Banks rally into the close", "Financials led the market.", "https://news.example.com/banks", 3),
        ]));
    })
}

fn serve_quote(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/query").query_param("symbol", "AAPL");
        then.status(200).body(
            r#"{"Global Quote": {"05. price": "187.5000", "09. change": "1.2500", "10. change percent": "0.6700%"}}"#,
        );
    })
}

fn serve_ntfy(server: &MockServer, status: u16) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/digest");
        then.status(status);
    })
}

fn pipeline(settings: Settings, mock: &Arc<MockLlmAdapter>) -> Result<DigestPipeline> {
    let llm: Arc<dyn LlmAdapter> = mock.clone();
    DigestPipeline::with_llm(Arc::new(settings), llm)
}

#[tokio::test]
async fn test_end_to_end_single_ticker_article() -> Result<()> {
    init_tracing();
    let server = MockServer::start();
    let feed = serve_feed(&server);
    let quote = serve_quote(&server);
    let ntfy = serve_ntfy(&server, 200);

    let dir = tempfile::tempdir()?;
    let mut settings = settings_for(&server);
    settings.export.directory = dir.path().to_path_buf();

    let mock = Arc::new(MockLlmAdapter::new("e2e").with_reply("Apple unveiled new chips."));
    let report = pipeline(settings, &mock)?
        .run_once(RunOptions {
            bypass: false,
            export_format: Some(ExportFormat::Markdown),
        })
        .await;

    feed.assert();
    quote.assert();
    ntfy.assert();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.relevant, 1);
    assert_eq!(report.outcome, RunOutcome::Delivered);
    assert_eq!(report.outcome.exit_code(), 0);
    assert!(report.stage_errors.is_empty(), "unexpected errors: {:?}", report.stage_errors);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].user.contains("AAPL unveils new chips"));
    assert!(!requests[0].user.contains("Oil slides"));
    assert!(!requests[0].user.contains("Banks rally"));

    assert_eq!(report.digest.summary, "Apple unveiled new chips.");
    assert_eq!(report.digest.prices.len(), 1);
    assert_eq!(report.digest.prices[0].ticker, "AAPL");
    assert_eq!(report.digest.prices[0].price, 187.5);

    assert_eq!(report.export_paths.len(), 1);
    let exported = std::fs::read_to_string(&report.export_paths[0])?;
    assert!(exported.contains("| AAPL | $187.5 | +1.25 | +0.67% |"));
    Ok(())
}

#[tokio::test]
async fn test_bypass_summarizes_every_article() -> Result<()> {
    init_tracing();
    let server = MockServer::start();
    serve_feed(&server);
    serve_quote(&server);
    serve_ntfy(&server, 200);

    let mock = Arc::new(MockLlmAdapter::new("bypass"));
    let report = pipeline(settings_for(&server), &mock)?
        .run_once(RunOptions {
            bypass: true,
            export_format: None,
        })
        .await;

    assert_eq!(report.relevant, 3);
    let prompt = &mock.requests()[0].user;
    assert!(prompt.contains("Oil slides") && prompt.contains("Banks rally"));
    assert!(!prompt.contains("Focus on these stocks"));
    assert!(report.export_paths.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_sources_yield_no_news_digest() -> Result<()> {
    init_tracing();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/feed.xml");
        then.status(503);
    });
    serve_quote(&server);
    let ntfy = serve_ntfy(&server, 200);

    let mock = Arc::new(MockLlmAdapter::new("empty"));
    let report = pipeline(settings_for(&server), &mock)?.run_once(RunOptions::default()).await;

    assert_eq!(report.fetched, 0);
    assert_eq!(report.failed_sources, 1);
    assert_eq!(report.digest.summary, NO_NEWS_SUMMARY);
    assert_eq!(mock.call_count(), 0);
    assert_eq!(report.outcome, RunOutcome::Delivered);
    assert!(report.stage_errors.iter().any(|e| e.stage == "fetch"));
    ntfy.assert();
    Ok(())
}

#[tokio::test]
async fn test_all_channels_failing_sets_exit_code_two() -> Result<()> {
    init_tracing();
    let server = MockServer::start();
    serve_feed(&server);
    serve_quote(&server);
    serve_ntfy(&server, 500);

    let mock = Arc::new(MockLlmAdapter::new("fail"));
    let report = pipeline(settings_for(&server), &mock)?.run_once(RunOptions::default()).await;

    assert_eq!(report.outcome, RunOutcome::AllChannelsFailed);
    assert_eq!(report.outcome.exit_code(), 2);
    assert_eq!(report.delivered_count(), 0);
    assert!(report.stage_errors.iter().any(|e| e.stage == "deliver"));
    Ok(())
}

#[tokio::test]
async fn test_summary_failure_still_delivers_fallback() -> Result<()> {
    init_tracing();
    let server = MockServer::start();
    serve_feed(&server);
    serve_quote(&server);
    let ntfy = serve_ntfy(&server, 200);

    let mock = Arc::new(MockLlmAdapter::new("down").with_failure(DigestError::Provider("rate limited".to_string())));
    let report = pipeline(settings_for(&server), &mock)?.run_once(RunOptions::default()).await;

    assert_eq!(report.outcome, RunOutcome::SummaryFailed);
    assert_eq!(report.outcome.exit_code(), 1);
    assert!(report.digest.summary.contains("AAPL unveils new chips"));
    assert!(report.stage_errors.iter().any(|e| e.stage == "summarize"));
    ntfy.assert();
    Ok(())
}

#[tokio::test]
async fn test_no_enabled_channels() -> Result<()> {
    init_tracing();
    let server = MockServer::start();
    serve_feed(&server);
    serve_quote(&server);

    let mut settings = settings_for(&server);
    settings.delivery.ntfy.enabled = false;
    settings.stock_prices.enabled = false;
    settings.sentiment.enabled = true;

    let mock = Arc::new(MockLlmAdapter::new("quiet"));
    let report = pipeline(settings, &mock)?.run_once(RunOptions::default()).await;

    assert_eq!(report.outcome, RunOutcome::NoChannelsEnabled);
    assert_eq!(report.outcome.exit_code(), 3);
    assert!(report.deliveries.is_empty());
    assert!(report.digest.prices.is_empty());
    let sentiment = report.digest.sentiment.as_ref().map(|s| s["AAPL"].total());
    assert_eq!(sentiment, Some(1));
    Ok(())
}
