mod common;

use chrono::{TimeZone, Utc};
use common::init_tracing;
use news_digest::export::{parse_markdown, render_markdown, Exporter};
use news_digest::{Digest, ExportFormat, PriceQuote, Result, SentimentBreakdown, SentimentLabel, TickerSentiment};

fn quote(ticker: &str, price: f64, change: f64, percent_change: f64) -> PriceQuote {
    PriceQuote {
        ticker: ticker.to_string(),
        price,
        change,
        percent_change,
        volume: None,
        trading_day: None,
    }
}

fn sample_digest(summary: &str) -> Digest {
    let mut sentiment = SentimentBreakdown::new();
    let mut aapl = TickerSentiment::default();
    aapl.record(SentimentLabel::Positive, "AAPL rallies");
    aapl.record(SentimentLabel::Negative, "AAPL supplier warns");
    sentiment.insert("AAPL".to_string(), aapl);
    sentiment.insert("IBM".to_string(), TickerSentiment::default());

    let mut digest = Digest::new("Stock News Summary - October 15, 2026".to_string(), summary.to_string(), 3)
        .with_prices(vec![quote("AAPL", 187.5, 1.25, 0.67), quote("TSLA", 251.3, -4.1, -1.6)])
        .with_sentiment(Some(sentiment));
    digest.generated_at = Utc.with_ymd_and_hms(2026, 10, 15, 15, 0, 0).unwrap();
    digest
}

#[tokio::test]
async fn test_markdown_layout() -> Result<()> {
    init_tracing();
    let md = render_markdown(&sample_digest("Markets were mixed."));

    assert!(md.starts_with("# Stock News Summary - October 15, 2026\n\n"));
    assert!(md.contains("| Ticker | Price | Change | % Change | Volume | Trading Day |"));
    assert!(md.contains("| AAPL | $187.5 | +1.25 | +0.67% | - | - |"));
    assert!(md.contains("| TSLA | $251.3 | -4.1 | -1.6% | - | - |"));
    assert!(md.contains("### AAPL\n\n- Positive mentions: 1\n- Negative mentions: 1\n- Neutral mentions: 0"));
    assert!(!md.contains("### IBM"));
    assert!(md.ends_with("## Summary\n\nMarkets were mixed."));
    Ok(())
}

#[tokio::test]
async fn test_export_then_reread_recovers_summary_and_prices() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let summary = "## Tech\n\nApple led gains.\n\n## Energy\n\nOil slipped.\n";
    let digest = sample_digest(summary);

    let exporter = Exporter::new(dir.path(), chrono_tz::America::New_York);
    let paths = exporter.export(&digest, ExportFormat::Markdown).await?;
    assert_eq!(paths, vec![dir.path().join("stock_summary_2026-10-15.md")]);

    let parsed = parse_markdown(&std::fs::read_to_string(&paths[0])?)?;
    assert_eq!(parsed.title, digest.title);
    assert_eq!(parsed.summary, summary);
    assert_eq!(parsed.prices, digest.prices);
    Ok(())
}

#[test]
fn test_reread_keeps_full_precision_quotes() -> Result<()> {
    // Finnhub-style quote: percent change derived from c and pc
    let (current, previous_close) = (187.37, 185.12);
    let change = current - previous_close;
    let finnhub = PriceQuote {
        ticker: "AAPL".to_string(),
        price: current,
        change,
        percent_change: change / previous_close * 100.0,
        volume: Some(5_000_000),
        trading_day: Some("2026-10-15".to_string()),
    };
    let digest = Digest::new("Stock News Summary - October 15, 2026".to_string(), "Apple edged up.".to_string(), 1)
        .with_prices(vec![finnhub, quote("TSLA", 251.3, -4.1, -1.6)]);

    let parsed = parse_markdown(&render_markdown(&digest))?;
    assert_eq!(parsed.prices, digest.prices);
    assert_eq!(parsed.prices[0].volume, Some(5_000_000));
    assert_eq!(parsed.prices[1].trading_day, None);
    Ok(())
}

#[tokio::test]
async fn test_same_date_export_overwrites() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exporter = Exporter::new(dir.path().join("nested"), chrono_tz::UTC);

    exporter.write_markdown(&sample_digest("first version, which is longer")).await?;
    let path = exporter.write_markdown(&sample_digest("second")).await?;

    let parsed = parse_markdown(&std::fs::read_to_string(&path)?)?;
    assert_eq!(parsed.summary, "second");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))?.collect();
    assert_eq!(leftovers.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_pdf_converter_failure_is_export_error() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exporter =
        Exporter::new(dir.path(), chrono_tz::UTC).with_pdf_converter("definitely-not-a-real-converter-binary");

    let err = exporter.export(&sample_digest("text"), ExportFormat::Pdf).await.unwrap_err();
    assert!(matches!(err, news_digest::DigestError::Export(_)));
    // The Markdown source is still written.
    assert!(dir.path().join("stock_summary_2026-10-15.md").exists());
    Ok(())
}

#[test]
fn test_parse_rejects_documents_without_summary() {
    assert!(parse_markdown("# Title\n\nno summary heading here").is_err());
    assert!(parse_markdown("no title").is_err());
}
