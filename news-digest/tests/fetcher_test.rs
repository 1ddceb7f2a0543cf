mod common;

use chrono::{Duration, Utc};
use common::{init_tracing, rss_feed};
use httpmock::{Method::GET, MockServer};
use news_digest::sources::{Publisher, SourceRegistry};
use news_digest::utils::text::strip_html;
use news_digest::{DigestError, FeedParser, FetchConfig, Fetcher, Result};

fn publisher(id: &str, urls: &[String]) -> Publisher {
    let feeds: Vec<(&str, &str)> = urls.iter().map(|u| (u.as_str(), "Markets")).collect();
    Publisher::new(id, &id.to_uppercase(), &feeds)
}

#[tokio::test]
async fn test_fetch_all_merges_sorts_and_dedupes() -> Result<()> {
    init_tracing();
    let server = MockServer::start();

    let first = server.mock(|when, then| {
        when.method(GET).path("/a.xml");
        then.status(200).header("content-type", "application/rss+xml").body(rss_feed(&[
            ("Older story", "&lt;p&gt;Body &amp;amp; more&lt;/p&gt;", "https://news.example.com/older", 5),
            ("Shared story", "Seen twice", "https://news.example.com/shared", 2),
        ]));
    });
    let second = server.mock(|when, then| {
        when.method(GET).path("/b.xml");
        then.status(200).body(rss_feed(&[
            ("Newest story", "Fresh", "https://news.example.com/newest", 1),
            ("Shared story again", "Seen twice", "https://news.example.com/shared", 2),
        ]));
    });

    let fetcher = Fetcher::new(FetchConfig::default())?;
    let publishers = vec![
        publisher("alpha", &[server.url("/a.xml")]),
        publisher("beta", &[server.url("/b.xml")]),
    ];
    let report = fetcher.fetch_all(&publishers, None).await;

    first.assert();
    second.assert();
    assert_eq!(report.succeeded_sources, 2);
    assert_eq!(report.failed_sources, 0);

    let titles: Vec<&str> = report.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Newest story", "Shared story", "Older story"]);
    assert_eq!(report.articles[2].summary, "Body & more");
    assert_eq!(report.articles[2].source_id, "alpha");
    assert_eq!(report.articles[2].category, "Markets");
    Ok(())
}

#[tokio::test]
async fn test_failing_feed_is_isolated() -> Result<()> {
    init_tracing();
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/ok.xml");
        then.status(200).body(rss_feed(&[("Healthy", "fine", "https://news.example.com/healthy", 1)]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/down.xml");
        then.status(503).body("unavailable");
    });
    server.mock(|when, then| {
        when.method(GET).path("/garbage.xml");
        then.status(200).body("this is not a feed");
    });

    let fetcher = Fetcher::new(FetchConfig::default())?;
    let publishers = vec![publisher(
        "mixed",
        &[server.url("/down.xml"), server.url("/ok.xml"), server.url("/garbage.xml")],
    )];
    let report = fetcher.fetch_all(&publishers, None).await;

    assert_eq!(report.succeeded_sources, 1);
    assert_eq!(report.failed_sources, 2);
    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].title, "Healthy");
    Ok(())
}

#[tokio::test]
async fn test_retries_stop_at_configured_limit() -> Result<()> {
    init_tracing();
    let server = MockServer::start();
    let failing = server.mock(|when, then| {
        when.method(GET).path("/flaky.xml");
        then.status(500);
    });

    let fetcher = Fetcher::new(FetchConfig {
        max_retries: 2,
        retry_delay_seconds: 0,
        ..FetchConfig::default()
    })?;
    let result = fetcher.fetch_feed(&server.url("/flaky.xml")).await;

    assert!(result.is_err());
    failing.assert_hits(3);
    Ok(())
}

#[tokio::test]
async fn test_lookback_cutoff_drops_stale_items() -> Result<()> {
    init_tracing();
    let body = rss_feed(&[
        ("Fresh", "today", "https://news.example.com/fresh", 2),
        ("Stale", "last week", "https://news.example.com/stale", 24 * 7),
    ]);
    let publisher = publisher("local", &["https://news.example.com/feed.xml".to_string()]);

    let mut parser = FeedParser::new().with_cutoff(Utc::now() - Duration::hours(24));
    let articles = parser.parse_feed(body.as_bytes(), &publisher, &publisher.feeds[0])?;

    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Fresh");
    Ok(())
}

#[test]
fn test_registry_selection_skips_unknown_ids() {
    let registry = SourceRegistry::builtin();
    let selected = registry.select(&["cnbc".to_string(), "nope".to_string(), "wsj".to_string()]);

    let ids: Vec<&str> = selected.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["cnbc", "wsj"]);
    assert!(selected.iter().all(|p| !p.feeds.is_empty()));
    assert_eq!(registry.ids().len(), 7);
}

#[tokio::test]
async fn test_feed_just_over_size_limit_is_rejected() -> Result<()> {
    init_tracing();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/huge.xml");
        then.status(200).body("x".repeat(1024 * 1024 + 512));
    });
    server.mock(|when, then| {
        when.method(GET).path("/small.xml");
        then.status(200).body("x".repeat(1024 * 1024));
    });

    let fetcher = Fetcher::new(FetchConfig {
        max_feed_size_mb: 1,
        ..FetchConfig::default()
    })?;

    let err = fetcher.fetch_feed(&server.url("/huge.xml")).await.unwrap_err();
    assert!(matches!(err, DigestError::Provider(ref msg) if msg.contains("too large")));
    assert_eq!(fetcher.fetch_feed(&server.url("/small.xml")).await?.len(), 1024 * 1024);
    Ok(())
}

#[test]
fn test_strip_html_decodes_entities_once() {
    assert_eq!(strip_html("Use &amp;lt;b&amp;gt; for bold"), "Use &lt;b&gt; for bold");
    assert_eq!(strip_html("<p>Profit &amp; loss &lt;3</p>"), "Profit & loss <3");
}
