#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use news_digest::Article;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

pub fn article(title: &str, summary: &str, published_at: Option<DateTime<Utc>>) -> Article {
    Article {
        title: title.to_string(),
        source: "Test Wire".to_string(),
        source_id: "test_wire".to_string(),
        category: "Markets".to_string(),
        published_at,
        summary: summary.to_string(),
        url: format!("https://news.example.com/{}", title.to_lowercase().replace(' ', "-")),
        matched_tickers: Vec::new(),
        sentiment: None,
    }
}

pub fn hours_ago(hours: i64) -> Option<DateTime<Utc>> {
    Some(Utc::now() - Duration::hours(hours))
}

/// RSS 2.0 document with one `<item>` per (title, description, link, hours-ago).
pub fn rss_feed(items: &[(&str, &str, &str, i64)]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\"><channel>\
         <title>Test Feed</title><link>https://news.example.com</link><description>fixture</description>\n",
    );
    for (title, description, link, age) in items {
        let published = (Utc::now() - Duration::hours(*age)).to_rfc2822();
        xml.push_str(&format!(
            "<item><title>{}</title><description>{}</description><link>{}</link><pubDate>{}</pubDate></item>\n",
            title, description, link, published
        ));
    }
    xml.push_str("</channel></rss>");
    xml
}
