use serde::{Deserialize, Serialize};
use tracing::warn;

/// One RSS/Atom endpoint belonging to a publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSpec {
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "General".to_string()
}

/// A news publisher and the feeds it exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publisher {
    pub id: String,
    pub name: String,
    pub feeds: Vec<FeedSpec>,
}

impl Publisher {
    pub fn new(id: &str, name: &str, feeds: &[(&str, &str)]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            feeds: feeds
                .iter()
                .map(|(url, category)| FeedSpec {
                    url: url.to_string(),
                    category: category.to_string(),
                })
                .collect(),
        }
    }

    /// Wall Street Journal markets, business and technology feeds
    pub fn wsj() -> Self {
        Self::new(
            "wsj",
            "Wall Street Journal",
            &[
                ("https://feeds.a.dj.com/rss/RSSMarketsMain.xml", "Markets"),
                ("https://feeds.a.dj.com/rss/WSJcomUSBusiness.xml", "Business"),
                ("https://feeds.a.dj.com/rss/RSSWSJD.xml", "Technology"),
            ],
        )
    }

    pub fn cnbc() -> Self {
        Self::new(
            "cnbc",
            "CNBC",
            &[
                ("https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=100003114", "Top News"),
                ("https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=10000664", "Finance"),
                ("https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=15839135", "Earnings"),
            ],
        )
    }

    pub fn marketwatch() -> Self {
        Self::new(
            "marketwatch",
            "MarketWatch",
            &[
                ("https://feeds.content.dowjones.io/public/rss/mw_topstories", "Top Stories"),
                ("https://feeds.content.dowjones.io/public/rss/mw_marketpulse", "Market Pulse"),
            ],
        )
    }

    pub fn yahoo_finance() -> Self {
        Self::new(
            "yahoo_finance",
            "Yahoo Finance",
            &[("https://finance.yahoo.com/news/rssindex", "General")],
        )
    }

    pub fn seeking_alpha() -> Self {
        Self::new(
            "seeking_alpha",
            "Seeking Alpha",
            &[("https://seekingalpha.com/market_currents.xml", "Market Currents")],
        )
    }

    pub fn investing() -> Self {
        Self::new(
            "investing",
            "Investing.com",
            &[("https://www.investing.com/rss/news_25.rss", "Stock Market")],
        )
    }

    pub fn nasdaq() -> Self {
        Self::new(
            "nasdaq",
            "Nasdaq",
            &[("https://www.nasdaq.com/feed/rssoutbound?category=Markets", "Markets")],
        )
    }
}

/// Static catalogue of the publishers the fetcher knows about.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    publishers: Vec<Publisher>,
}

impl SourceRegistry {
    pub fn builtin() -> Self {
        Self {
            publishers: vec![
                Publisher::wsj(),
                Publisher::cnbc(),
                Publisher::marketwatch(),
                Publisher::yahoo_finance(),
                Publisher::seeking_alpha(),
                Publisher::investing(),
                Publisher::nasdaq(),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&Publisher> {
        self.publishers.iter().find(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.publishers.iter().map(|p| p.id.as_str()).collect()
    }

    /// Publishers for the given ids, in the order requested. Unknown ids are skipped.
    pub fn select(&self, ids: &[String]) -> Vec<Publisher> {
        ids.iter()
            .filter_map(|id| match self.get(id) {
                Some(publisher) => Some(publisher.clone()),
                None => {
                    warn!("Source {} not found in registry", id);
                    None
                }
            })
            .collect()
    }
}
