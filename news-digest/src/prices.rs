use crate::config::PriceSettings;
use crate::traits::QuoteProvider;
use crate::types::{DigestError, PriceQuote, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co";
const FINNHUB_URL: &str = "https://finnhub.io/api/v1";

fn http_client() -> Result<Client> {
    Ok(Client::builder().timeout(Duration::from_secs(15)).build()?)
}

/// Map auth failures and other non-success statuses before parsing a body.
async fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    match status {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(DigestError::Auth(format!("{} rejected the API key ({})", provider, status)))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(DigestError::Provider(format!("{} returned {}: {}", provider, status, body)))
        }
    }
}

fn parse_number(provider: &str, field: &str, raw: Option<&String>) -> Result<f64> {
    raw.map(|v| v.trim().trim_end_matches('%'))
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| DigestError::Provider(format!("{} quote is missing '{}'", provider, field)))
}

/// Alpha Vantage `GLOBAL_QUOTE`.
pub struct AlphaVantage {
    http: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantage {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.unwrap_or(ALPHA_VANTAGE_URL).trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantage {
    fn provider_name(&self) -> &'static str {
        "alphavantage"
    }

    async fn quote(&self, ticker: &str) -> Result<PriceQuote> {
        let response = self
            .http
            .get(format!("{}/query", self.base_url))
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", ticker), ("apikey", self.api_key.as_str())])
            .send()
            .await?;
        let body: serde_json::Value = check_status("Alpha Vantage", response).await?.json().await?;

        // Throttled and invalid-key responses still come back as 200.
        for key in ["Note", "Information"] {
            if let Some(note) = body.get(key).and_then(|v| v.as_str()) {
                return Err(DigestError::Provider(format!("Alpha Vantage: {}", note)));
            }
        }
        if let Some(message) = body.get("Error Message").and_then(|v| v.as_str()) {
            return Err(DigestError::Provider(format!("Alpha Vantage: {}", message)));
        }

        let quote: HashMap<String, String> = body
            .get("Global Quote")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        if quote.is_empty() {
            return Err(DigestError::Provider(format!("No price data returned for {}", ticker)));
        }

        Ok(PriceQuote {
            ticker: ticker.to_string(),
            price: parse_number("Alpha Vantage", "05. price", quote.get("05. price"))?,
            change: parse_number("Alpha Vantage", "09. change", quote.get("09. change"))?,
            percent_change: parse_number("Alpha Vantage", "10. change percent", quote.get("10. change percent"))?,
            volume: quote.get("06. volume").and_then(|v| v.parse().ok()),
            trading_day: quote.get("07. latest trading day").cloned(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    /// current price
    c: f64,
    /// previous close
    pc: f64,
    #[serde(default)]
    v: Option<f64>,
}

/// Finnhub `/quote`.
pub struct Finnhub {
    http: Client,
    base_url: String,
    api_key: String,
}

impl Finnhub {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.unwrap_or(FINNHUB_URL).trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for Finnhub {
    fn provider_name(&self) -> &'static str {
        "finnhub"
    }

    async fn quote(&self, ticker: &str) -> Result<PriceQuote> {
        let response = self
            .http
            .get(format!("{}/quote", self.base_url))
            .query(&[("symbol", ticker), ("token", self.api_key.as_str())])
            .send()
            .await?;
        let quote: FinnhubQuote = check_status("Finnhub", response)
            .await?
            .json()
            .await
            .map_err(|e| DigestError::Provider(format!("Malformed Finnhub quote for {}: {}", ticker, e)))?;

        // Unknown symbols come back as all zeroes.
        if quote.c == 0.0 && quote.pc == 0.0 {
            return Err(DigestError::Provider(format!("No price data returned for {}", ticker)));
        }

        let change = quote.c - quote.pc;
        let percent_change = if quote.pc != 0.0 { change / quote.pc * 100.0 } else { 0.0 };
        Ok(PriceQuote {
            ticker: ticker.to_string(),
            price: quote.c,
            change,
            percent_change,
            volume: quote.v.map(|v| v as u64),
            trading_day: Some(Utc::now().format("%Y-%m-%d").to_string()),
        })
    }
}

/// Quotes every configured ticker through one provider.
pub struct PriceLookup {
    provider: Box<dyn QuoteProvider>,
}

impl PriceLookup {
    pub fn new(provider: Box<dyn QuoteProvider>) -> Self {
        Self { provider }
    }

    pub fn from_settings(settings: &PriceSettings) -> Result<Self> {
        if settings.api_key.is_empty() {
            return Err(DigestError::Config("No API key configured for stock prices".to_string()));
        }
        let base_url = settings.base_url.as_deref();
        let provider: Box<dyn QuoteProvider> = match settings.provider.as_str() {
            "alphavantage" => Box::new(AlphaVantage::new(&settings.api_key, base_url)?),
            "finnhub" => Box::new(Finnhub::new(&settings.api_key, base_url)?),
            other => {
                return Err(DigestError::Config(format!("Unsupported stock price provider: {}", other)));
            }
        };
        Ok(Self::new(provider))
    }

    /// Quotes in ticker order. Tickers that fail are logged and left out.
    pub async fn fetch_all(&self, tickers: &[String]) -> Vec<PriceQuote> {
        let results = join_all(tickers.iter().map(|t| self.provider.quote(t))).await;

        let quotes: Vec<PriceQuote> = tickers
            .iter()
            .zip(results)
            .filter_map(|(ticker, result)| match result {
                Ok(quote) => {
                    debug!("{}: {:.2} ({:+.2}%)", ticker, quote.price, quote.percent_change);
                    Some(quote)
                }
                Err(e) => {
                    warn!("Error fetching price for {} from {}: {}", ticker, self.provider.provider_name(), e);
                    None
                }
            })
            .collect();

        info!("Fetched prices for {} of {} tickers", quotes.len(), tickers.len());
        quotes
    }
}
