use crate::sources::{FeedSpec, Publisher, SourceRegistry};
use crate::types::{DigestError, ExportFormat, FetchConfig, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

pub const ENV_AI_API_KEY: &str = "NEWS_DIGEST_AI_API_KEY";
pub const ENV_STOCK_API_KEY: &str = "NEWS_DIGEST_STOCK_API_KEY";
pub const ENV_SMTP_PASSWORD: &str = "NEWS_DIGEST_SMTP_PASSWORD";

/// Read-only settings for one process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub news_sources: Vec<String>,
    pub custom_sources: Vec<Publisher>,
    pub tickers: Vec<String>,
    pub keywords: Vec<String>,
    /// Source ids or display names; empty allows every source.
    pub allowed_sources: Vec<String>,
    pub lookback_hours: i64,
    pub max_articles: usize,
    pub fetch: FetchConfig,
    pub ai: AiSettings,
    pub sentiment: SentimentSettings,
    pub stock_prices: PriceSettings,
    pub schedule: ScheduleSettings,
    pub export: ExportSettings,
    pub delivery: DeliverySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            news_sources: vec!["cnbc".to_string(), "marketwatch".to_string(), "yahoo_finance".to_string()],
            custom_sources: Vec::new(),
            tickers: Vec::new(),
            keywords: Vec::new(),
            allowed_sources: Vec::new(),
            lookback_hours: 24,
            max_articles: 20,
            fetch: FetchConfig::default(),
            ai: AiSettings::default(),
            sentiment: SentimentSettings::default(),
            stock_prices: PriceSettings::default(),
            schedule: ScheduleSettings::default(),
            export: ExportSettings::default(),
            delivery: DeliverySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Word-count range handed to the model, e.g. "300-1000".
    pub summary_length: String,
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            api_key: String::new(),
            model: "llama3-8b-8192".to_string(),
            max_tokens: 8192,
            temperature: 0.3,
            summary_length: "300-1000".to_string(),
            base_url: None,
            timeout_seconds: 120,
        }
    }
}

impl AiSettings {
    pub fn resolved_base_url(&self) -> Result<String> {
        if let Some(base_url) = &self.base_url {
            return Ok(base_url.trim_end_matches('/').to_string());
        }
        match self.provider.as_str() {
            "groq" => Ok("https://api.groq.com/openai/v1".to_string()),
            "openai" => Ok("https://api.openai.com/v1".to_string()),
            "openrouter" => Ok("https://openrouter.ai/api/v1".to_string()),
            other => Err(DigestError::Config(format!(
                "Unsupported AI provider '{}' (set ai.base_url for OpenAI-compatible endpoints)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentSettings {
    pub enabled: bool,
    pub use_ai: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSettings {
    pub enabled: bool,
    pub provider: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "alphavantage".to_string(),
            api_key: String::new(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Local wall-clock time, "HH:MM".
    pub time: String,
    /// IANA timezone name.
    pub timezone: String,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            time: "07:00".to_string(),
            timezone: "America/New_York".to_string(),
        }
    }
}

impl ScheduleSettings {
    pub fn local_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, "%H:%M").map_err(|e| {
            DigestError::Config(format!("Invalid schedule time '{}': {}", self.time, e))
        })
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| {
            DigestError::Config(format!("Invalid timezone '{}': {}", self.timezone, e))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub directory: PathBuf,
    /// Used when the command line does not pick a format.
    pub format: Option<ExportFormat>,
    pub pdf_converter: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("exports"),
            format: None,
            pdf_converter: "pandoc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub ntfy: NtfySettings,
    pub email: EmailSettings,
    pub telegram: TelegramSettings,
    pub discord: WebhookSettings,
    pub teams: WebhookSettings,
}

impl DeliverySettings {
    pub fn any_enabled(&self) -> bool {
        self.ntfy.enabled
            || self.email.enabled
            || self.telegram.enabled
            || self.discord.enabled
            || self.teams.enabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NtfySettings {
    pub enabled: bool,
    pub server: String,
    pub topic: String,
    pub priority: String,
    pub tags: String,
}

impl Default for NtfySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            server: "https://ntfy.sh".to_string(),
            topic: String::new(),
            priority: "default".to_string(),
            tags: "chart_with_upwards_trend".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub enabled: bool,
    /// Recipient address.
    pub address: String,
    pub sender_email: String,
    pub username: Option<String>,
    pub password: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            address: String::new(),
            sender_email: String::new(),
            username: None,
            password: String::new(),
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            timeout_seconds: 30,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub enabled: bool,
    pub webhook_url: String,
}

impl Settings {
    /// Load settings from a JSON document, then apply secret overrides from the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DigestError::Config(format!("Cannot read settings file {}: {}", path.display(), e))
        })?;
        let mut settings = Self::from_json(&raw)?;
        settings.apply_env_overrides();
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| DigestError::Config(format!("Malformed settings: {}", e)))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var(ENV_AI_API_KEY) {
            debug!("Using AI API key from {}", ENV_AI_API_KEY);
            self.ai.api_key = key;
        }
        if let Ok(key) = env::var(ENV_STOCK_API_KEY) {
            debug!("Using stock API key from {}", ENV_STOCK_API_KEY);
            self.stock_prices.api_key = key;
        }
        if let Ok(password) = env::var(ENV_SMTP_PASSWORD) {
            debug!("Using SMTP password from {}", ENV_SMTP_PASSWORD);
            self.delivery.email.password = password;
        }
    }

    /// Publishers this run will fetch: selected registry entries followed by custom ones.
    pub fn publishers(&self) -> Vec<Publisher> {
        let registry = SourceRegistry::builtin();
        let mut publishers = registry.select(&self.news_sources);
        publishers.extend(self.custom_sources.iter().cloned());
        publishers
    }

    pub fn validate(&self) -> Result<()> {
        self.schedule.local_time()?;
        self.schedule.tz()?;
        self.ai.resolved_base_url()?;

        let registry = SourceRegistry::builtin();
        for id in &self.news_sources {
            if registry.get(id).is_none() && !self.custom_sources.iter().any(|p| &p.id == id) {
                return Err(DigestError::Config(format!("Unknown news source '{}'", id)));
            }
        }
        for publisher in &self.custom_sources {
            for FeedSpec { url, .. } in &publisher.feeds {
                let parsed = Url::parse(url)?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(DigestError::Config(format!(
                        "Feed URL for {} must be http(s): {}",
                        publisher.id, url
                    )));
                }
            }
        }
        if self.max_articles == 0 {
            return Err(DigestError::Config("max_articles must be at least 1".to_string()));
        }
        if self.stock_prices.enabled && !matches!(self.stock_prices.provider.as_str(), "alphavantage" | "finnhub") {
            return Err(DigestError::Config(format!(
                "Unsupported stock price provider '{}'",
                self.stock_prices.provider
            )));
        }

        let delivery = &self.delivery;
        if delivery.ntfy.enabled && delivery.ntfy.topic.is_empty() {
            return Err(DigestError::Config("ntfy enabled without a topic".to_string()));
        }
        if delivery.email.enabled && (delivery.email.address.is_empty() || delivery.email.password.is_empty()) {
            return Err(DigestError::Config("email enabled without address or password".to_string()));
        }
        if delivery.telegram.enabled && (delivery.telegram.bot_token.is_empty() || delivery.telegram.chat_id.is_empty()) {
            return Err(DigestError::Config("telegram enabled without bot_token or chat_id".to_string()));
        }
        if delivery.discord.enabled && delivery.discord.webhook_url.is_empty() {
            return Err(DigestError::Config("discord enabled without webhook_url".to_string()));
        }
        if delivery.teams.enabled && delivery.teams.webhook_url.is_empty() {
            return Err(DigestError::Config("teams enabled without webhook_url".to_string()));
        }
        Ok(())
    }
}
