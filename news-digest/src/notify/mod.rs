//! Delivery channels and the dispatcher that fans a digest out to them.

pub mod discord;
pub mod email;
pub mod ntfy;
pub mod teams;
pub mod telegram;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use ntfy::NtfyNotifier;
pub use teams::TeamsNotifier;
pub use telegram::TelegramNotifier;

use crate::config::DeliverySettings;
use crate::traits::Notifier;
use crate::types::{Digest, DeliveryResult, DigestError, Result};
use futures::future::join_all;
use reqwest::{Client, Response};
use std::fmt::Write;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Plain-text body shared by the text channels: price lines, then the summary.
pub fn message_body(digest: &Digest) -> String {
    let mut body = String::new();
    if !digest.prices.is_empty() {
        for quote in &digest.prices {
            let _ = writeln!(
                body,
                "{}: ${:.2} ({:+.2}, {:+.2}%)",
                quote.ticker, quote.price, quote.change, quote.percent_change
            );
        }
        body.push('\n');
    }
    body.push_str(&digest.summary);
    body
}

pub(crate) fn webhook_client() -> Result<Client> {
    Ok(Client::builder().timeout(Duration::from_secs(30)).build()?)
}

/// Turn a non-success response into a channel error carrying the body text.
pub(crate) async fn ensure_success(channel: &str, response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(DigestError::delivery(channel, format!("{} {}", status.as_u16(), body.trim())))
}

/// Sends one digest through every enabled channel.
pub struct Dispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn from_settings(settings: &DeliverySettings) -> Result<Self> {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if settings.ntfy.enabled {
            notifiers.push(Box::new(NtfyNotifier::new(settings.ntfy.clone())?));
        }
        if settings.email.enabled {
            notifiers.push(Box::new(EmailNotifier::new(settings.email.clone())));
        }
        if settings.telegram.enabled {
            notifiers.push(Box::new(TelegramNotifier::new(settings.telegram.clone())?));
        }
        if settings.discord.enabled {
            notifiers.push(Box::new(DiscordNotifier::new(&settings.discord.webhook_url)?));
        }
        if settings.teams.enabled {
            notifiers.push(Box::new(TeamsNotifier::new(&settings.teams.webhook_url)?));
        }
        Ok(Self::new(notifiers))
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn channels(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.channel()).collect()
    }

    /// Deliver concurrently; one result per channel, in registration order.
    pub async fn dispatch(&self, digest: &Digest) -> Vec<DeliveryResult> {
        let results = join_all(self.notifiers.iter().map(|notifier| async move {
            let started = Instant::now();
            let outcome = notifier.send(digest).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(()) => {
                    info!("Delivered digest via {} in {}ms", notifier.channel(), elapsed_ms);
                    DeliveryResult {
                        channel: notifier.channel().to_string(),
                        success: true,
                        error: None,
                        elapsed_ms,
                    }
                }
                Err(e) => {
                    error!("Delivery via {} failed: {}", notifier.channel(), e);
                    DeliveryResult {
                        channel: notifier.channel().to_string(),
                        success: false,
                        error: Some(e.to_string()),
                        elapsed_ms,
                    }
                }
            }
        }))
        .await;

        let delivered = results.iter().filter(|r| r.success).count();
        info!("Digest delivered via {} of {} channels", delivered, results.len());
        results
    }
}
