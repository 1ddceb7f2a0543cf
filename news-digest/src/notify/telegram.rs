use super::{ensure_success, message_body, webhook_client};
use crate::config::TelegramSettings;
use crate::traits::Notifier;
use crate::types::{Digest, Result};
use crate::utils::text::chunk_message;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram Bot API `sendMessage`.
pub struct TelegramNotifier {
    client: Client,
    settings: TelegramSettings,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings) -> Result<Self> {
        Ok(Self {
            client: webhook_client()?,
            settings,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn channel(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, digest: &Digest) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.bot_token
        );
        let text = format!("*{}*\n\n{}", digest.title, message_body(digest));

        for chunk in chunk_message(&text, MAX_MESSAGE_CHARS) {
            let response = self
                .client
                .post(&url)
                .json(&json!({
                    "chat_id": self.settings.chat_id,
                    "text": chunk,
                    "parse_mode": "Markdown"
                }))
                .send()
                .await?;
            ensure_success(self.channel(), response).await?;
        }
        Ok(())
    }
}
