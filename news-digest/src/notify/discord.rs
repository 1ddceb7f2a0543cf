use super::{ensure_success, message_body, webhook_client};
use crate::traits::Notifier;
use crate::types::{Digest, Result};
use crate::utils::text::chunk_message;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Pause between consecutive webhook posts.
const CHUNK_DELAY: Duration = Duration::from_millis(500);

/// Discord incoming webhook.
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(webhook_url: &str) -> Result<Self> {
        Ok(Self {
            client: webhook_client()?,
            webhook_url: webhook_url.to_string(),
        })
    }

    /// The messages a digest is posted as; the first carries the bold title.
    pub fn messages(digest: &Digest) -> Vec<String> {
        let text = format!("**{}**\n\n{}", digest.title, message_body(digest));
        chunk_message(&text, MAX_MESSAGE_CHARS)
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn channel(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, digest: &Digest) -> Result<()> {
        for (i, content) in Self::messages(digest).into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
            let response = self
                .client
                .post(&self.webhook_url)
                .json(&json!({ "content": content }))
                .send()
                .await?;
            ensure_success(self.channel(), response).await?;
        }
        Ok(())
    }
}
