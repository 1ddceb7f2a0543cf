use super::{ensure_success, message_body, webhook_client};
use crate::traits::Notifier;
use crate::types::{Digest, Result};
use crate::utils::text::smart_truncate;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// Microsoft Teams incoming webhook (legacy MessageCard payload).
pub struct TeamsNotifier {
    client: Client,
    webhook_url: String,
}

impl TeamsNotifier {
    pub fn new(webhook_url: &str) -> Result<Self> {
        Ok(Self {
            client: webhook_client()?,
            webhook_url: webhook_url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TeamsNotifier {
    fn channel(&self) -> &'static str {
        "teams"
    }

    async fn send(&self, digest: &Digest) -> Result<()> {
        // Teams renders MessageCard text as Markdown; single newlines collapse.
        let text = message_body(digest).replace('\n', "\n\n");
        let card = json!({
            "@type": "MessageCard",
            "@context": "https://schema.org/extensions",
            "themeColor": "333366",
            "title": digest.title,
            "summary": smart_truncate(&digest.title, 80),
            "text": text,
        });

        let response = self.client.post(&self.webhook_url).json(&card).send().await?;
        ensure_success(self.channel(), response).await
    }
}
