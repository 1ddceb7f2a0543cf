use super::{ensure_success, message_body, webhook_client};
use crate::config::NtfySettings;
use crate::traits::Notifier;
use crate::types::{Digest, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Push notifications through an ntfy server topic.
pub struct NtfyNotifier {
    client: Client,
    settings: NtfySettings,
}

impl NtfyNotifier {
    pub fn new(settings: NtfySettings) -> Result<Self> {
        Ok(Self {
            client: webhook_client()?,
            settings,
        })
    }

    fn topic_url(&self) -> String {
        format!("{}/{}", self.settings.server.trim_end_matches('/'), self.settings.topic)
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    fn channel(&self) -> &'static str {
        "ntfy"
    }

    async fn send(&self, digest: &Digest) -> Result<()> {
        let url = self.topic_url();
        debug!("Publishing digest to ntfy topic {}", self.settings.topic);

        let response = self
            .client
            .post(&url)
            .header("Title", digest.title.as_str())
            .header("Priority", self.settings.priority.as_str())
            .header("Tags", self.settings.tags.as_str())
            .body(message_body(digest))
            .send()
            .await?;

        ensure_success(self.channel(), response).await
    }
}
