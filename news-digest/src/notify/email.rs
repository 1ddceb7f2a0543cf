use super::message_body;
use crate::config::EmailSettings;
use crate::traits::Notifier;
use crate::types::{Digest, DigestError, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;
use tracing::{info, warn};

const CHANNEL: &str = "email";

/// Port that speaks TLS from the first byte; every other port uses STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// SMTP delivery with an HTML body and a plain-text alternative.
pub struct EmailNotifier {
    settings: EmailSettings,
}

impl EmailNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, digest: &Digest) -> Result<Message> {
        let sender = if self.settings.sender_email.is_empty() {
            &self.settings.address
        } else {
            &self.settings.sender_email
        };
        let from: Mailbox = sender
            .parse()
            .map_err(|e| DigestError::Config(format!("Invalid sender address '{}': {}", sender, e)))?;
        let to: Mailbox = self.settings.address.parse().map_err(|e| {
            DigestError::Config(format!("Invalid recipient address '{}': {}", self.settings.address, e))
        })?;

        let plain = message_body(digest);
        let html = render_html(&digest.title, &plain);

        Message::builder()
            .from(from)
            .to(to)
            .subject(digest.title.as_str())
            .multipart(MultiPart::alternative_plain_html(plain, html))
            .map_err(|e| DigestError::delivery(CHANNEL, format!("Cannot build message: {}", e)))
    }

    fn build_transport(&self) -> Result<SmtpTransport> {
        let settings = &self.settings;
        let builder = if settings.smtp_port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&settings.smtp_server)
        } else {
            SmtpTransport::starttls_relay(&settings.smtp_server)
        }
        .map_err(|e| DigestError::delivery(CHANNEL, format!("Bad SMTP server {}: {}", settings.smtp_server, e)))?;

        let username = settings.username.clone().unwrap_or_else(|| {
            if settings.sender_email.is_empty() {
                settings.address.clone()
            } else {
                settings.sender_email.clone()
            }
        });

        Ok(builder
            .port(settings.smtp_port)
            .credentials(Credentials::new(username, settings.password.clone()))
            .timeout(Some(Duration::from_secs(settings.timeout_seconds)))
            .build())
    }
}

fn render_html(title: &str, body: &str) -> String {
    let escape = |s: &str| s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
    format!(
        "<html><head><style>body {{ font-family: Arial, sans-serif; line-height: 1.6; }} \
         h1 {{ color: #333366; }}</style></head><body><h1>{}</h1><p>{}</p></body></html>",
        escape(title),
        escape(body).replace('\n', "<br>")
    )
}

enum SendFailure {
    Auth(String),
    Permanent(String),
    Transient(String),
}

/// Blocking send; runs on the blocking pool.
fn send_blocking(mailer: &SmtpTransport, email: &Message) -> std::result::Result<(), SendFailure> {
    match mailer.send(email) {
        Ok(_) => Ok(()),
        Err(e) => {
            // 530/534/535: authentication required or rejected
            let auth = e.status().map(|code| code.to_string().starts_with("53")).unwrap_or(false);
            if auth {
                Err(SendFailure::Auth(e.to_string()))
            } else if e.is_permanent() || e.is_client() {
                Err(SendFailure::Permanent(e.to_string()))
            } else {
                Err(SendFailure::Transient(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn send(&self, digest: &Digest) -> Result<()> {
        let email = self.build_message(digest)?;
        let mailer = self.build_transport()?;

        let mut backoff = ExponentialBackoff {
            current_interval: Duration::from_secs(3),
            initial_interval: Duration::from_secs(3),
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let attempts = self.settings.max_retries + 1;
        for attempt in 1..=attempts {
            info!(
                "Connecting to SMTP server {}:{} (attempt {}/{})",
                self.settings.smtp_server, self.settings.smtp_port, attempt, attempts
            );

            let (m, e) = (mailer.clone(), email.clone());
            let outcome = tokio::task::spawn_blocking(move || send_blocking(&m, &e))
                .await
                .map_err(|e| DigestError::delivery(CHANNEL, format!("send task failed: {}", e)))?;

            match outcome {
                Ok(()) => return Ok(()),
                Err(SendFailure::Auth(message)) => {
                    return Err(DigestError::Auth(format!("SMTP authentication failed: {}", message)));
                }
                Err(SendFailure::Permanent(message)) => return Err(DigestError::delivery(CHANNEL, message)),
                Err(SendFailure::Transient(message)) if attempt < attempts => {
                    let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(3));
                    warn!("SMTP connection issue, retrying in {:?}: {}", delay, message);
                    tokio::time::sleep(delay).await;
                }
                Err(SendFailure::Transient(message)) => {
                    return Err(DigestError::delivery(
                        CHANNEL,
                        format!("giving up after {} attempts: {}", attempts, message),
                    ));
                }
            }
        }
        Err(DigestError::delivery(CHANNEL, "no send attempt was made"))
    }
}
