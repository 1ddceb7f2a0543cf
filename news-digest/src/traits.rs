use crate::types::{Digest, PriceQuote, Result};
use async_trait::async_trait;

/// A market-data endpoint that can quote a single ticker.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Short provider name used in logs
    fn provider_name(&self) -> &'static str;

    /// Current price and day change for `ticker`
    async fn quote(&self, ticker: &str) -> Result<PriceQuote>;
}

/// A delivery channel for finished digests.
///
/// Implementations must not retry forever and must not log credentials.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name as it appears in delivery results
    fn channel(&self) -> &'static str;

    async fn send(&self, digest: &Digest) -> Result<()>;
}
