use async_trait::async_trait;

use crate::error::SignalError;
use crate::reputation::ReputationSnapshot;
use crate::types::{ChainFamily, ChannelInfo, MessageEvent, PriceData, Sentiment};

/// A single price provider queried by the fan-out engine.
///
/// Adapters catch their own transport and decode errors; a failure surfaces
/// as `Ok(None)` unless the provider was structurally unusable.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_price(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<PriceData>, SignalError>;
}

/// Pluggable sentiment capability: text in, (label, score in [-1, 1]) out.
pub trait SentimentAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> (Sentiment, f64);
}

/// Read-only view of channel reputations, handed to the queue and scorer so
/// the reputation feedback cycle stays one-directional (only the scheduler
/// mutates the store).
pub trait ReputationView: Send + Sync {
    fn snapshot(&self, channel_name: &str) -> Option<ReputationSnapshot>;
}

/// The chat transport, treated as an external collaborator.
#[async_trait]
pub trait ChatSource: Send {
    /// Next message from the stream; `None` when the source is exhausted.
    async fn next_message(&mut self) -> Option<MessageEvent>;

    async fn is_channel_accessible(&self, channel_id: i64) -> bool;

    async fn channel_info(&self, channel_id: i64) -> Option<ChannelInfo>;
}
