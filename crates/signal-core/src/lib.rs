pub mod error;
pub mod keys;
pub mod outcome;
pub mod reputation;
pub mod roi;
pub mod traits;
pub mod types;

pub use error::SignalError;
pub use outcome::{
    Checkpoint, CheckpointId, CompletionReason, OutcomeCategory, PeakTiming, SignalOutcome,
    SignalStatus, Trajectory,
};
pub use reputation::{
    ChannelCoinPerformance, ChannelReputation, CoinCrossChannel, ReputationSnapshot,
    ReputationTier, TierPerformance,
};
pub use traits::{ChatSource, PriceProvider, ReputationView, SentimentAnalyzer};
pub use types::{
    Address, Candle, ChainFamily, ChannelInfo, Engagement, HistoricalPriceData, MarketTier,
    MessageEvent, PriceData, RiskLevel, Sentiment,
};
