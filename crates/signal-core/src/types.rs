use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blockchain family inferred from address shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    Evm,
    Solana,
    Unknown,
}

impl ChainFamily {
    /// Platform identifier used by most price APIs.
    pub fn platform(&self) -> &'static str {
        match self {
            ChainFamily::Evm => "ethereum",
            ChainFamily::Solana => "solana",
            ChainFamily::Unknown => "unknown",
        }
    }
}

/// A detected blockchain address with validation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub raw: String,
    pub family: ChainFamily,
    pub valid: bool,
    pub ticker: Option<String>,
    /// Specific chain when known ('ethereum', 'bsc', 'polygon', ...).
    pub chain_specific: Option<String>,
    /// True when this address was an LP pool resolved to its base token.
    pub is_pool: bool,
    /// Original pool address when `is_pool` is set.
    pub resolved_from: Option<String>,
}

impl Address {
    pub fn new(raw: impl Into<String>, family: ChainFamily, valid: bool) -> Self {
        Self {
            raw: raw.into(),
            chain_specific: match family {
                ChainFamily::Evm => Some("ethereum".to_string()),
                ChainFamily::Solana => Some("solana".to_string()),
                ChainFamily::Unknown => None,
            },
            family,
            valid,
            ticker: None,
            is_pool: false,
            resolved_from: None,
        }
    }
}

/// Market cap tier with crypto-adjusted thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTier {
    Micro,
    Small,
    Mid,
    Large,
    Unknown,
}

impl MarketTier {
    /// Classify a market cap into a tier. Thresholds are 10x lower than
    /// traditional equities to match crypto market structure.
    pub fn classify(market_cap: Option<f64>) -> MarketTier {
        match market_cap {
            None => MarketTier::Unknown,
            Some(mc) if mc >= 1_000_000_000.0 => MarketTier::Large,
            Some(mc) if mc >= 100_000_000.0 => MarketTier::Mid,
            Some(mc) if mc >= 10_000_000.0 => MarketTier::Small,
            Some(_) => MarketTier::Micro,
        }
    }

    /// ATH multiplier needed for a signal in this tier to count as a winner.
    pub fn winner_threshold(&self) -> f64 {
        match self {
            MarketTier::Large => 1.2,
            MarketTier::Mid => 1.5,
            MarketTier::Small | MarketTier::Micro => 2.0,
            MarketTier::Unknown => 1.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketTier::Micro => "micro",
            MarketTier::Small => "small",
            MarketTier::Mid => "mid",
            MarketTier::Large => "large",
            MarketTier::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

/// Sentiment label produced by the analyzer capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// Merged price record assembled from one or more providers.
///
/// Optional fields distinguish "missing" from "zero"; `source` is an ordered
/// `+`-joined list of the providers that contributed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceData {
    pub price_usd: f64,
    pub symbol: Option<String>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub pair_created_at: Option<DateTime<Utc>>,
    pub ath: Option<f64>,
    pub ath_date: Option<DateTime<Utc>>,
    pub ath_change_percentage: Option<f64>,
    pub market_tier: Option<MarketTier>,
    pub risk_level: Option<RiskLevel>,
    pub risk_score: Option<f64>,
    pub liquidity_ratio: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub data_completeness: f64,
    pub source: String,
}

impl PriceData {
    pub fn new(price_usd: f64, source: impl Into<String>) -> Self {
        Self {
            price_usd,
            symbol: None,
            market_cap: None,
            volume_24h: None,
            price_change_24h: None,
            liquidity_usd: None,
            pair_created_at: None,
            ath: None,
            ath_date: None,
            ath_change_percentage: None,
            market_tier: None,
            risk_level: None,
            risk_score: None,
            liquidity_ratio: None,
            volume_ratio: None,
            data_completeness: 0.0,
            source: source.into(),
        }
    }

    /// Nominal record for a blacklisted token with no live price. Blacklisting
    /// suppresses the provider fan-out, not tracking: admission proceeds with
    /// this placeholder so the signal records as an expected failure.
    pub fn dead_token(address: &str) -> Self {
        let mut data = Self::new(0.000001, Self::DEAD_TOKEN_SOURCE);
        data.symbol = Some(address.chars().take(10).collect());
        data
    }

    pub const DEAD_TOKEN_SOURCE: &'static str = "dead_token";

    /// True for the placeholder produced by [`PriceData::dead_token`].
    pub fn is_dead_token_placeholder(&self) -> bool {
        self.source == Self::DEAD_TOKEN_SOURCE
    }

    /// Record an additional contributing provider in the `source` chain.
    pub fn add_source(&mut self, provider: &str) {
        if self.source.is_empty() {
            self.source = provider.to_string();
        } else {
            self.source = format!("{}+{}", self.source, provider);
        }
    }

    /// True when the primary response needs no secondary fan-out.
    pub fn is_complete(&self) -> bool {
        self.symbol.as_deref().is_some_and(|s| s != "UNKNOWN")
            && self.market_cap.is_some()
            && self.volume_24h.is_some()
    }
}

/// Daily OHLC candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Point-in-time entry price plus the forward OHLC window around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPriceData {
    pub symbol: String,
    pub price_at_timestamp: f64,
    pub ath_in_window: f64,
    pub ath_timestamp: DateTime<Utc>,
    pub days_to_ath: f64,
    pub candles: Vec<Candle>,
    pub source: String,
    #[serde(default)]
    pub cached: bool,
}

/// Engagement counters extracted from the raw chat message object.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Engagement {
    pub forwards: u64,
    pub reactions: u64,
    pub replies: u64,
    pub views: u64,
}

/// One message delivered by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub channel_id: i64,
    pub channel_name: String,
    pub message_id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub engagement: Engagement,
}

/// Channel metadata exposed by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    pub participants_count: Option<u64>,
    pub is_broadcast: bool,
}
