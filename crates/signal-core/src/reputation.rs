use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MarketTier;

/// Performance metrics for a single market cap tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierPerformance {
    pub total_calls: u32,
    pub winning_calls: u32,
    pub win_rate: f64,
    pub avg_roi: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReputationTier {
    Elite,
    Excellent,
    Good,
    Average,
    Poor,
    Unreliable,
    #[default]
    Unproven,
}

impl ReputationTier {
    /// Map a composite score to a tier. Channels with fewer than
    /// `MIN_SIGNALS_FOR_TIER` signals are always `Unproven`.
    pub fn from_score(score: f64, total_signals: u32) -> ReputationTier {
        if total_signals < MIN_SIGNALS_FOR_TIER {
            return ReputationTier::Unproven;
        }
        if score >= 90.0 {
            ReputationTier::Elite
        } else if score >= 75.0 {
            ReputationTier::Excellent
        } else if score >= 60.0 {
            ReputationTier::Good
        } else if score >= 40.0 {
            ReputationTier::Average
        } else if score >= 20.0 {
            ReputationTier::Poor
        } else {
            ReputationTier::Unreliable
        }
    }
}

/// Minimum completed signals before a channel can leave `Unproven`.
pub const MIN_SIGNALS_FOR_TIER: u32 = 10;

/// Channel reputation derived from completed signal outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelReputation {
    pub channel_name: String,

    // Outcome counts
    pub total_signals: u32,
    pub winning_signals: u32,
    pub losing_signals: u32,
    pub neutral_signals: u32,
    pub win_rate: f64,

    // ROI metrics (multiplier format)
    pub average_roi: f64,
    pub median_roi: f64,
    pub best_roi: f64,
    pub worst_roi: f64,
    pub roi_std_dev: f64,

    // Risk-adjusted metrics
    pub sharpe_ratio: f64,
    pub risk_adjusted_roi: f64,

    // Time metrics
    pub avg_time_to_ath: f64,
    pub avg_time_to_2x: f64,
    pub speed_score: f64,

    // Confidence metrics
    pub avg_confidence: f64,
    pub avg_hdrb_score: f64,

    // Tier-specific performance
    pub tier_performance: BTreeMap<MarketTier, TierPerformance>,

    // Composite reputation
    pub reputation_score: f64,
    pub reputation_tier: ReputationTier,

    // TD-learning prediction state
    pub expected_roi: f64,
    pub prediction_error_history: Vec<f64>,

    // Metadata
    pub first_signal_date: Option<DateTime<Utc>>,
    pub last_signal_date: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ChannelReputation {
    pub fn new(channel_name: impl Into<String>) -> Self {
        let tier_performance = [
            MarketTier::Micro,
            MarketTier::Small,
            MarketTier::Mid,
            MarketTier::Large,
        ]
        .iter()
        .map(|t| (*t, TierPerformance::default()))
        .collect();

        Self {
            channel_name: channel_name.into(),
            total_signals: 0,
            winning_signals: 0,
            losing_signals: 0,
            neutral_signals: 0,
            win_rate: 0.0,
            average_roi: 0.0,
            median_roi: 0.0,
            best_roi: 0.0,
            worst_roi: 0.0,
            roi_std_dev: 0.0,
            sharpe_ratio: 0.0,
            risk_adjusted_roi: 0.0,
            avg_time_to_ath: 0.0,
            avg_time_to_2x: 0.0,
            speed_score: 0.0,
            avg_confidence: 0.0,
            avg_hdrb_score: 0.0,
            tier_performance,
            reputation_score: 0.0,
            reputation_tier: ReputationTier::Unproven,
            expected_roi: 1.0,
            prediction_error_history: Vec::new(),
            first_signal_date: None,
            last_signal_date: None,
            last_updated: None,
        }
    }
}

/// Read-only reputation snapshot handed to the queue and scorer.
#[derive(Debug, Clone, Copy)]
pub struct ReputationSnapshot {
    pub reputation_score: f64,
    pub reputation_tier: ReputationTier,
    pub sharpe_ratio: f64,
    pub expected_roi: f64,
}

/// How a specific channel performs on a specific coin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCoinPerformance {
    pub channel_name: String,
    pub total_mentions: u32,
    pub signals: Vec<String>,
    pub average_roi: f64,
    pub best_roi: f64,
    pub worst_roi: f64,
    pub win_rate: f64,
    pub last_mentioned: Option<DateTime<Utc>>,
}

impl ChannelCoinPerformance {
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            total_mentions: 0,
            signals: Vec::new(),
            average_roi: 0.0,
            best_roi: 0.0,
            worst_roi: 0.0,
            win_rate: 0.0,
            last_mentioned: None,
        }
    }
}

/// Per-coin aggregate of channel performance across all channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinCrossChannel {
    pub symbol: String,
    pub address: String,

    pub total_mentions: u32,
    pub total_channels: u32,
    pub average_roi_all_channels: f64,
    pub best_channel_roi: f64,
    pub worst_channel_roi: f64,

    pub channel_performance: BTreeMap<String, ChannelCoinPerformance>,

    pub best_channel: Option<String>,
    pub worst_channel: Option<String>,

    /// 0-1; high when channels agree (low ROI dispersion).
    pub consensus_strength: f64,
    pub recommendation: String,

    pub expected_roi_cross_channel: f64,

    pub first_mentioned: Option<DateTime<Utc>>,
    pub last_mentioned: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CoinCrossChannel {
    pub fn new(symbol: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            address: address.into(),
            total_mentions: 0,
            total_channels: 0,
            average_roi_all_channels: 0.0,
            best_channel_roi: 0.0,
            worst_channel_roi: 0.0,
            channel_performance: BTreeMap::new(),
            best_channel: None,
            worst_channel: None,
            consensus_strength: 0.0,
            recommendation: String::new(),
            expected_roi_cross_channel: 1.0,
            first_mentioned: None,
            last_mentioned: None,
            last_updated: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_mapping_honors_minimum_signal_count() {
        // A perfect score still reads Unproven below 10 signals.
        assert_eq!(ReputationTier::from_score(95.0, 9), ReputationTier::Unproven);
        assert_eq!(ReputationTier::from_score(95.0, 10), ReputationTier::Elite);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(ReputationTier::from_score(90.0, 20), ReputationTier::Elite);
        assert_eq!(ReputationTier::from_score(89.9, 20), ReputationTier::Excellent);
        assert_eq!(ReputationTier::from_score(75.0, 20), ReputationTier::Excellent);
        assert_eq!(ReputationTier::from_score(60.0, 20), ReputationTier::Good);
        assert_eq!(ReputationTier::from_score(40.0, 20), ReputationTier::Average);
        assert_eq!(ReputationTier::from_score(20.0, 20), ReputationTier::Poor);
        assert_eq!(ReputationTier::from_score(5.0, 20), ReputationTier::Unreliable);
    }

    #[test]
    fn new_reputation_seeds_four_tiers() {
        let rep = ChannelReputation::new("alpha_calls");
        assert_eq!(rep.tier_performance.len(), 4);
        assert!(!rep.tier_performance.contains_key(&MarketTier::Unknown));
        assert_eq!(rep.expected_roi, 1.0);
    }
}
