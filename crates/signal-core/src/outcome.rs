use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MarketTier, RiskLevel, Sentiment};

/// Fixed post-entry elapsed times at which ROI is recorded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum CheckpointId {
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "7d")]
    D7,
    #[serde(rename = "30d")]
    D30,
}

impl CheckpointId {
    pub const ALL: [CheckpointId; 6] = [
        CheckpointId::H1,
        CheckpointId::H4,
        CheckpointId::H24,
        CheckpointId::D3,
        CheckpointId::D7,
        CheckpointId::D30,
    ];

    pub fn interval(&self) -> Duration {
        match self {
            CheckpointId::H1 => Duration::hours(1),
            CheckpointId::H4 => Duration::hours(4),
            CheckpointId::H24 => Duration::hours(24),
            CheckpointId::D3 => Duration::days(3),
            CheckpointId::D7 => Duration::days(7),
            CheckpointId::D30 => Duration::days(30),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckpointId::H1 => "1h",
            CheckpointId::H4 => "4h",
            CheckpointId::H24 => "24h",
            CheckpointId::D3 => "3d",
            CheckpointId::D7 => "7d",
            CheckpointId::D30 => "30d",
        }
    }
}

/// ROI snapshot at a single checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub price: f64,
    pub roi_percentage: f64,
    pub roi_multiplier: f64,
    pub reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    InProgress,
    Completed,
    DataUnavailable,
}

impl SignalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SignalStatus::InProgress => "in_progress",
            SignalStatus::Completed => "completed",
            SignalStatus::DataUnavailable => "data_unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionReason {
    #[serde(rename = "30d_elapsed")]
    ThirtyDaysElapsed,
    #[serde(rename = "90%_loss")]
    NinetyPercentLoss,
    #[serde(rename = "zero_volume")]
    ZeroVolume,
    #[serde(rename = "historical")]
    Historical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trajectory {
    Improved,
    Crashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakTiming {
    EarlyPeaker,
    LatePeaker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    Moon,
    Great,
    Good,
    Moderate,
    BreakEven,
    Loss,
}

impl OutcomeCategory {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeCategory::Moon => "moon",
            OutcomeCategory::Great => "great",
            OutcomeCategory::Good => "good",
            OutcomeCategory::Moderate => "moderate",
            OutcomeCategory::BreakEven => "break_even",
            OutcomeCategory::Loss => "loss",
        }
    }
}

/// Complete signal outcome with ROI tracking at fixed checkpoints.
///
/// Supports fresh-start re-monitoring: the same address can be tracked
/// multiple times with different entry prices (signal #1, #2, #3, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalOutcome {
    // Identity
    pub message_id: i64,
    pub channel_name: String,
    pub address: String,
    pub symbol: Option<String>,

    // Fresh-start re-monitoring
    pub signal_number: u32,
    pub previous_signals: Vec<i64>,

    // Entry data
    pub entry_price: f64,
    pub entry_timestamp: Option<DateTime<Utc>>,
    pub entry_confidence: f64,
    pub entry_source: String,

    // Signal quality
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub hdrb_score: f64,
    pub confidence: f64,

    // Trajectory
    pub checkpoints: BTreeMap<CheckpointId, Checkpoint>,

    // Outcome data
    pub ath_price: f64,
    pub ath_multiplier: f64,
    pub ath_timestamp: Option<DateTime<Utc>>,
    pub days_to_ath: f64,
    pub current_price: f64,
    pub current_multiplier: f64,

    // Time-based performance at the day-7 and day-30 checkpoints
    pub day_7_price: f64,
    pub day_7_multiplier: f64,
    pub day_7_classification: String,
    pub day_30_price: f64,
    pub day_30_multiplier: f64,
    pub day_30_classification: String,
    pub trajectory: Option<Trajectory>,
    #[serde(default)]
    pub crash_severity: f64,
    pub peak_timing: Option<PeakTiming>,

    // Market context
    pub market_tier: MarketTier,
    pub risk_level: Option<RiskLevel>,
    pub risk_score: f64,

    // Status
    pub status: SignalStatus,
    pub is_complete: bool,
    pub completion_reason: Option<CompletionReason>,
    pub is_winner: bool,
    pub outcome_category: Option<OutcomeCategory>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SignalOutcome {
    /// Create a new in-progress outcome with all checkpoints unreached.
    pub fn new(message_id: i64, channel_name: impl Into<String>, address: impl Into<String>) -> Self {
        let checkpoints = CheckpointId::ALL
            .iter()
            .map(|id| (*id, Checkpoint::default()))
            .collect();

        Self {
            message_id,
            channel_name: channel_name.into(),
            address: address.into(),
            symbol: None,
            signal_number: 1,
            previous_signals: Vec::new(),
            entry_price: 0.0,
            entry_timestamp: None,
            entry_confidence: 0.0,
            entry_source: String::new(),
            sentiment: Sentiment::Neutral,
            sentiment_score: 0.0,
            hdrb_score: 0.0,
            confidence: 0.0,
            checkpoints,
            ath_price: 0.0,
            ath_multiplier: 0.0,
            ath_timestamp: None,
            days_to_ath: 0.0,
            current_price: 0.0,
            current_multiplier: 0.0,
            day_7_price: 0.0,
            day_7_multiplier: 0.0,
            day_7_classification: String::new(),
            day_30_price: 0.0,
            day_30_multiplier: 0.0,
            day_30_classification: String::new(),
            trajectory: None,
            crash_severity: 0.0,
            peak_timing: None,
            market_tier: MarketTier::Unknown,
            risk_level: None,
            risk_score: 0.0,
            status: SignalStatus::InProgress,
            is_complete: false,
            completion_reason: None,
            is_winner: false,
            outcome_category: None,
            error: None,
        }
    }

    pub fn checkpoint(&self, id: CheckpointId) -> &Checkpoint {
        // Loaded records may predate a checkpoint key; treat missing as unreached.
        const EMPTY: Checkpoint = Checkpoint {
            timestamp: None,
            price: 0.0,
            roi_percentage: 0.0,
            roi_multiplier: 0.0,
            reached: false,
        };
        self.checkpoints.get(&id).unwrap_or(&EMPTY)
    }

    pub fn checkpoint_mut(&mut self, id: CheckpointId) -> &mut Checkpoint {
        self.checkpoints.entry(id).or_default()
    }
}
