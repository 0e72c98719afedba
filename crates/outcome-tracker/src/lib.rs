//! Signal outcome lifecycle: admission, price updates, completion, archival.
//!
//! Two stores back the tracker: `active` (in-progress signals, at most one
//! per address) and `completed` (finished signals). Archival moves a record
//! from one to the other through the atomic two-file store. A tracker-wide
//! mutex serializes every mutation; it is never held across network I/O.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use atomic_store::TwoFileStore;
use chrono::{DateTime, Utc};
use signal_core::keys::normalize_address;
use signal_core::roi;
use signal_core::{
    CheckpointId, CompletionReason, MarketTier, RiskLevel, Sentiment, SignalError, SignalOutcome,
    SignalStatus,
};
use tokio::sync::Mutex;

/// Verdict of the admission dedup check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Address already tracked in `active`; ignore the new mention.
    Duplicate,
    /// Address finished an earlier signal; start the next numbered one.
    FreshStart {
        signal_number: u32,
        previous_signals: Vec<i64>,
    },
    /// Never seen before.
    First,
}

/// Result of a price re-observation.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceUpdate {
    NotTracked,
    Updated {
        checkpoints_reached: Vec<CheckpointId>,
        new_ath: bool,
    },
    Completed(CompletionReason),
}

/// Everything the tracker needs to open a signal.
#[derive(Debug, Clone)]
pub struct NewSignal {
    pub message_id: i64,
    pub channel_name: String,
    pub address: String,
    pub symbol: Option<String>,
    pub entry_price: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub entry_confidence: f64,
    pub entry_source: String,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub hdrb_score: f64,
    pub confidence: f64,
    pub market_tier: MarketTier,
    pub risk_level: Option<RiskLevel>,
    pub risk_score: f64,
}

#[derive(Default)]
struct TrackerState {
    active: BTreeMap<String, SignalOutcome>,
    completed: BTreeMap<String, SignalOutcome>,
}

pub struct OutcomeTracker {
    store: TwoFileStore,
    state: Mutex<TrackerState>,
}

impl OutcomeTracker {
    pub fn new(active_path: impl Into<PathBuf>, completed_path: impl Into<PathBuf>) -> Self {
        let store = TwoFileStore::new(active_path, completed_path);
        let (active, completed): (BTreeMap<String, SignalOutcome>, BTreeMap<String, SignalOutcome>) =
            store.load();
        tracing::info!(
            "Loaded {} active signals, {} completed signals",
            active.len(),
            completed.len()
        );
        Self {
            store,
            state: Mutex::new(TrackerState { active, completed }),
        }
    }

    fn persist(&self, state: &TrackerState) -> Result<(), SignalError> {
        self.store.save(&state.active, &state.completed)
    }

    /// Deduplication check for an incoming mention.
    pub async fn check_admission(&self, address: &str) -> Admission {
        let key = normalize_address(address);
        let state = self.state.lock().await;

        if state.active.contains_key(&key) {
            tracing::debug!("Duplicate: {}... already in active tracking", &key[..10.min(key.len())]);
            return Admission::Duplicate;
        }

        if let Some(prior) = state.completed.get(&key) {
            let signal_number = prior.signal_number + 1;
            let mut previous_signals = prior.previous_signals.clone();
            previous_signals.push(prior.message_id);
            tracing::info!(
                "Fresh start: {}... previously tracked (signal #{}: {:.3}x), starting signal #{}",
                &key[..10.min(key.len())],
                prior.signal_number,
                prior.ath_multiplier,
                signal_number
            );
            return Admission::FreshStart {
                signal_number,
                previous_signals,
            };
        }

        Admission::First
    }

    /// Open a new signal. Returns `None` when the address is already active.
    pub async fn track_signal(
        &self,
        new: NewSignal,
    ) -> Result<Option<SignalOutcome>, SignalError> {
        let key = normalize_address(&new.address);
        let mut state = self.state.lock().await;

        if state.active.contains_key(&key) {
            return Ok(None);
        }

        let (signal_number, previous_signals) = match state.completed.get(&key) {
            Some(prior) => {
                let mut previous = prior.previous_signals.clone();
                previous.push(prior.message_id);
                (prior.signal_number + 1, previous)
            }
            None => (1, Vec::new()),
        };

        let mut outcome = SignalOutcome::new(new.message_id, new.channel_name, key.clone());
        outcome.symbol = new.symbol;
        outcome.signal_number = signal_number;
        outcome.previous_signals = previous_signals;
        outcome.entry_price = new.entry_price;
        outcome.entry_timestamp = Some(new.entry_timestamp);
        outcome.entry_confidence = new.entry_confidence;
        outcome.entry_source = new.entry_source;
        outcome.sentiment = new.sentiment;
        outcome.sentiment_score = new.sentiment_score;
        outcome.hdrb_score = new.hdrb_score;
        outcome.confidence = new.confidence;
        outcome.market_tier = new.market_tier;
        outcome.risk_level = new.risk_level;
        outcome.risk_score = new.risk_score;
        outcome.current_price = new.entry_price;
        outcome.current_multiplier = 1.0;
        // Entry itself is the first observed high.
        if new.entry_price > 0.0 {
            outcome.ath_price = new.entry_price;
            outcome.ath_multiplier = 1.0;
            outcome.ath_timestamp = Some(new.entry_timestamp);
        }

        state.active.insert(key, outcome.clone());
        self.persist(&state)?;

        tracing::info!(
            "Tracking signal #{} for {} from {} (entry ${:.6}, source {})",
            outcome.signal_number,
            outcome.symbol.as_deref().unwrap_or("?"),
            outcome.channel_name,
            outcome.entry_price,
            outcome.entry_source
        );
        Ok(Some(outcome))
    }

    /// Re-observation of a tracked address: recompute ROI, roll the ATH,
    /// mark elapsed checkpoints, and finalize when a stop condition fires.
    pub async fn update_price(
        &self,
        address: &str,
        current_price: f64,
        now: DateTime<Utc>,
    ) -> Result<PriceUpdate, SignalError> {
        let key = normalize_address(address);
        let mut state = self.state.lock().await;

        let Some(outcome) = state.active.get_mut(&key) else {
            return Ok(PriceUpdate::NotTracked);
        };

        let (_, multiplier) = roi::calculate_roi(outcome.entry_price, current_price);
        outcome.current_price = current_price;
        outcome.current_multiplier = multiplier;

        let new_ath = roi::update_ath(outcome, current_price, now);
        let checkpoints_reached = roi::mark_elapsed_checkpoints(outcome, current_price, now);

        if let Some(reason) = roi::check_stop_conditions(outcome, now) {
            let completed = Self::finalize_locked(&mut state, &key, reason, now);
            self.persist(&state)?;
            if completed {
                return Ok(PriceUpdate::Completed(reason));
            }
            return Ok(PriceUpdate::NotTracked);
        }

        self.persist(&state)?;
        Ok(PriceUpdate::Updated {
            checkpoints_reached,
            new_ath,
        })
    }

    /// Apply an arbitrary mutation to an active outcome (checkpoint backfill,
    /// error annotation) and persist. Returns false when not tracked.
    pub async fn mutate<F>(&self, address: &str, mutate: F) -> Result<bool, SignalError>
    where
        F: FnOnce(&mut SignalOutcome),
    {
        let key = normalize_address(address);
        let mut state = self.state.lock().await;
        let Some(outcome) = state.active.get_mut(&key) else {
            return Ok(false);
        };
        mutate(outcome);
        self.persist(&state)?;
        Ok(true)
    }

    /// Compute terminal fields and archive the signal from active to
    /// completed. Both files are updated or neither.
    pub async fn finalize(
        &self,
        address: &str,
        reason: CompletionReason,
        now: DateTime<Utc>,
    ) -> Result<Option<SignalOutcome>, SignalError> {
        let key = normalize_address(address);
        let mut state = self.state.lock().await;
        if !Self::finalize_locked(&mut state, &key, reason, now) {
            return Ok(None);
        }
        self.persist(&state)?;
        Ok(state.completed.get(&key).cloned())
    }

    fn finalize_locked(
        state: &mut TrackerState,
        key: &str,
        reason: CompletionReason,
        _now: DateTime<Utc>,
    ) -> bool {
        let Some(mut outcome) = state.active.remove(key) else {
            tracing::warn!("Cannot archive {}: not in active tracking", key);
            return false;
        };

        // Day-7 / day-30 snapshots come from the checkpoints when reached,
        // else from the last observed price.
        let day7 = outcome.checkpoint(CheckpointId::D7).clone();
        let (day_7_price, day_7_multiplier) = if day7.reached {
            (day7.price, day7.roi_multiplier)
        } else {
            (outcome.current_price, outcome.current_multiplier)
        };
        let day30 = outcome.checkpoint(CheckpointId::D30).clone();
        let (day_30_price, day_30_multiplier) = if day30.reached {
            (day30.price, day30.roi_multiplier)
        } else {
            (outcome.current_price, outcome.current_multiplier)
        };

        outcome.day_7_price = day_7_price;
        outcome.day_7_multiplier = day_7_multiplier;
        outcome.day_7_classification = roi::classification_label(day_7_multiplier).to_string();
        outcome.day_30_price = day_30_price;
        outcome.day_30_multiplier = day_30_multiplier;
        outcome.day_30_classification = roi::classification_label(day_30_multiplier).to_string();

        let (trajectory, crash_severity) = roi::analyze_trajectory(
            day_7_multiplier,
            day_30_multiplier,
            Some(outcome.ath_multiplier),
        );
        outcome.trajectory = Some(trajectory);
        outcome.crash_severity = crash_severity;
        outcome.peak_timing = Some(roi::peak_timing(outcome.days_to_ath));

        outcome.is_winner = roi::is_winner(outcome.ath_multiplier, outcome.market_tier);
        outcome.outcome_category = Some(roi::categorize_outcome(outcome.ath_multiplier));
        outcome.status = SignalStatus::Completed;
        outcome.is_complete = true;
        outcome.completion_reason = Some(reason);

        tracing::info!(
            "Archived signal #{} for {} ({:?}, ATH {:.3}x, winner={})",
            outcome.signal_number,
            key,
            reason,
            outcome.ath_multiplier,
            outcome.is_winner
        );

        state.completed.insert(key.to_string(), outcome);
        true
    }

    /// Archive every active signal whose entry is older than the tracking
    /// window. Returns the archived addresses.
    pub async fn archive_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, SignalError> {
        let mut state = self.state.lock().await;
        let expired: Vec<String> = state
            .active
            .iter()
            .filter(|(_, o)| {
                o.entry_timestamp
                    .is_some_and(|ts| now - ts >= roi::tracking_window())
            })
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            Self::finalize_locked(&mut state, key, CompletionReason::ThirtyDaysElapsed, now);
        }
        if !expired.is_empty() {
            self.persist(&state)?;
            tracing::info!("Archived {} expired signal(s)", expired.len());
        }
        Ok(expired)
    }

    pub async fn get_active(&self, address: &str) -> Option<SignalOutcome> {
        let key = normalize_address(address);
        self.state.lock().await.active.get(&key).cloned()
    }

    pub async fn get_completed(&self, address: &str) -> Option<SignalOutcome> {
        let key = normalize_address(address);
        self.state.lock().await.completed.get(&key).cloned()
    }

    pub async fn active_addresses(&self) -> Vec<String> {
        self.state.lock().await.active.keys().cloned().collect()
    }

    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.active.len(), state.completed.len())
    }

    /// Completed outcomes for one channel.
    pub async fn completed_for_channel(&self, channel_name: &str) -> Vec<SignalOutcome> {
        self.state
            .lock()
            .await
            .completed
            .values()
            .filter(|o| o.channel_name == channel_name)
            .cloned()
            .collect()
    }

    pub async fn completed_outcomes(&self) -> Vec<SignalOutcome> {
        self.state.lock().await.completed.values().cloned().collect()
    }

    /// Channels that have at least one completed outcome.
    pub async fn channels_with_completions(&self) -> HashSet<String> {
        self.state
            .lock()
            .await
            .completed
            .values()
            .map(|o| o.channel_name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests;
