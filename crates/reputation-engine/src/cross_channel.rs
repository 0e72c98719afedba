//! Per-coin cross-channel aggregation.
//!
//! For every token, tracks how each channel's calls on it performed, which
//! channel calls it best, and how strongly channels agree
//! (`consensus_strength = max(0, 1 - std/mean)` over per-channel average
//! ROI).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use atomic_store::JsonStore;
use chrono::{DateTime, Utc};
use signal_core::keys::normalize_address;
use signal_core::{ChannelCoinPerformance, CoinCrossChannel, SignalError, SignalOutcome};

pub struct CrossChannelRepo {
    store: JsonStore,
    coins: RwLock<BTreeMap<String, CoinCrossChannel>>,
}

impl CrossChannelRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let store = JsonStore::new(path);
        let coins: BTreeMap<String, CoinCrossChannel> = store.load();
        if !coins.is_empty() {
            tracing::info!("Loaded {} cross-channel coin record(s)", coins.len());
        }
        Self {
            store,
            coins: RwLock::new(coins),
        }
    }

    /// Rebuild all coin records from the full completed-outcome set.
    pub fn rebuild(&self, outcomes: &[SignalOutcome], now: DateTime<Utc>) {
        let mut grouped: BTreeMap<String, Vec<&SignalOutcome>> = BTreeMap::new();
        for outcome in outcomes {
            grouped
                .entry(normalize_address(&outcome.address))
                .or_default()
                .push(outcome);
        }

        let mut coins = self.coins.write().unwrap_or_else(|e| e.into_inner());
        for (address, coin_outcomes) in grouped {
            let symbol = coin_outcomes
                .iter()
                .find_map(|o| o.symbol.clone())
                .unwrap_or_default();

            let mut coin = coins
                .remove(&address)
                .unwrap_or_else(|| CoinCrossChannel::new(symbol.clone(), address.clone()));
            if coin.symbol.is_empty() {
                coin.symbol = symbol;
            }

            Self::aggregate(&mut coin, &coin_outcomes, now);
            coins.insert(address, coin);
        }
    }

    fn aggregate(coin: &mut CoinCrossChannel, outcomes: &[&SignalOutcome], now: DateTime<Utc>) {
        let mut per_channel: BTreeMap<String, Vec<&SignalOutcome>> = BTreeMap::new();
        for outcome in outcomes {
            per_channel
                .entry(outcome.channel_name.clone())
                .or_default()
                .push(outcome);
        }

        coin.channel_performance = per_channel
            .iter()
            .map(|(channel, channel_outcomes)| {
                let mut perf = ChannelCoinPerformance::new(channel.clone());
                perf.total_mentions = channel_outcomes.len() as u32;
                perf.signals = channel_outcomes
                    .iter()
                    .map(|o| o.message_id.to_string())
                    .collect();

                let rois: Vec<f64> = channel_outcomes.iter().map(|o| o.ath_multiplier).collect();
                perf.average_roi = rois.iter().sum::<f64>() / rois.len() as f64;
                perf.best_roi = rois.iter().copied().fold(f64::MIN, f64::max);
                perf.worst_roi = rois.iter().copied().fold(f64::MAX, f64::min);
                let winners = channel_outcomes.iter().filter(|o| o.is_winner).count();
                perf.win_rate = winners as f64 / channel_outcomes.len() as f64 * 100.0;
                perf.last_mentioned = channel_outcomes
                    .iter()
                    .filter_map(|o| o.entry_timestamp)
                    .max();
                (channel.clone(), perf)
            })
            .collect();

        coin.total_mentions = outcomes.len() as u32;
        coin.total_channels = coin.channel_performance.len() as u32;

        // Mention-weighted overall average.
        let total_roi: f64 = outcomes.iter().map(|o| o.ath_multiplier).sum();
        coin.average_roi_all_channels = if outcomes.is_empty() {
            0.0
        } else {
            total_roi / outcomes.len() as f64
        };

        let channel_avgs: Vec<(String, f64)> = coin
            .channel_performance
            .iter()
            .map(|(name, perf)| (name.clone(), perf.average_roi))
            .collect();

        coin.best_channel = channel_avgs
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name.clone());
        coin.worst_channel = channel_avgs
            .iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name.clone());
        coin.best_channel_roi = channel_avgs
            .iter()
            .map(|(_, roi)| *roi)
            .fold(f64::MIN, f64::max)
            .max(0.0);
        coin.worst_channel_roi = channel_avgs
            .iter()
            .map(|(_, roi)| *roi)
            .fold(f64::MAX, f64::min)
            .min(coin.best_channel_roi);

        coin.consensus_strength = consensus_strength(
            &channel_avgs.iter().map(|(_, roi)| *roi).collect::<Vec<f64>>(),
        );

        coin.recommendation = match (&coin.best_channel, coin.total_channels) {
            (Some(best), n) if n > 1 => {
                format!("Follow {} for {} calls", best, coin.symbol)
            }
            _ => String::new(),
        };

        coin.expected_roi_cross_channel = coin.average_roi_all_channels.max(0.0);
        coin.first_mentioned = outcomes.iter().filter_map(|o| o.entry_timestamp).min();
        coin.last_mentioned = outcomes.iter().filter_map(|o| o.entry_timestamp).max();
        coin.last_updated = Some(now);
    }

    pub fn get(&self, address: &str) -> Option<CoinCrossChannel> {
        let coins = self.coins.read().unwrap_or_else(|e| e.into_inner());
        coins.get(&normalize_address(address)).cloned()
    }

    pub fn all(&self) -> Vec<CoinCrossChannel> {
        let coins = self.coins.read().unwrap_or_else(|e| e.into_inner());
        coins.values().cloned().collect()
    }

    pub fn save(&self) -> Result<(), SignalError> {
        let coins = self.coins.read().unwrap_or_else(|e| e.into_inner());
        self.store.save(&*coins)
    }
}

/// `max(0, 1 - std/mean)` when mean > 0, else 0. Population std dev: the
/// channel averages are the whole population, not a sample.
fn consensus_strength(rois: &[f64]) -> f64 {
    if rois.is_empty() {
        return 0.0;
    }
    let mean = rois.iter().sum::<f64>() / rois.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = rois.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / rois.len() as f64;
    let std = variance.sqrt();
    (1.0 - std / mean).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(channel: &str, address: &str, message_id: i64, ath: f64) -> SignalOutcome {
        let mut o = SignalOutcome::new(message_id, channel, address);
        o.symbol = Some("AVI".to_string());
        o.ath_multiplier = ath;
        o.is_winner = ath >= 2.0;
        o.entry_timestamp = Some(Utc::now());
        o
    }

    const ADDR: &str = "0xaaa0000000000000000000000000000000000001";

    #[test]
    fn aggregates_per_channel_and_picks_best() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CrossChannelRepo::new(dir.path().join("coins_cross_channel.json"));

        let outcomes = vec![
            outcome("eric", ADDR, 1, 4.0),
            outcome("eric", ADDR, 2, 2.0),
            outcome("noise", ADDR, 3, 0.8),
        ];
        repo.rebuild(&outcomes, Utc::now());

        let coin = repo.get(ADDR).unwrap();
        assert_eq!(coin.total_mentions, 3);
        assert_eq!(coin.total_channels, 2);
        assert_eq!(coin.best_channel.as_deref(), Some("eric"));
        assert_eq!(coin.worst_channel.as_deref(), Some("noise"));
        assert_eq!(coin.channel_performance["eric"].average_roi, 3.0);
        assert!(coin.recommendation.contains("eric"));
        assert!(coin.consensus_strength > 0.0 && coin.consensus_strength < 1.0);
    }

    #[test]
    fn perfect_agreement_has_full_consensus() {
        assert!((consensus_strength(&[2.0, 2.0, 2.0]) - 1.0).abs() < 1e-9);
        assert_eq!(consensus_strength(&[]), 0.0);
        assert_eq!(consensus_strength(&[-1.0, 1.0]), 0.0);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coins_cross_channel.json");
        let now = Utc::now();
        let outcomes = vec![outcome("eric", ADDR, 1, 4.0)];

        let repo = CrossChannelRepo::new(&path);
        repo.rebuild(&outcomes, now);
        repo.save().unwrap();
        let first = std::fs::read(&path).unwrap();

        repo.rebuild(&outcomes, now);
        repo.save().unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }
}
