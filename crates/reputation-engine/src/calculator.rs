//! Reputation metric computation over completed outcomes.
//!
//! Sharpe-like ratio: (avg_roi - 1.0) / stdev(roi), 0.0 below two samples.
//! Composite score weights: win rate 30%, ROI 25%, Sharpe 20%, speed 15%,
//! confidence 10%.

use signal_core::{ChannelReputation, MarketTier, SignalOutcome, TierPerformance};
use statrs::statistics::{Data, Median, Statistics};

/// (winners, losers, neutral, win_rate_percent). Winner classification is
/// market-tier aware via `is_winner` set at completion.
pub fn win_rate(outcomes: &[SignalOutcome]) -> (u32, u32, u32, f64) {
    if outcomes.is_empty() {
        return (0, 0, 0, 0.0);
    }
    let winners = outcomes.iter().filter(|o| o.is_winner).count() as u32;
    let losers = outcomes.iter().filter(|o| o.ath_multiplier < 1.0).count() as u32;
    let neutral = outcomes.len() as u32 - winners - losers;
    let rate = winners as f64 / outcomes.len() as f64 * 100.0;
    (winners, losers, neutral, rate)
}

/// (average, median, best, worst) over the ATH multipliers.
pub fn roi_stats(outcomes: &[SignalOutcome]) -> (f64, f64, f64, f64) {
    if outcomes.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let rois: Vec<f64> = outcomes.iter().map(|o| o.ath_multiplier).collect();
    let average = rois.iter().copied().sum::<f64>() / rois.len() as f64;
    let median = Data::new(rois.clone()).median();
    let best = rois.iter().copied().fold(f64::MIN, f64::max);
    let worst = rois.iter().copied().fold(f64::MAX, f64::min);
    (average, median, best, worst)
}

/// (sharpe_ratio, std_dev); both 0.0 with fewer than two outcomes.
pub fn sharpe_ratio(outcomes: &[SignalOutcome]) -> (f64, f64) {
    if outcomes.len() < 2 {
        return (0.0, 0.0);
    }
    let rois: Vec<f64> = outcomes.iter().map(|o| o.ath_multiplier).collect();
    let avg = rois.iter().copied().sum::<f64>() / rois.len() as f64;
    let std_dev = (&rois).std_dev();
    if std_dev == 0.0 || !std_dev.is_finite() {
        return (0.0, 0.0);
    }
    ((avg - 1.0) / std_dev, std_dev)
}

/// (avg_time_to_ath, avg_time_to_2x, speed_score). The speed score maps
/// 1 day to ~100 and 30 days to 0.
pub fn speed_metrics(outcomes: &[SignalOutcome]) -> (f64, f64, f64) {
    let ath_times: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.days_to_ath > 0.0)
        .map(|o| o.days_to_ath)
        .collect();
    let avg_time_to_ath = if ath_times.is_empty() {
        0.0
    } else {
        ath_times.iter().sum::<f64>() / ath_times.len() as f64
    };

    let winner_times: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.is_winner && o.days_to_ath > 0.0)
        .map(|o| o.days_to_ath)
        .collect();
    let avg_time_to_2x = if winner_times.is_empty() {
        0.0
    } else {
        winner_times.iter().sum::<f64>() / winner_times.len() as f64
    };

    let speed_score = if avg_time_to_ath > 0.0 {
        (100.0 - (avg_time_to_ath - 1.0) * 3.33).clamp(0.0, 100.0)
    } else {
        0.0
    };

    (avg_time_to_ath, avg_time_to_2x, speed_score)
}

/// (avg_confidence, avg_hdrb_score) over outcomes that carry them.
pub fn confidence_metrics(outcomes: &[SignalOutcome]) -> (f64, f64) {
    let confidences: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.entry_confidence > 0.0)
        .map(|o| o.entry_confidence)
        .collect();
    let hdrb: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.hdrb_score > 0.0)
        .map(|o| o.hdrb_score)
        .collect();

    let avg_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };
    let avg_hdrb = if hdrb.is_empty() {
        0.0
    } else {
        hdrb.iter().sum::<f64>() / hdrb.len() as f64
    };
    (avg_confidence, avg_hdrb)
}

/// Composite 0-100 score from already-computed metrics.
pub fn composite_score(reputation: &ChannelReputation) -> f64 {
    let win_rate_score = reputation.win_rate;
    let roi_score = ((reputation.average_roi - 1.0) * 50.0).min(100.0);
    let sharpe_score = (reputation.sharpe_ratio * 50.0).min(100.0);
    let speed_score = reputation.speed_score;
    let confidence_score = reputation.avg_confidence * 100.0;

    let score = win_rate_score * 0.30
        + roi_score * 0.25
        + sharpe_score * 0.20
        + speed_score * 0.15
        + confidence_score * 0.10;

    score.clamp(0.0, 100.0)
}

/// Re-run the headline metrics on one market-cap tier's subset.
pub fn tier_performance(outcomes: &[SignalOutcome], tier: MarketTier) -> TierPerformance {
    let subset: Vec<SignalOutcome> = outcomes
        .iter()
        .filter(|o| o.market_tier == tier)
        .cloned()
        .collect();

    if subset.is_empty() {
        return TierPerformance::default();
    }

    let (winners, _, _, rate) = win_rate(&subset);
    let (avg_roi, _, _, _) = roi_stats(&subset);
    let (sharpe, _) = sharpe_ratio(&subset);

    TierPerformance {
        total_calls: subset.len() as u32,
        winning_calls: winners,
        win_rate: rate,
        avg_roi,
        sharpe_ratio: sharpe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::SignalOutcome;

    fn outcome(ath: f64, tier: MarketTier, days_to_ath: f64) -> SignalOutcome {
        let mut o = SignalOutcome::new(1, "alpha_calls", "0xabc");
        o.ath_multiplier = ath;
        o.market_tier = tier;
        o.days_to_ath = days_to_ath;
        o.is_winner = ath >= tier.winner_threshold();
        o.entry_confidence = 0.7;
        o.hdrb_score = 50.0;
        o
    }

    fn scenario_outcomes() -> Vec<SignalOutcome> {
        // The ten-signal boundary scenario: small-cap tier, threshold 2.0.
        [3.25, 0.93, 2.15, 4.50, 0.75, 2.80, 1.50, 3.10, 0.85, 2.40]
            .iter()
            .map(|&ath| outcome(ath, MarketTier::Small, 3.0))
            .collect()
    }

    #[test]
    fn ten_signal_scenario() {
        let outcomes = scenario_outcomes();
        let (winners, losers, neutral, rate) = win_rate(&outcomes);
        assert_eq!(winners, 6);
        assert_eq!(losers, 3);
        assert_eq!(neutral, 1);
        assert!((rate - 60.0).abs() < 1e-9);

        let (avg, median, best, worst) = roi_stats(&outcomes);
        let expected_avg = (3.25 + 0.93 + 2.15 + 4.50 + 0.75 + 2.80 + 1.50 + 3.10 + 0.85 + 2.40) / 10.0;
        assert!((avg - expected_avg).abs() < 1e-9);
        assert_eq!(best, 4.50);
        assert_eq!(worst, 0.75);
        assert!((median - 2.275).abs() < 1e-9);
    }

    #[test]
    fn sharpe_needs_two_outcomes() {
        let one = vec![outcome(2.0, MarketTier::Small, 2.0)];
        assert_eq!(sharpe_ratio(&one), (0.0, 0.0));

        let outcomes = scenario_outcomes();
        let (sharpe, std_dev) = sharpe_ratio(&outcomes);
        assert!(std_dev > 0.0);
        assert!(sharpe > 0.0);
        assert!(sharpe.is_finite());
    }

    #[test]
    fn sharpe_zero_variance_is_zero_not_nan() {
        let outcomes = vec![
            outcome(2.0, MarketTier::Small, 2.0),
            outcome(2.0, MarketTier::Small, 2.0),
        ];
        let (sharpe, std_dev) = sharpe_ratio(&outcomes);
        assert_eq!((sharpe, std_dev), (0.0, 0.0));
    }

    #[test]
    fn speed_score_mapping() {
        let fast = vec![outcome(3.0, MarketTier::Small, 1.0)];
        let (_, _, score) = speed_metrics(&fast);
        assert!((score - 100.0).abs() < 1e-9);

        let slow = vec![outcome(3.0, MarketTier::Small, 30.0)];
        let (_, _, score) = speed_metrics(&slow);
        assert!((score - 3.43).abs() < 0.01);
    }

    #[test]
    fn tier_subset_metrics() {
        let mut outcomes = scenario_outcomes();
        outcomes.push(outcome(1.3, MarketTier::Large, 5.0));

        let small = tier_performance(&outcomes, MarketTier::Small);
        assert_eq!(small.total_calls, 10);
        assert_eq!(small.winning_calls, 6);

        let large = tier_performance(&outcomes, MarketTier::Large);
        assert_eq!(large.total_calls, 1);
        // 1.3x beats the 1.2x large-cap bar.
        assert_eq!(large.winning_calls, 1);

        let micro = tier_performance(&outcomes, MarketTier::Micro);
        assert_eq!(micro.total_calls, 0);
    }
}
