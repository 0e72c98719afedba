//! Pure ROI math over signal outcomes.
//!
//! ROI% = ((current - entry) / entry) * 100; multiplier = current / entry.
//! All functions take the clock as a parameter so callers (and tests) control
//! time explicitly.

use chrono::{DateTime, Duration, Utc};

use crate::outcome::{
    CheckpointId, CompletionReason, OutcomeCategory, PeakTiming, SignalOutcome, Trajectory,
};
use crate::types::MarketTier;

/// Drawdown from ATH that terminates tracking early.
pub const MAX_DRAWDOWN: f64 = 0.90;

/// Tracking window length.
pub fn tracking_window() -> Duration {
    Duration::days(30)
}

/// Calculate (roi_percentage, roi_multiplier) for an entry/current pair.
/// Invalid prices yield no movement rather than dividing by zero.
pub fn calculate_roi(entry_price: f64, current_price: f64) -> (f64, f64) {
    if entry_price <= 0.0 || current_price <= 0.0 {
        return (0.0, 1.0);
    }
    let roi_percentage = ((current_price - entry_price) / entry_price) * 100.0;
    let roi_multiplier = current_price / entry_price;
    (roi_percentage, roi_multiplier)
}

/// Update ATH state if `current_price` sets a new high. Returns true on update.
pub fn update_ath(outcome: &mut SignalOutcome, current_price: f64, at: DateTime<Utc>) -> bool {
    if current_price <= outcome.ath_price {
        return false;
    }
    outcome.ath_price = current_price;
    let (_, roi_multiplier) = calculate_roi(outcome.entry_price, current_price);
    outcome.ath_multiplier = roi_multiplier;
    outcome.ath_timestamp = Some(at);
    if let Some(entry_ts) = outcome.entry_timestamp {
        outcome.days_to_ath = (at - entry_ts).num_seconds() as f64 / 86_400.0;
    }
    true
}

/// Mark every checkpoint whose interval has elapsed and is not yet reached,
/// recording the current price against it. Returns the newly reached ids.
pub fn mark_elapsed_checkpoints(
    outcome: &mut SignalOutcome,
    current_price: f64,
    now: DateTime<Utc>,
) -> Vec<CheckpointId> {
    let Some(entry_ts) = outcome.entry_timestamp else {
        return Vec::new();
    };

    let elapsed = now - entry_ts;
    let entry_price = outcome.entry_price;
    let mut reached = Vec::new();

    for id in CheckpointId::ALL {
        if outcome.checkpoint(id).reached || elapsed < id.interval() {
            continue;
        }
        let (roi_percentage, roi_multiplier) = calculate_roi(entry_price, current_price);
        let checkpoint = outcome.checkpoint_mut(id);
        checkpoint.timestamp = Some(entry_ts + id.interval());
        checkpoint.price = current_price;
        checkpoint.roi_percentage = roi_percentage;
        checkpoint.roi_multiplier = roi_multiplier;
        checkpoint.reached = true;
        reached.push(id);
    }

    reached
}

/// Tier-aware winner decision.
pub fn is_winner(ath_multiplier: f64, tier: MarketTier) -> bool {
    ath_multiplier >= tier.winner_threshold()
}

/// Global outcome category ladder keyed off the ATH multiplier.
pub fn categorize_outcome(ath_multiplier: f64) -> OutcomeCategory {
    if ath_multiplier >= 5.0 {
        OutcomeCategory::Moon
    } else if ath_multiplier >= 3.0 {
        OutcomeCategory::Great
    } else if ath_multiplier >= 2.0 {
        OutcomeCategory::Good
    } else if ath_multiplier >= 1.5 {
        OutcomeCategory::Moderate
    } else if ath_multiplier >= 1.0 {
        OutcomeCategory::BreakEven
    } else {
        OutcomeCategory::Loss
    }
}

/// Coarse label used for the day-7 / day-30 classification columns.
pub fn classification_label(multiplier: f64) -> &'static str {
    if multiplier >= 5.0 {
        "MOON"
    } else if multiplier >= 2.0 {
        "WINNER"
    } else if multiplier >= 1.2 {
        "GOOD"
    } else if multiplier >= 1.0 {
        "BREAK-EVEN"
    } else {
        "LOSER"
    }
}

/// Check the tracking stop conditions: 30 days elapsed, or a 90% drawdown
/// from the in-window ATH.
pub fn check_stop_conditions(
    outcome: &SignalOutcome,
    now: DateTime<Utc>,
) -> Option<CompletionReason> {
    let entry_ts = outcome.entry_timestamp?;

    if now - entry_ts >= tracking_window() {
        return Some(CompletionReason::ThirtyDaysElapsed);
    }

    if outcome.ath_price > 0.0 {
        let loss_from_ath = (outcome.ath_price - outcome.current_price) / outcome.ath_price;
        if loss_from_ath >= MAX_DRAWDOWN {
            return Some(CompletionReason::NinetyPercentLoss);
        }
    }

    None
}

/// Classify the day-7 to day-30 trajectory, considering the ATH. A drop of
/// more than 2% from the peak counts as crashed even when day 30 beats day 7.
/// Returns the trajectory and the crash severity percentage.
pub fn analyze_trajectory(
    day_7_multiplier: f64,
    day_30_multiplier: f64,
    ath_multiplier: Option<f64>,
) -> (Trajectory, f64) {
    if let Some(ath) = ath_multiplier {
        if ath > day_30_multiplier && ath > 0.0 {
            let drop_from_ath = ((ath - day_30_multiplier) / ath) * 100.0;
            if drop_from_ath > 2.0 {
                return (Trajectory::Crashed, drop_from_ath);
            }
        }
    }

    if day_30_multiplier < day_7_multiplier && day_7_multiplier > 0.0 {
        let crash_severity = ((day_7_multiplier - day_30_multiplier) / day_7_multiplier) * 100.0;
        (Trajectory::Crashed, crash_severity)
    } else {
        (Trajectory::Improved, 0.0)
    }
}

/// `early_peaker` when ATH fell within the first 7 days.
pub fn peak_timing(days_to_ath: f64) -> PeakTiming {
    if days_to_ath <= 7.0 {
        PeakTiming::EarlyPeaker
    } else {
        PeakTiming::LatePeaker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn ts(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn roi_basic_cases() {
        assert_eq!(calculate_roi(1.0, 2.0), (100.0, 2.0));
        let (pct, mult) = calculate_roi(1.47, 4.78);
        assert!((pct - 225.17).abs() < 0.01);
        assert!((mult - 3.252).abs() < 0.001);
    }

    #[test]
    fn roi_guards_invalid_prices() {
        assert_eq!(calculate_roi(0.0, 2.0), (0.0, 1.0));
        assert_eq!(calculate_roi(1.0, 0.0), (0.0, 1.0));
        assert_eq!(calculate_roi(-1.0, 2.0), (0.0, 1.0));
    }

    #[test]
    fn ath_updates_only_on_new_high() {
        let mut outcome = SignalOutcome::new(1, "alpha_calls", "0xabc");
        outcome.entry_price = 1.0;
        outcome.entry_timestamp = Some(ts("2024-03-01 00:00:00"));

        assert!(update_ath(&mut outcome, 1.5, ts("2024-03-01 12:00:00")));
        assert_eq!(outcome.ath_price, 1.5);
        assert_eq!(outcome.ath_multiplier, 1.5);
        assert!((outcome.days_to_ath - 0.5).abs() < 1e-9);

        assert!(!update_ath(&mut outcome, 1.2, ts("2024-03-02 00:00:00")));
        assert_eq!(outcome.ath_price, 1.5);
    }

    #[test]
    fn elapsed_checkpoints_marked_in_order() {
        let mut outcome = SignalOutcome::new(1, "alpha_calls", "0xabc");
        outcome.entry_price = 1.0;
        outcome.entry_timestamp = Some(ts("2024-03-01 00:00:00"));

        // 5 hours in: 1h and 4h elapsed, 24h is still in the future.
        let reached = mark_elapsed_checkpoints(&mut outcome, 1.52, ts("2024-03-01 05:00:00"));
        assert_eq!(reached, vec![CheckpointId::H1, CheckpointId::H4]);
        assert!(!outcome.checkpoint(CheckpointId::H24).reached);
        assert_eq!(outcome.checkpoint(CheckpointId::H1).price, 1.52);
        assert_eq!(
            outcome.checkpoint(CheckpointId::H1).timestamp,
            Some(ts("2024-03-01 01:00:00"))
        );

        // Already-reached checkpoints are not rewritten by later prices.
        let reached = mark_elapsed_checkpoints(&mut outcome, 4.78, ts("2024-03-02 01:00:00"));
        assert_eq!(reached, vec![CheckpointId::H24]);
        assert_eq!(outcome.checkpoint(CheckpointId::H1).price, 1.52);
        let cp24 = outcome.checkpoint(CheckpointId::H24);
        assert!((cp24.roi_percentage - 378.0).abs() < 0.01);
    }

    #[test]
    fn stop_conditions() {
        let mut outcome = SignalOutcome::new(1, "alpha_calls", "0xabc");
        outcome.entry_price = 1.0;
        outcome.entry_timestamp = Some(ts("2024-03-01 00:00:00"));
        outcome.ath_price = 2.0;
        outcome.current_price = 1.5;

        assert_eq!(check_stop_conditions(&outcome, ts("2024-03-10 00:00:00")), None);

        // 30 days minus a second keeps tracking; plus a second stops it.
        assert_eq!(
            check_stop_conditions(&outcome, ts("2024-03-30 23:59:59")),
            None
        );
        assert_eq!(
            check_stop_conditions(&outcome, ts("2024-03-31 00:00:01")),
            Some(CompletionReason::ThirtyDaysElapsed)
        );

        // 90% drawdown from ATH.
        outcome.current_price = 0.19;
        assert_eq!(
            check_stop_conditions(&outcome, ts("2024-03-10 00:00:00")),
            Some(CompletionReason::NinetyPercentLoss)
        );
    }

    #[test]
    fn winner_thresholds_are_tier_aware() {
        assert!(is_winner(1.25, MarketTier::Large));
        assert!(!is_winner(1.25, MarketTier::Mid));
        assert!(is_winner(1.55, MarketTier::Mid));
        assert!(!is_winner(1.9, MarketTier::Micro));
        assert!(is_winner(2.0, MarketTier::Small));
    }

    #[test]
    fn outcome_category_ladder() {
        assert_eq!(categorize_outcome(5.2), OutcomeCategory::Moon);
        assert_eq!(categorize_outcome(3.0), OutcomeCategory::Great);
        assert_eq!(categorize_outcome(2.4), OutcomeCategory::Good);
        assert_eq!(categorize_outcome(1.6), OutcomeCategory::Moderate);
        assert_eq!(categorize_outcome(1.0), OutcomeCategory::BreakEven);
        assert_eq!(categorize_outcome(0.4), OutcomeCategory::Loss);
    }

    #[test]
    fn trajectory_considers_ath_drop() {
        // Crashed from 1.04x ATH to 1.00x even though day 30 > day 7.
        let (trajectory, severity) = analyze_trajectory(0.93, 1.0, Some(1.04));
        assert_eq!(trajectory, Trajectory::Crashed);
        assert!((severity - 3.8).abs() < 0.1);

        let (trajectory, severity) = analyze_trajectory(2.0, 3.0, None);
        assert_eq!(trajectory, Trajectory::Improved);
        assert_eq!(severity, 0.0);

        let (trajectory, severity) = analyze_trajectory(2.0, 1.0, None);
        assert_eq!(trajectory, Trajectory::Crashed);
        assert_eq!(severity, 50.0);
    }

    #[test]
    fn peak_timing_boundary_is_day_seven() {
        assert_eq!(peak_timing(7.0), PeakTiming::EarlyPeaker);
        assert_eq!(peak_timing(7.1), PeakTiming::LatePeaker);
    }
}
