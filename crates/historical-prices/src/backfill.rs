//! Smart checkpoint backfilling from OHLC windows.
//!
//! For a message aged `age`, only checkpoints whose interval has already
//! elapsed are populated. Each takes the candle closest to
//! `entry + interval`, records its close, and recomputes ROI.

use chrono::{DateTime, Utc};
use signal_core::roi;
use signal_core::{Candle, CheckpointId, HistoricalPriceData, SignalOutcome};

fn closest_candle<'a>(candles: &'a [Candle], target: DateTime<Utc>) -> Option<&'a Candle> {
    candles.iter().min_by_key(|c| {
        (c.timestamp - target).num_seconds().abs()
    })
}

/// Populate elapsed checkpoints on `outcome` from an OHLC window, and fold
/// the window's ATH into the outcome's ATH state. Returns the checkpoints
/// that were filled.
pub fn backfill_checkpoints(
    outcome: &mut SignalOutcome,
    window: &HistoricalPriceData,
    now: DateTime<Utc>,
) -> Vec<CheckpointId> {
    let Some(entry_ts) = outcome.entry_timestamp else {
        return Vec::new();
    };
    if window.candles.is_empty() {
        return Vec::new();
    }

    let age = now - entry_ts;
    let entry_price = outcome.entry_price;
    let mut filled = Vec::new();

    for id in CheckpointId::ALL {
        if outcome.checkpoint(id).reached || id.interval() > age {
            continue;
        }
        let target = entry_ts + id.interval();
        let Some(candle) = closest_candle(&window.candles, target) else {
            continue;
        };

        let price = candle.close;
        let (roi_percentage, roi_multiplier) = roi::calculate_roi(entry_price, price);
        let checkpoint = outcome.checkpoint_mut(id);
        checkpoint.timestamp = Some(target);
        checkpoint.price = price;
        checkpoint.roi_percentage = roi_percentage;
        checkpoint.roi_multiplier = roi_multiplier;
        checkpoint.reached = true;
        filled.push(id);

        tracing::debug!(
            "Backfilled checkpoint {}: ${:.6} ({:.3}x)",
            id.label(),
            price,
            roi_multiplier
        );
    }

    // The window's high is authoritative for the period it covers.
    if window.ath_in_window > outcome.ath_price {
        roi::update_ath(outcome, window.ath_in_window, window.ath_timestamp);
        outcome.days_to_ath = window.days_to_ath;
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn window(entry_ts: DateTime<Utc>) -> HistoricalPriceData {
        // Daily closes: day 0 -> 1.0 open, then rising to a day-2 peak.
        let closes = [1.1, 1.89, 4.78, 3.0, 2.0, 1.5, 1.2, 1.0];
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: entry_ts + Duration::days(i as i64),
                open: if i == 0 { 1.0 } else { closes[i - 1] },
                high: close * 1.05,
                low: close * 0.9,
                close: *close,
                volume: None,
            })
            .collect();

        let ath_candle = 2usize;
        HistoricalPriceData {
            symbol: "PEPE".to_string(),
            price_at_timestamp: 1.0,
            ath_in_window: candles[ath_candle].high,
            ath_timestamp: candles[ath_candle].timestamp,
            days_to_ath: ath_candle as f64,
            candles,
            source: "cryptocompare".to_string(),
            cached: false,
        }
    }

    fn entry() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn only_elapsed_checkpoints_fill() {
        let entry_ts = entry();
        let mut outcome = SignalOutcome::new(1, "alpha_calls", "0xabc");
        outcome.entry_price = 1.0;
        outcome.entry_timestamp = Some(entry_ts);

        // Message is 4 days old: 1h, 4h, 24h, 3d elapsed; 7d and 30d have not.
        let now = entry_ts + Duration::days(4);
        let filled = backfill_checkpoints(&mut outcome, &window(entry_ts), now);

        assert_eq!(
            filled,
            vec![
                CheckpointId::H1,
                CheckpointId::H4,
                CheckpointId::H24,
                CheckpointId::D3
            ]
        );
        assert!(!outcome.checkpoint(CheckpointId::D7).reached);
        assert!(!outcome.checkpoint(CheckpointId::D30).reached);
    }

    #[test]
    fn checkpoint_takes_closest_candle_close() {
        let entry_ts = entry();
        let mut outcome = SignalOutcome::new(1, "alpha_calls", "0xabc");
        outcome.entry_price = 1.0;
        outcome.entry_timestamp = Some(entry_ts);

        let now = entry_ts + Duration::days(40);
        backfill_checkpoints(&mut outcome, &window(entry_ts), now);

        // 24h checkpoint lands exactly on the day-1 candle.
        let cp = outcome.checkpoint(CheckpointId::H24);
        assert_eq!(cp.price, 1.89);
        assert!((cp.roi_multiplier - 1.89).abs() < 1e-9);

        // 1h checkpoint is closest to the day-0 candle.
        assert_eq!(outcome.checkpoint(CheckpointId::H1).price, 1.1);

        // 30d is past the window end; closest candle is the last one.
        assert_eq!(outcome.checkpoint(CheckpointId::D30).price, 1.0);
    }

    #[test]
    fn window_ath_folds_into_outcome() {
        let entry_ts = entry();
        let mut outcome = SignalOutcome::new(1, "alpha_calls", "0xabc");
        outcome.entry_price = 1.0;
        outcome.entry_timestamp = Some(entry_ts);

        let w = window(entry_ts);
        backfill_checkpoints(&mut outcome, &w, entry_ts + Duration::days(40));

        assert_eq!(outcome.ath_price, w.ath_in_window);
        assert!((outcome.ath_multiplier - w.ath_in_window).abs() < 1e-9);
        assert_eq!(outcome.days_to_ath, 2.0);
    }
}
