use chrono::{Duration, Utc};
use signal_core::{CheckpointId, CompletionReason, MarketTier, OutcomeCategory, Sentiment};

use crate::{Admission, NewSignal, OutcomeTracker, PriceUpdate};

fn tracker(dir: &tempfile::TempDir) -> OutcomeTracker {
    OutcomeTracker::new(
        dir.path().join("active_tracking.json"),
        dir.path().join("completed_history.json"),
    )
}

fn signal(address: &str, message_id: i64, entry_price: f64) -> NewSignal {
    NewSignal {
        message_id,
        channel_name: "alpha_calls".to_string(),
        address: address.to_string(),
        symbol: Some("PEPE".to_string()),
        entry_price,
        entry_timestamp: Utc::now() - Duration::hours(25),
        entry_confidence: 0.8,
        entry_source: "dexscreener".to_string(),
        sentiment: Sentiment::Positive,
        sentiment_score: 0.8,
        hdrb_score: 55.0,
        confidence: 0.75,
        market_tier: MarketTier::Micro,
        risk_level: None,
        risk_score: 80.0,
    }
}

const ADDR: &str = "0xAbC0000000000000000000000000000000000001";

#[tokio::test]
async fn duplicate_admission_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let t = tracker(&dir);

    assert_eq!(t.check_admission(ADDR).await, Admission::First);
    t.track_signal(signal(ADDR, 1, 1.0)).await.unwrap().unwrap();

    // Same address, different casing: still a duplicate (I1).
    assert_eq!(
        t.check_admission(&ADDR.to_uppercase().replace("0X", "0x")).await,
        Admission::Duplicate
    );
    assert!(t.track_signal(signal(ADDR, 2, 1.1)).await.unwrap().is_none());

    let (active, _) = t.counts().await;
    assert_eq!(active, 1);
}

#[tokio::test]
async fn canonical_fresh_start_trajectory() {
    let dir = tempfile::tempdir().unwrap();
    let t = tracker(&dir);

    let entry_ts = Utc::now() - Duration::hours(25);
    let mut s = signal(ADDR, 1, 1.0);
    s.entry_timestamp = entry_ts;
    t.track_signal(s).await.unwrap().unwrap();

    // Prices at 1h, 4h, 24h after entry.
    let u1 = t
        .update_price(ADDR, 1.52, entry_ts + Duration::hours(1))
        .await
        .unwrap();
    match u1 {
        PriceUpdate::Updated {
            checkpoints_reached,
            new_ath,
        } => {
            assert_eq!(checkpoints_reached, vec![CheckpointId::H1]);
            assert!(new_ath);
        }
        other => panic!("unexpected update: {:?}", other),
    }

    t.update_price(ADDR, 1.89, entry_ts + Duration::hours(4))
        .await
        .unwrap();
    t.update_price(ADDR, 4.78, entry_ts + Duration::hours(24))
        .await
        .unwrap();

    let outcome = t.get_active(ADDR).await.unwrap();
    assert_eq!(outcome.ath_multiplier, 4.78);
    assert!((outcome.days_to_ath - 1.0).abs() < 1e-9);
    let cp24 = outcome.checkpoint(CheckpointId::H24);
    assert!(cp24.reached);
    assert!((cp24.roi_percentage - 378.0).abs() < 0.01);
    // Micro tier needs 2x; 4.78x is a winner once finalized.
    let completed = t
        .finalize(ADDR, CompletionReason::ThirtyDaysElapsed, entry_ts + Duration::days(30))
        .await
        .unwrap()
        .unwrap();
    assert!(completed.is_winner);
    assert_eq!(completed.outcome_category, Some(OutcomeCategory::Great));
}

#[tokio::test]
async fn fresh_start_increments_signal_number() {
    let dir = tempfile::tempdir().unwrap();
    let t = tracker(&dir);

    t.track_signal(signal(ADDR, 101, 1.0)).await.unwrap().unwrap();
    t.finalize(ADDR, CompletionReason::ThirtyDaysElapsed, Utc::now())
        .await
        .unwrap()
        .unwrap();

    match t.check_admission(ADDR).await {
        Admission::FreshStart {
            signal_number,
            previous_signals,
        } => {
            assert_eq!(signal_number, 2);
            assert_eq!(previous_signals, vec![101]);
        }
        other => panic!("expected fresh start, got {:?}", other),
    }

    let second = t.track_signal(signal(ADDR, 202, 0.5)).await.unwrap().unwrap();
    assert_eq!(second.signal_number, 2);
    assert_eq!(second.previous_signals, vec![101]);

    // The address now sits in both stores with active number > completed (I1).
    let (active, completed) = t.counts().await;
    assert_eq!((active, completed), (1, 1));
}

#[tokio::test]
async fn ninety_percent_drawdown_completes() {
    let dir = tempfile::tempdir().unwrap();
    let t = tracker(&dir);

    let entry_ts = Utc::now() - Duration::hours(25);
    let mut s = signal(ADDR, 1, 1.0);
    s.entry_timestamp = entry_ts;
    t.track_signal(s).await.unwrap().unwrap();
    t.update_price(ADDR, 10.0, entry_ts + Duration::hours(2))
        .await
        .unwrap();

    let update = t
        .update_price(ADDR, 0.9, entry_ts + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(update, PriceUpdate::Completed(CompletionReason::NinetyPercentLoss));

    let completed = t.get_completed(ADDR).await.unwrap();
    assert!(completed.is_complete);
    assert_eq!(
        completed.completion_reason,
        Some(CompletionReason::NinetyPercentLoss)
    );
    // The peak still counts: ATH 10x makes this a tier-aware winner.
    assert!(completed.is_winner);
}

#[tokio::test]
async fn archival_preserves_total_count() {
    let dir = tempfile::tempdir().unwrap();
    let t = tracker(&dir);

    let mut old = signal(ADDR, 1, 1.0);
    old.entry_timestamp = Utc::now() - Duration::days(31);
    t.track_signal(old).await.unwrap().unwrap();

    let fresh_addr = "0xAbC0000000000000000000000000000000000002";
    t.track_signal(signal(fresh_addr, 2, 1.0)).await.unwrap().unwrap();

    let (active_before, completed_before) = t.counts().await;
    let archived = t.archive_expired(Utc::now()).await.unwrap();
    let (active_after, completed_after) = t.counts().await;

    assert_eq!(archived.len(), 1);
    assert_eq!(
        active_before + completed_before,
        active_after + completed_after
    );
    assert!(t.get_active(ADDR).await.is_none());
    assert!(t.get_completed(ADDR).await.is_some());
    assert!(t.get_active(fresh_addr).await.is_some());
}

#[tokio::test]
async fn store_round_trips_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let entry_ts = Utc::now() - Duration::hours(25);
    {
        let t = tracker(&dir);
        let mut s = signal(ADDR, 1, 1.47);
        s.entry_timestamp = entry_ts;
        t.track_signal(s).await.unwrap().unwrap();
        t.update_price(ADDR, 4.78, entry_ts + Duration::hours(24))
            .await
            .unwrap();
    }

    let reloaded = tracker(&dir);
    let outcome = reloaded.get_active(ADDR).await.unwrap();
    assert_eq!(outcome.entry_price, 1.47);
    assert!((outcome.current_multiplier - 4.78 / 1.47).abs() < 1e-9);
    assert!(outcome.checkpoint(CheckpointId::H24).reached);
}

#[tokio::test]
async fn day_snapshots_and_trajectory_on_finalize() {
    let dir = tempfile::tempdir().unwrap();
    let t = tracker(&dir);

    let entry_ts = Utc::now() - Duration::days(31);
    let mut s = signal(ADDR, 1, 1.0);
    s.entry_timestamp = entry_ts;
    t.track_signal(s).await.unwrap().unwrap();

    // Peak at day 2, fade into day 30.
    t.update_price(ADDR, 3.0, entry_ts + Duration::days(2)).await.unwrap();
    t.update_price(ADDR, 2.0, entry_ts + Duration::days(7)).await.unwrap();
    let update = t
        .update_price(ADDR, 1.5, entry_ts + Duration::days(30))
        .await
        .unwrap();
    assert_eq!(
        update,
        PriceUpdate::Completed(CompletionReason::ThirtyDaysElapsed)
    );

    let completed = t.get_completed(ADDR).await.unwrap();
    assert_eq!(completed.day_7_multiplier, 2.0);
    assert_eq!(completed.day_30_multiplier, 1.5);
    assert_eq!(completed.trajectory, Some(signal_core::Trajectory::Crashed));
    assert_eq!(
        completed.peak_timing,
        Some(signal_core::PeakTiming::EarlyPeaker)
    );
}
