//! Periodic reputation maintenance.
//!
//! Every cycle (default 30 minutes): archive actives past the tracking
//! window (computing their terminal fields from OHLC first when missing),
//! recompute reputations for channels with completed outcomes, and republish
//! the reputation and cross-channel snapshots to the sinks. A failed cycle
//! retries after five minutes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use data_sinks::DataSinks;
use historical_prices::{backfill_checkpoints, HistoricalPriceService};
use outcome_tracker::OutcomeTracker;
use reputation_engine::{CrossChannelRepo, ReputationEngine};
use signal_core::roi;
use signal_core::SignalError;
use tokio::sync::watch;

const RETRY_DELAY: Duration = Duration::from_secs(300);

pub struct ReputationScheduler {
    pub tracker: Arc<OutcomeTracker>,
    pub reputation: Arc<ReputationEngine>,
    pub cross_channel: Arc<CrossChannelRepo>,
    pub historical: Arc<HistoricalPriceService>,
    pub sinks: Arc<DataSinks>,
    pub interval: Duration,
}

impl ReputationScheduler {
    /// Run until the shutdown signal flips. Obeys cancellation between
    /// cycles, never mid-persist.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Reputation scheduler started (interval: {}s)",
            self.interval.as_secs()
        );

        let mut delay = self.interval;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            delay = match self.cycle().await {
                Ok(()) => self.interval,
                Err(e) => {
                    tracing::error!("Scheduler cycle failed: {}; retrying in 5 minutes", e);
                    RETRY_DELAY
                }
            };
        }
        tracing::info!("Reputation scheduler stopped");
    }

    /// One maintenance pass. Public so shutdown and tests can run it
    /// directly.
    pub async fn cycle(&self) -> Result<(), SignalError> {
        let now = Utc::now();

        // 1. Backfill terminal data for expired actives, then archive them.
        for address in self.tracker.active_addresses().await {
            let Some(outcome) = self.tracker.get_active(&address).await else {
                continue;
            };
            let Some(entry_ts) = outcome.entry_timestamp else {
                continue;
            };
            if now - entry_ts < roi::tracking_window() {
                continue;
            }

            let needs_ohlc = outcome
                .checkpoints
                .values()
                .any(|checkpoint| !checkpoint.reached);
            if needs_ohlc {
                let chain = if address.starts_with("0x") {
                    "ethereum"
                } else {
                    "solana"
                };
                if let Some(symbol) = outcome.symbol.as_deref() {
                    if let Some(window) = self
                        .historical
                        .forward_ohlc_with_ath(symbol, Some(&address), Some(chain), entry_ts, 30)
                        .await
                    {
                        self.tracker
                            .mutate(&address, |o| {
                                backfill_checkpoints(o, &window, now);
                            })
                            .await?;
                    }
                }
            }
        }
        let archived = self.tracker.archive_expired(now).await?;
        for address in &archived {
            if let Some(outcome) = self.tracker.get_completed(address).await {
                if self.sinks.upsert_performance(&outcome).await.is_err() {
                    tracing::warn!("Failed to publish archived signal {}", address);
                }
            }
        }

        // 2. Recompute reputations for channels with completed outcomes.
        let channels = self.tracker.channels_with_completions().await;
        let mut updated = 0usize;
        for channel in channels {
            let outcomes = self.tracker.completed_for_channel(&channel).await;
            if !outcomes.is_empty() {
                self.reputation.update_channel(&channel, &outcomes, now);
                updated += 1;
            }
        }
        if updated > 0 {
            self.reputation.save()?;
            tracing::info!("Updated {} channel reputation(s)", updated);
        }

        // 3. Rebuild cross-channel records and republish both snapshots.
        let completed = self.tracker.completed_outcomes().await;
        if !completed.is_empty() {
            self.cross_channel.rebuild(&completed, now);
            self.cross_channel.save()?;
        }

        let reputations = self.reputation.all();
        if !reputations.is_empty() {
            self.sinks.upsert_reputations(&reputations).await?;
        }
        let coins = self.cross_channel.all();
        if !coins.is_empty() {
            self.sinks.upsert_cross_channel(&coins).await?;
        }

        Ok(())
    }
}
