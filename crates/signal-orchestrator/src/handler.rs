//! The per-message pipeline: detect, score, resolve, filter, price, track.
//!
//! Invoked by the queue consumer. A failure on one address never fails the
//! message; a failure in one message never fails the process. Per-address
//! errors are captured on the outcome record where one exists.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{Duration, Utc};
use crypto_detectors::{AddressExtractor, MentionDetector};
use data_sinks::DataSinks;
use historical_prices::{backfill_checkpoints, HistoricalPriceService};
use outcome_tracker::{Admission, NewSignal, OutcomeTracker, PriceUpdate};
use price_engine::{DeadTokenDetector, PairResolver, PriceEngine};
use reputation_engine::ReputationEngine;
use signal_core::{
    Address, CompletionReason, MarketTier, MessageEvent, PriceData, ReputationView, Sentiment,
    SentimentAnalyzer, SignalError,
};
use signal_scoring::{ConfidenceCalculator, HdrbScorer};
use token_filter::{is_major_token, TokenFilter};

use crate::report::{render_message_block, VerificationReport};

/// Message age at or beyond which a signal completes immediately from OHLC.
fn historical_cutoff() -> Duration {
    Duration::days(30)
}

/// Message age under which the current price doubles as the entry price.
fn fresh_entry_window() -> Duration {
    Duration::hours(1)
}

pub struct MessageHandler {
    pub detector: MentionDetector,
    pub filter: Mutex<TokenFilter>,
    pub resolver: PairResolver,
    pub price_engine: PriceEngine,
    pub historical: Arc<HistoricalPriceService>,
    pub hdrb: HdrbScorer,
    pub sentiment: Arc<dyn SentimentAnalyzer>,
    pub confidence: ConfidenceCalculator,
    pub tracker: Arc<OutcomeTracker>,
    pub dead_tokens: Arc<DeadTokenDetector>,
    pub reputation: Arc<ReputationEngine>,
    pub sinks: Arc<DataSinks>,
    pub report: Arc<VerificationReport>,
}

impl MessageHandler {
    pub async fn handle(&self, event: MessageEvent) -> Result<(), SignalError> {
        let started = Instant::now();

        let mentions = self.detector.detect_mentions(&event.text);
        if !self.detector.is_crypto_relevant(&event.text, &mentions) {
            self.report.record_skipped();
            return Ok(());
        }

        let addresses = AddressExtractor::extract(&mentions);

        // Market commentary about majors without an address is not a signal.
        if addresses.is_empty() {
            let commentary = {
                let mut filter = self.filter.lock().unwrap_or_else(|e| e.into_inner());
                mentions
                    .iter()
                    .filter(|m| is_major_token(m))
                    .any(|m| !filter.should_process_symbol(m, &event.text))
            };
            if commentary {
                self.report.record_skipped();
                return Ok(());
            }
        }

        let hdrb = self.hdrb.calculate_score(&event.engagement);
        let (sentiment, sentiment_score) = self.sentiment.analyze(&event.text);
        let confidence = self.confidence.score(
            hdrb.normalized,
            mentions.len(),
            sentiment_score,
            event.text.chars().count(),
            Some(self.reputation.as_ref() as &dyn ReputationView),
            &event.channel_name,
        );

        let sentiment_label = match sentiment {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        };
        if self
            .sinks
            .messages
            .append(
                &event,
                &mentions,
                hdrb.normalized,
                sentiment_label,
                sentiment_score,
                confidence.adjusted,
            )
            .await
            .is_err()
        {
            self.report.record_sink_error();
        }

        let resolved = self.resolver.resolve_all(addresses).await;
        for address in resolved.iter().filter(|a| a.valid) {
            if let Err(e) = self
                .process_address(
                    &event,
                    address,
                    sentiment,
                    sentiment_score,
                    hdrb.normalized,
                    confidence.adjusted,
                )
                .await
            {
                tracing::warn!(
                    "Address {} from message {} failed: {}",
                    address.raw,
                    event.message_id,
                    e
                );
                self.report.record_error();
                let note = e.to_string();
                let _ = self
                    .tracker
                    .mutate(&address.raw, |outcome| outcome.error = Some(note))
                    .await;
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        println!(
            "{}",
            render_message_block(
                &event.channel_name,
                event.message_id,
                hdrb.normalized,
                hdrb.raw_ic,
                &mentions,
                resolved.iter().filter(|a| a.valid).count(),
                sentiment,
                sentiment_score,
                confidence.adjusted,
                confidence.label,
                elapsed_ms,
            )
        );
        self.report.record_processed(sentiment, elapsed_ms);
        Ok(())
    }

    async fn process_address(
        &self,
        event: &MessageEvent,
        address: &Address,
        sentiment: Sentiment,
        sentiment_score: f64,
        hdrb_score: f64,
        confidence: f64,
    ) -> Result<(), SignalError> {
        let now = Utc::now();
        let chain_specific = address.chain_specific.as_deref().unwrap_or("ethereum");

        let admission = self.tracker.check_admission(&address.raw).await;

        // Blacklisted tokens skip the price fan-out; tracking itself is not
        // suppressed. A nominal dead-token record stands in for the missing
        // price so admission still opens an expected-failure signal.
        let blacklisted = self.dead_tokens.is_blacklisted(&address.raw);
        let price_data = if blacklisted {
            tracing::info!(
                "Skipping price fetch for blacklisted token {} ({}); tracking with nominal price",
                address.raw,
                self.dead_tokens
                    .blacklist_reason(&address.raw)
                    .unwrap_or_default()
            );
            Some(PriceData::dead_token(&address.raw))
        } else {
            self.price_engine
                .get_price(&address.raw, address.family)
                .await
        };

        if admission == Admission::Duplicate {
            if let Some(price) = price_data.as_ref().map(|d| d.price_usd).filter(|p| *p > 0.0) {
                match self.tracker.update_price(&address.raw, price, now).await? {
                    PriceUpdate::Completed(reason) => {
                        tracing::info!("Signal for {} completed: {:?}", address.raw, reason);
                        if let Some(outcome) = self.tracker.get_completed(&address.raw).await {
                            if self.sinks.upsert_performance(&outcome).await.is_err() {
                                self.report.record_sink_error();
                            }
                        }
                    }
                    PriceUpdate::Updated {
                        checkpoints_reached,
                        ..
                    } if !checkpoints_reached.is_empty() => {
                        if let Some(outcome) = self.tracker.get_active(&address.raw).await {
                            if self.sinks.upsert_performance(&outcome).await.is_err() {
                                self.report.record_sink_error();
                            }
                        }
                    }
                    _ => {}
                }
            }
            return Ok(());
        }

        // Messages already past the tracking window complete from OHLC and
        // do not need a live price.
        let age = now - event.timestamp;
        if age >= historical_cutoff() {
            let symbol = price_data
                .as_ref()
                .and_then(|d| d.symbol.clone())
                .or_else(|| address.ticker.clone());
            return self
                .admit_historical(
                    event,
                    address,
                    symbol,
                    price_data.as_ref(),
                    sentiment,
                    sentiment_score,
                    hdrb_score,
                    confidence,
                )
                .await;
        }

        // No live price anywhere: consult the dead-token detector and stop.
        let price_data = match price_data.filter(|d| d.price_usd > 0.0) {
            Some(data) => data,
            None => {
                if !blacklisted {
                    let health = self
                        .dead_tokens
                        .check_token(&address.raw, chain_specific, address.is_pool, false)
                        .await;
                    if health.is_dead {
                        tracing::info!(
                            "Dead token {}: {}",
                            address.raw,
                            health.reason.unwrap_or_default()
                        );
                    }
                }
                return Ok(());
            }
        };

        let synthetic = price_data.is_dead_token_placeholder();
        let symbol = price_data
            .symbol
            .clone()
            .or_else(|| address.ticker.clone());

        // Scam filter: a major symbol must sit at its canonical address and
        // inside its expected price band. The nominal dead-token record is
        // exempt from the market-data thresholds; failing is its job.
        if let Some(symbol) = symbol.as_deref() {
            let verdict = {
                let mut filter = self.filter.lock().unwrap_or_else(|e| e.into_inner());
                filter.check_major_token_address(
                    symbol,
                    &address.raw,
                    chain_specific,
                    Some(price_data.price_usd),
                )
            };
            if !verdict.0 {
                tracing::info!(
                    "Filtered {} ({}): {}",
                    symbol,
                    address.raw,
                    verdict.1.unwrap_or_default()
                );
                return Ok(());
            }

            if !synthetic {
                let verdict = {
                    let mut filter = self.filter.lock().unwrap_or_else(|e| e.into_inner());
                    filter.check_market_data(
                        symbol,
                        Some(price_data.price_usd),
                        price_data.market_cap,
                        None,
                    )
                };
                if !verdict.0 {
                    tracing::info!(
                        "Filtered {} ({}): {}",
                        symbol,
                        address.raw,
                        verdict.1.unwrap_or_default()
                    );
                    return Ok(());
                }
            }
        }

        // Entry price: live for fresh messages, historical lookup otherwise.
        // The placeholder price is its own entry; there is nothing to look up.
        let (entry_price, entry_source) = if synthetic {
            (price_data.price_usd, price_data.source.clone())
        } else if age <= fresh_entry_window() {
            (price_data.price_usd, "current_price".to_string())
        } else {
            match symbol.as_deref() {
                Some(symbol) => {
                    match self
                        .historical
                        .price_at_timestamp(
                            symbol,
                            Some(&address.raw),
                            Some(chain_specific),
                            event.timestamp,
                        )
                        .await
                    {
                        Some((price, source)) => (price, source),
                        None => (price_data.price_usd, "fallback".to_string()),
                    }
                }
                None => (price_data.price_usd, "fallback".to_string()),
            }
        };

        let new_signal = NewSignal {
            message_id: event.message_id,
            channel_name: event.channel_name.clone(),
            address: address.raw.clone(),
            symbol: symbol.clone(),
            entry_price,
            entry_timestamp: event.timestamp,
            entry_confidence: confidence,
            entry_source,
            sentiment,
            sentiment_score,
            hdrb_score,
            confidence,
            market_tier: price_data.market_tier.unwrap_or(MarketTier::Unknown),
            risk_level: price_data.risk_level,
            risk_score: price_data.risk_score.unwrap_or(0.0),
        };

        let Some(_) = self.tracker.track_signal(new_signal).await? else {
            return Ok(());
        };

        // Aged messages: reconstruct the elapsed checkpoints from OHLC and
        // roll the current price in. The placeholder symbol resolves nowhere,
        // so dead-token signals skip the reconstruction.
        if age > fresh_entry_window() && !synthetic {
            if let Some(symbol) = symbol.as_deref() {
                let window_days = (age.num_days() + 1).clamp(1, 30) as u32;
                if let Some(window) = self
                    .historical
                    .forward_ohlc_with_ath(
                        symbol,
                        Some(&address.raw),
                        Some(chain_specific),
                        event.timestamp,
                        window_days,
                    )
                    .await
                {
                    self.tracker
                        .mutate(&address.raw, |outcome| {
                            backfill_checkpoints(outcome, &window, now);
                        })
                        .await?;
                }
            }
            if let PriceUpdate::Completed(reason) = self
                .tracker
                .update_price(&address.raw, price_data.price_usd, now)
                .await?
            {
                tracing::info!(
                    "Signal for {} completed at admission: {:?}",
                    address.raw,
                    reason
                );
            }
        }

        let record = self
            .tracker
            .get_active(&address.raw)
            .await
            .or(self.tracker.get_completed(&address.raw).await);
        if let Some(outcome) = record {
            if self.sinks.upsert_performance(&outcome).await.is_err() {
                self.report.record_sink_error();
            }
        }
        Ok(())
    }

    /// Messages already past the tracking window complete in one shot from
    /// the OHLC record.
    #[allow(clippy::too_many_arguments)]
    async fn admit_historical(
        &self,
        event: &MessageEvent,
        address: &Address,
        symbol: Option<String>,
        price_data: Option<&PriceData>,
        sentiment: Sentiment,
        sentiment_score: f64,
        hdrb_score: f64,
        confidence: f64,
    ) -> Result<(), SignalError> {
        let now = Utc::now();
        let chain_specific = address.chain_specific.as_deref().unwrap_or("ethereum");

        let Some(symbol) = symbol else {
            tracing::debug!(
                "Historical message for {} has no symbol; cannot resolve OHLC",
                address.raw
            );
            return Ok(());
        };

        // The scam gate applies to aged mentions too.
        let verdict = {
            let mut filter = self.filter.lock().unwrap_or_else(|e| e.into_inner());
            filter.check_major_token_address(
                &symbol,
                &address.raw,
                chain_specific,
                price_data.map(|d| d.price_usd).filter(|p| *p > 0.0),
            )
        };
        if !verdict.0 {
            tracing::info!(
                "Filtered historical {} ({}): {}",
                symbol,
                address.raw,
                verdict.1.unwrap_or_default()
            );
            return Ok(());
        }

        let Some(window) = self
            .historical
            .forward_ohlc_with_ath(
                &symbol,
                Some(&address.raw),
                Some(chain_specific),
                event.timestamp,
                30,
            )
            .await
        else {
            tracing::debug!("No OHLC window for historical {} signal", symbol);
            return Ok(());
        };

        let new_signal = NewSignal {
            message_id: event.message_id,
            channel_name: event.channel_name.clone(),
            address: address.raw.clone(),
            symbol: Some(symbol),
            entry_price: window.price_at_timestamp,
            entry_timestamp: event.timestamp,
            entry_confidence: confidence,
            entry_source: window.source.clone(),
            sentiment,
            sentiment_score,
            hdrb_score,
            confidence,
            market_tier: price_data
                .and_then(|d| d.market_tier)
                .unwrap_or(MarketTier::Unknown),
            risk_level: price_data.and_then(|d| d.risk_level),
            risk_score: price_data.and_then(|d| d.risk_score).unwrap_or(0.0),
        };

        if self.tracker.track_signal(new_signal).await?.is_none() {
            return Ok(());
        }

        self.tracker
            .mutate(&address.raw, |outcome| {
                backfill_checkpoints(outcome, &window, now);
                if let Some(last) = window.candles.last() {
                    outcome.current_price = last.close;
                    let (_, multiplier) =
                        signal_core::roi::calculate_roi(outcome.entry_price, last.close);
                    outcome.current_multiplier = multiplier;
                }
            })
            .await?;

        let completed = self
            .tracker
            .finalize(&address.raw, CompletionReason::Historical, now)
            .await?;

        if let Some(outcome) = completed {
            tracing::info!(
                "Historical signal completed: {} ATH {:.3}x in {:.1} days",
                outcome.symbol.as_deref().unwrap_or("?"),
                outcome.ath_multiplier,
                outcome.days_to_ath
            );
            if self.sinks.upsert_performance(&outcome).await.is_err() {
                self.report.record_sink_error();
            }
        }
        Ok(())
    }
}
