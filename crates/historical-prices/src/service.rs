//! Historical price service: point-in-time entry prices and forward OHLC
//! windows with ATH extraction.
//!
//! Provider order mirrors the live engine's preference: daily-bar provider,
//! chain+address historical endpoint, free alternate. Historical fetches can
//! be slow, so each operation runs under its own configurable timeout; on
//! timeout the caller falls back to the current price.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use signal_core::HistoricalPriceData;
use tokio::time::timeout;

use crate::cache::HistoricalCache;
use crate::providers::{AlternateCandleClient, ChainHistoricalClient, DailyCandleClient};

#[derive(Debug, Clone)]
pub struct HistoricalServiceConfig {
    pub daily_candle_api_key: String,
    pub cache_path: PathBuf,
    /// Symbol -> provider slug overrides for the alternate provider.
    pub symbol_mapping_path: Option<PathBuf>,
    pub historical_price_timeout: Duration,
    pub ohlc_fetch_timeout: Duration,
}

impl Default for HistoricalServiceConfig {
    fn default() -> Self {
        Self {
            daily_candle_api_key: String::new(),
            cache_path: PathBuf::from("data/cache/historical_prices.json"),
            symbol_mapping_path: None,
            historical_price_timeout: Duration::from_secs(15),
            ohlc_fetch_timeout: Duration::from_secs(30),
        }
    }
}

pub struct HistoricalPriceService {
    daily: DailyCandleClient,
    chain: ChainHistoricalClient,
    alternate: AlternateCandleClient,
    cache: HistoricalCache,
    symbol_mapping: HashMap<String, String>,
    historical_price_timeout: Duration,
    ohlc_fetch_timeout: Duration,
}

impl HistoricalPriceService {
    pub fn new(config: HistoricalServiceConfig) -> Self {
        let symbol_mapping = config
            .symbol_mapping_path
            .as_deref()
            .and_then(|path| std::fs::read(path).ok())
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();

        Self {
            daily: DailyCandleClient::new(config.daily_candle_api_key.clone()),
            chain: ChainHistoricalClient::new(),
            alternate: AlternateCandleClient::new(),
            cache: HistoricalCache::new(config.cache_path.clone()),
            symbol_mapping,
            historical_price_timeout: config.historical_price_timeout,
            ohlc_fetch_timeout: config.ohlc_fetch_timeout,
        }
    }

    fn slug_for(&self, symbol: &str) -> String {
        self.symbol_mapping
            .get(&symbol.to_uppercase())
            .cloned()
            .unwrap_or_else(|| symbol.to_lowercase())
    }

    /// Candidate instants for the nearest-neighbor search: exact time,
    /// same-day noon, same-day midnight, t-12h, t-24h.
    fn lookback_candidates(t: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut candidates = vec![t];
        if let Some(noon) = t.with_hour(12).and_then(|x| x.with_minute(0)).and_then(|x| x.with_second(0)) {
            candidates.push(noon);
        }
        if let Some(midnight) = t.with_hour(0).and_then(|x| x.with_minute(0)).and_then(|x| x.with_second(0)) {
            candidates.push(midnight);
        }
        candidates.push(t - ChronoDuration::hours(12));
        candidates.push(t - ChronoDuration::hours(24));
        candidates
    }

    /// Nearest-neighbor historical spot price for a message timestamp.
    /// Returns `(price, source)`.
    pub async fn price_at_timestamp(
        &self,
        symbol: &str,
        address: Option<&str>,
        chain: Option<&str>,
        t: DateTime<Utc>,
    ) -> Option<(f64, String)> {
        if let Some(price) = self.cache.get_spot(symbol, t).await {
            tracing::debug!("Spot cache hit for {} at {}", symbol, t);
            return Some((price, format!("{}+cached", DailyCandleClient::SOURCE)));
        }

        let lookup = async {
            for candidate in Self::lookback_candidates(t) {
                match self.daily.price_at(symbol, candidate).await {
                    Ok(Some(price)) => {
                        return Some((price, DailyCandleClient::SOURCE.to_string()))
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!("Daily-candle spot failed for {}: {}", symbol, e);
                        continue;
                    }
                }
            }

            // Second choice: chain+address historical endpoint.
            if let (Some(address), Some(chain)) = (address, chain) {
                match self.chain.price_at(chain, address, t).await {
                    Ok(Some(price)) => {
                        return Some((price, ChainHistoricalClient::SOURCE.to_string()))
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!("Chain historical spot failed: {}", e),
                }
            }
            None
        };

        match timeout(self.historical_price_timeout, lookup).await {
            Ok(Some((price, source))) => {
                self.cache.put_spot(symbol, t, price).await;
                tracing::info!(
                    "Historical entry price for {}: ${:.6} (source: {})",
                    symbol,
                    price,
                    source
                );
                Some((price, source))
            }
            Ok(None) => {
                tracing::warn!("No historical price for {} at {}", symbol, t);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Historical price fetch timed out after {:?} for {}",
                    self.historical_price_timeout,
                    symbol
                );
                None
            }
        }
    }

    /// Daily OHLC for `[t, t + window_days]` with in-window ATH extraction.
    pub async fn forward_ohlc_with_ath(
        &self,
        symbol: &str,
        address: Option<&str>,
        chain: Option<&str>,
        t: DateTime<Utc>,
        window_days: u32,
    ) -> Option<HistoricalPriceData> {
        if let Some(hit) = self.cache.get_window(symbol, t, window_days).await {
            tracing::debug!("OHLC cache hit for {} ({}d window)", symbol, window_days);
            return Some(hit);
        }

        let fetch = async {
            match self.daily.ohlc_window(symbol, t, window_days).await {
                Ok(Some(window)) => return Some(window),
                Ok(None) => {}
                Err(e) => tracing::debug!("Daily OHLC failed for {}: {}", symbol, e),
            }

            if let (Some(address), Some(chain)) = (address, chain) {
                match self.chain.chart_window(chain, address, t, window_days).await {
                    Ok(Some(mut window)) => {
                        if window.symbol.is_empty() {
                            window.symbol = symbol.to_uppercase();
                        }
                        return Some(window);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!("Chain chart failed for {}: {}", symbol, e),
                }
            }

            let slug = self.slug_for(symbol);
            match self
                .alternate
                .history_window(&slug, symbol, t, window_days)
                .await
            {
                Ok(Some(window)) => Some(window),
                Ok(None) => None,
                Err(e) => {
                    tracing::debug!("Alternate history failed for {}: {}", symbol, e);
                    None
                }
            }
        };

        match timeout(self.ohlc_fetch_timeout, fetch).await {
            Ok(Some(window)) => {
                self.cache.put_window(symbol, t, window_days, &window).await;
                tracing::info!(
                    "OHLC window for {}: {} candles, ATH ${:.6} on day {:.1} ({})",
                    symbol,
                    window.candles.len(),
                    window.ath_in_window,
                    window.days_to_ath,
                    window.source
                );
                Some(window)
            }
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(
                    "OHLC fetch timed out after {:?} for {}",
                    self.ohlc_fetch_timeout,
                    symbol
                );
                None
            }
        }
    }
}
