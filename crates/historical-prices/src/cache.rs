//! Disk cache for historical lookups.
//!
//! OHLC windows are keyed by `(symbol, window_start_day, window_days)`, spot
//! prices by `(symbol, day)`. Records read from the cache come back with
//! `cached = true`. The backing file uses the atomic write protocol.

use std::collections::BTreeMap;
use std::path::PathBuf;

use atomic_store::JsonStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signal_core::HistoricalPriceData;
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    windows: BTreeMap<String, HistoricalPriceData>,
    #[serde(default)]
    spots: BTreeMap<String, f64>,
}

pub struct HistoricalCache {
    store: JsonStore,
    state: Mutex<CacheFile>,
}

impl HistoricalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let store = JsonStore::new(path);
        let state: CacheFile = store.load();
        if !state.windows.is_empty() || !state.spots.is_empty() {
            tracing::info!(
                "Historical cache loaded: {} windows, {} spot prices",
                state.windows.len(),
                state.spots.len()
            );
        }
        Self {
            store,
            state: Mutex::new(state),
        }
    }

    fn window_key(symbol: &str, start: DateTime<Utc>, window_days: u32) -> String {
        format!("{}|{}|{}", symbol.to_uppercase(), start.format("%Y-%m-%d"), window_days)
    }

    fn spot_key(symbol: &str, at: DateTime<Utc>) -> String {
        format!("{}|{}", symbol.to_uppercase(), at.format("%Y-%m-%d"))
    }

    pub async fn get_window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        window_days: u32,
    ) -> Option<HistoricalPriceData> {
        let state = self.state.lock().await;
        state
            .windows
            .get(&Self::window_key(symbol, start, window_days))
            .map(|data| {
                let mut hit = data.clone();
                hit.cached = true;
                hit
            })
    }

    pub async fn put_window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        window_days: u32,
        data: &HistoricalPriceData,
    ) {
        let mut state = self.state.lock().await;
        state
            .windows
            .insert(Self::window_key(symbol, start, window_days), data.clone());
        self.persist(&state);
    }

    pub async fn get_spot(&self, symbol: &str, at: DateTime<Utc>) -> Option<f64> {
        let state = self.state.lock().await;
        state.spots.get(&Self::spot_key(symbol, at)).copied()
    }

    pub async fn put_spot(&self, symbol: &str, at: DateTime<Utc>, price: f64) {
        let mut state = self.state.lock().await;
        state.spots.insert(Self::spot_key(symbol, at), price);
        self.persist(&state);
    }

    fn persist(&self, state: &CacheFile) {
        if let Err(e) = self.store.save(state) {
            tracing::error!("Failed to persist historical cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::Candle;

    fn sample_window() -> HistoricalPriceData {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        HistoricalPriceData {
            symbol: "PEPE".to_string(),
            price_at_timestamp: 1.0,
            ath_in_window: 3.0,
            ath_timestamp: ts,
            days_to_ath: 2.0,
            candles: vec![Candle {
                timestamp: ts,
                open: 1.0,
                high: 3.0,
                low: 0.9,
                close: 2.5,
                volume: None,
            }],
            source: "cryptocompare".to_string(),
            cached: false,
        }
    }

    #[tokio::test]
    async fn window_hits_are_flagged_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HistoricalCache::new(dir.path().join("historical_prices.json"));
        let start = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();

        assert!(cache.get_window("PEPE", start, 30).await.is_none());
        cache.put_window("PEPE", start, 30, &sample_window()).await;

        let hit = cache.get_window("PEPE", start, 30).await.unwrap();
        assert!(hit.cached);
        assert_eq!(hit.ath_in_window, 3.0);

        // Different window length is a different key.
        assert!(cache.get_window("PEPE", start, 7).await.is_none());
    }

    #[tokio::test]
    async fn cache_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("historical_prices.json");
        let start = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();

        {
            let cache = HistoricalCache::new(&path);
            cache.put_spot("BTC", start, 42_000.0).await;
        }
        let cache = HistoricalCache::new(&path);
        assert_eq!(cache.get_spot("btc", start).await, Some(42_000.0));
    }
}
