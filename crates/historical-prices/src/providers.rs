//! Historical price providers, in the same preference-order style as the
//! live price fan-out: primary daily-bar provider, chain+address historical
//! endpoint, then a free alternate. Each has its own rate limiter; failures
//! surface as `Ok(None)`.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use price_engine::RateLimiter;
use reqwest::Client;
use serde::Deserialize;
use signal_core::{Candle, HistoricalPriceData, SignalError};

/// Build a `HistoricalPriceData` from a candle window, rejecting windows
/// whose prices are all zero ("unlisted" tokens).
pub fn window_from_candles(
    symbol: &str,
    candles: Vec<Candle>,
    source: &str,
) -> Option<HistoricalPriceData> {
    let first = candles.first()?;
    let entry_price = first.open;
    let first_ts = first.timestamp;
    let ath_candle = candles
        .iter()
        .max_by(|a, b| a.high.partial_cmp(&b.high).unwrap_or(std::cmp::Ordering::Equal))?;
    let ath_price = ath_candle.high;
    let ath_timestamp = ath_candle.timestamp;

    if ath_price <= 0.0 || entry_price <= 0.0 {
        tracing::warn!(
            "{}: {} candles but all prices are zero (unlisted token)",
            symbol,
            candles.len()
        );
        return None;
    }

    let days_to_ath = (ath_timestamp - first_ts).num_seconds() as f64 / 86_400.0;

    Some(HistoricalPriceData {
        symbol: symbol.to_string(),
        price_at_timestamp: entry_price,
        ath_in_window: ath_price,
        ath_timestamp,
        days_to_ath,
        candles,
        source: source.to_string(),
        cached: false,
    })
}

/// Primary keyed daily-candle provider (CryptoCompare-style histoday API).
#[derive(Clone)]
pub struct DailyCandleClient {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct HistoDayCandle {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volumeto: f64,
}

#[derive(Debug, Deserialize)]
struct HistoDayInner {
    #[serde(rename = "Data", default)]
    data: Vec<HistoDayCandle>,
}

#[derive(Debug, Deserialize)]
struct HistoDayResponse {
    #[serde(rename = "Response")]
    response: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "Data")]
    data: Option<HistoDayInner>,
}

impl DailyCandleClient {
    const DEFAULT_BASE_URL: &'static str = "https://min-api.cryptocompare.com/data";
    pub const SOURCE: &'static str = "cryptocompare";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            limiter: RateLimiter::per_second(10),
        }
    }

    /// Spot price at a specific timestamp, daily granularity.
    pub async fn price_at(
        &self,
        symbol: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<f64>, SignalError> {
        if !self.limiter.try_acquire().await {
            return Ok(None);
        }

        let ts = timestamp.timestamp().to_string();
        let mut query = vec![
            ("fsym", symbol.to_string()),
            ("tsyms", "USD".to_string()),
            ("ts", ts),
        ];
        if !self.api_key.is_empty() {
            query.push(("api_key", self.api_key.clone()));
        }

        let url = format!("{}/pricehistorical", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        if body.get("Response").and_then(|r| r.as_str()) == Some("Error") {
            tracing::debug!(
                "Daily-candle provider error for {}: {:?}",
                symbol,
                body.get("Message")
            );
            return Ok(None);
        }

        let price = body
            .get(symbol)
            .and_then(|s| s.get("USD"))
            .and_then(|p| p.as_f64())
            .filter(|p| *p > 0.0);
        Ok(price)
    }

    /// Daily OHLC candles for `[start, start + window_days]`.
    pub async fn ohlc_window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        window_days: u32,
    ) -> Result<Option<HistoricalPriceData>, SignalError> {
        if !self.limiter.try_acquire().await {
            return Ok(None);
        }

        let end = start + ChronoDuration::days(window_days as i64);
        let mut query = vec![
            ("fsym", symbol.to_string()),
            ("tsym", "USD".to_string()),
            ("limit", window_days.to_string()),
            ("toTs", end.timestamp().to_string()),
        ];
        if !self.api_key.is_empty() {
            query.push(("api_key", self.api_key.clone()));
        }

        let url = format!("{}/v2/histoday", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: HistoDayResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        if body.response.as_deref() == Some("Error") {
            tracing::debug!("OHLC error for {}: {:?}", symbol, body.message);
            return Ok(None);
        }

        let raw = match body.data {
            Some(inner) if !inner.data.is_empty() => inner.data,
            _ => return Ok(None),
        };

        let candles: Vec<Candle> = raw
            .into_iter()
            .filter_map(|c| {
                DateTime::<Utc>::from_timestamp(c.time, 0).map(|timestamp| Candle {
                    timestamp,
                    open: c.open,
                    high: c.high,
                    low: c.low,
                    close: c.close,
                    volume: Some(c.volumeto),
                })
            })
            .collect();

        Ok(window_from_candles(symbol, candles, Self::SOURCE))
    }
}

/// Chain+address historical endpoint (DefiLlama-style), keyed on
/// `(chain, address, unix_ts)`.
#[derive(Clone)]
pub struct ChainHistoricalClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct ChartPoint {
    timestamp: i64,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct ChartCoin {
    symbol: Option<String>,
    #[serde(default)]
    prices: Vec<ChartPoint>,
}

impl ChainHistoricalClient {
    const DEFAULT_BASE_URL: &'static str = "https://coins.llama.fi";
    pub const SOURCE: &'static str = "defillama";

    pub fn new() -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
            limiter: RateLimiter::per_second(10),
        }
    }

    pub async fn price_at(
        &self,
        chain: &str,
        address: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<f64>, SignalError> {
        if !self.limiter.try_acquire().await {
            return Ok(None);
        }

        let key = format!("{}:{}", chain, address);
        let url = format!(
            "{}/prices/historical/{}/{}",
            self.base_url,
            timestamp.timestamp(),
            key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        let price = body
            .get("coins")
            .and_then(|c| c.get(&key))
            .and_then(|e| e.get("price"))
            .and_then(|p| p.as_f64())
            .filter(|p| *p > 0.0);
        Ok(price)
    }

    /// Daily chart synthesized into flat candles (open=high=low=close).
    pub async fn chart_window(
        &self,
        chain: &str,
        address: &str,
        start: DateTime<Utc>,
        window_days: u32,
    ) -> Result<Option<HistoricalPriceData>, SignalError> {
        if !self.limiter.try_acquire().await {
            return Ok(None);
        }

        let key = format!("{}:{}", chain, address);
        let url = format!("{}/chart/{}", self.base_url, key);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("start", start.timestamp().to_string()),
                ("span", window_days.to_string()),
                ("period", "1d".to_string()),
            ])
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        let Some(coin) = body.get("coins").and_then(|c| c.get(&key)) else {
            return Ok(None);
        };
        let coin: ChartCoin =
            serde_json::from_value(coin.clone()).map_err(|e| SignalError::Decode(e.to_string()))?;

        let symbol = coin.symbol.unwrap_or_default();
        let candles: Vec<Candle> = coin
            .prices
            .into_iter()
            .filter_map(|p| {
                DateTime::<Utc>::from_timestamp(p.timestamp, 0).map(|timestamp| Candle {
                    timestamp,
                    open: p.price,
                    high: p.price,
                    low: p.price,
                    close: p.price,
                    volume: None,
                })
            })
            .collect();

        Ok(window_from_candles(&symbol, candles, Self::SOURCE))
    }
}

impl Default for ChainHistoricalClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Free alternate provider (CoinCap-style asset history, no key). Slugs come
/// from the symbol-mapping file; unmapped symbols fall back to lowercase.
#[derive(Clone)]
pub struct AlternateCandleClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetHistoryPoint {
    price_usd: String,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct AssetHistoryResponse {
    #[serde(default)]
    data: Vec<AssetHistoryPoint>,
}

impl AlternateCandleClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.coincap.io/v2";
    pub const SOURCE: &'static str = "coincap";

    pub fn new() -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
            limiter: RateLimiter::per_second(5),
        }
    }

    pub async fn history_window(
        &self,
        slug: &str,
        symbol: &str,
        start: DateTime<Utc>,
        window_days: u32,
    ) -> Result<Option<HistoricalPriceData>, SignalError> {
        if !self.limiter.try_acquire().await {
            return Ok(None);
        }

        let end = start + ChronoDuration::days(window_days as i64);
        let url = format!("{}/assets/{}/history", self.base_url, slug);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("interval", "d1".to_string()),
                ("start", (start.timestamp_millis()).to_string()),
                ("end", (end.timestamp_millis()).to_string()),
            ])
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: AssetHistoryResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        let candles: Vec<Candle> = body
            .data
            .into_iter()
            .filter_map(|p| {
                let price = p.price_usd.parse::<f64>().ok()?;
                DateTime::<Utc>::from_timestamp_millis(p.time).map(|timestamp| Candle {
                    timestamp,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: None,
                })
            })
            .collect();

        Ok(window_from_candles(symbol, candles, Self::SOURCE))
    }
}

impl Default for AlternateCandleClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(day: i64, open: f64, high: f64, close: f64) -> Candle {
        Candle {
            timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000 + day * 86_400, 0).unwrap(),
            open,
            high,
            low: open.min(close),
            close,
            volume: None,
        }
    }

    #[test]
    fn window_extracts_entry_and_ath() {
        let candles = vec![
            candle(0, 1.0, 1.1, 1.05),
            candle(1, 1.05, 4.78, 2.0),
            candle(2, 2.0, 2.5, 1.8),
        ];
        let window = window_from_candles("PEPE", candles, "cryptocompare").unwrap();
        assert_eq!(window.price_at_timestamp, 1.0);
        assert_eq!(window.ath_in_window, 4.78);
        assert!((window.days_to_ath - 1.0).abs() < 1e-9);
        assert!(!window.cached);
    }

    #[test]
    fn all_zero_window_rejected_as_unlisted() {
        let candles = vec![candle(0, 0.0, 0.0, 0.0), candle(1, 0.0, 0.0, 0.0)];
        assert!(window_from_candles("GONE", candles, "cryptocompare").is_none());
    }

    #[test]
    fn empty_window_rejected() {
        assert!(window_from_candles("NONE", Vec::new(), "cryptocompare").is_none());
    }
}
