//! Keyless DEX aggregator adapter (DexScreener-style API).
//!
//! Primary price source: serves price, symbol, market cap, volume, liquidity
//! and pair creation time, plus the pair endpoint used by LP resolution.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use signal_core::{ChainFamily, PriceData, PriceProvider, SignalError};

use crate::rate_limit::RateLimiter;

const DEFAULT_BASE_URL: &str = "https://api.dexscreener.com/latest/dex";
pub const SOURCE: &str = "dexscreener";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    price_usd: Option<f64>,
    symbol: Option<String>,
    market_cap: Option<f64>,
    volume_24h: Option<f64>,
    liquidity_usd: Option<f64>,
    /// Unix seconds.
    pair_created_at: Option<i64>,
    price_change_24h: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairToken {
    pub address: String,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairInfo {
    pub base_token: PairToken,
    pub quote_token: Option<PairToken>,
    pub dex_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    pair: Option<PairInfo>,
}

#[derive(Clone)]
pub struct DexAggregatorClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl DexAggregatorClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
            // 30 req/s keyless budget.
            limiter: RateLimiter::per_second(30),
        }
    }

    async fn get_token(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<PriceData>, SignalError> {
        if !self.limiter.try_acquire().await {
            tracing::debug!("DEX aggregator budget exhausted, skipping {}", address);
            return Ok(None);
        }

        let url = format!("{}/tokens/{}/{}", self.base_url, chain.platform(), address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            tracing::debug!("DEX aggregator HTTP {} for {}", response.status(), address);
            return Ok(None);
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        let Some(price) = body.price_usd.filter(|p| *p > 0.0) else {
            return Ok(None);
        };

        let mut data = PriceData::new(price, SOURCE);
        data.symbol = body.symbol;
        data.market_cap = body.market_cap;
        data.volume_24h = body.volume_24h;
        data.liquidity_usd = body.liquidity_usd;
        data.price_change_24h = body.price_change_24h;
        data.pair_created_at = body
            .pair_created_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

        Ok(Some(data))
    }

    /// Query the pair endpoint: `Some(PairInfo)` when the address is a
    /// liquidity pair, `None` otherwise.
    pub async fn get_pair(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<PairInfo>, SignalError> {
        if !self.limiter.try_acquire().await {
            tracing::debug!("DEX aggregator budget exhausted, skipping pair {}", address);
            return Ok(None);
        }

        let url = format!("{}/pairs/{}/{}", self.base_url, chain.platform(), address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: PairResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        Ok(body.pair)
    }
}

impl Default for DexAggregatorClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceProvider for DexAggregatorClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_price(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<PriceData>, SignalError> {
        self.get_token(address, chain).await
    }
}
