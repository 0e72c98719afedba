//! Keyless DeFi meta-aggregator adapter (DefiLlama-style coins API).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use signal_core::{ChainFamily, PriceData, PriceProvider, SignalError};

use crate::rate_limit::RateLimiter;

const DEFAULT_BASE_URL: &str = "https://coins.llama.fi";
pub const SOURCE: &str = "defillama";

#[derive(Debug, Deserialize)]
struct CoinEntry {
    price: Option<f64>,
    symbol: Option<String>,
    #[allow(dead_code)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CoinsResponse {
    #[serde(default)]
    coins: HashMap<String, CoinEntry>,
}

#[derive(Clone)]
pub struct MetaAggregatorClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl MetaAggregatorClient {
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
            // 10 req/s keyless budget.
            limiter: RateLimiter::per_second(10),
        }
    }

    fn coin_key(address: &str, chain: ChainFamily) -> String {
        format!("{}:{}", chain.platform(), address)
    }
}

impl Default for MetaAggregatorClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceProvider for MetaAggregatorClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_price(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<PriceData>, SignalError> {
        if !self.limiter.try_acquire().await {
            tracing::debug!("Meta-aggregator budget exhausted, skipping {}", address);
            return Ok(None);
        }

        let key = Self::coin_key(address, chain);
        let url = format!("{}/prices/current/{}", self.base_url, key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: CoinsResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        let Some(entry) = body.coins.get(&key) else {
            return Ok(None);
        };
        let Some(price) = entry.price.filter(|p| *p > 0.0) else {
            return Ok(None);
        };

        let mut data = PriceData::new(price, SOURCE);
        data.symbol = entry.symbol.as_ref().map(|s| s.to_uppercase());
        Ok(Some(data))
    }
}
