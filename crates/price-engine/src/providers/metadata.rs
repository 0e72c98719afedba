//! Keyed cap/metadata provider adapter (CoinGecko-style contract endpoint).
//!
//! Contributes price, market cap, volume and the all-time-high block that no
//! other provider serves.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use signal_core::{ChainFamily, PriceData, PriceProvider, SignalError};

use crate::rate_limit::RateLimiter;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const SOURCE: &str = "coingecko";

#[derive(Debug, Default, Deserialize)]
struct UsdValue {
    usd: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct UsdDate {
    usd: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketData {
    #[serde(default)]
    current_price: UsdValue,
    #[serde(default)]
    market_cap: UsdValue,
    #[serde(default)]
    total_volume: UsdValue,
    #[serde(default)]
    ath: UsdValue,
    #[serde(default)]
    ath_date: UsdDate,
    #[serde(default)]
    ath_change_percentage: UsdValue,
}

#[derive(Debug, Deserialize)]
struct ContractResponse {
    symbol: Option<String>,
    #[serde(default)]
    market_data: Option<MarketData>,
}

/// All-time-high fields served by the historical endpoint.
#[derive(Debug, Clone, Copy)]
pub struct AthInfo {
    pub ath: f64,
    pub ath_date: Option<DateTime<Utc>>,
    pub ath_change_percentage: Option<f64>,
}

#[derive(Clone)]
pub struct MetadataClient {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

impl MetadataClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            // Keyed plans allow ~10 req/s; stay under it.
            limiter: RateLimiter::per_second(10),
        }
    }

    async fn contract(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<ContractResponse>, SignalError> {
        if !self.limiter.try_acquire().await {
            tracing::debug!("Metadata provider budget exhausted, skipping {}", address);
            return Ok(None);
        }

        let url = format!(
            "{}/coins/{}/contract/{}",
            self.base_url,
            chain.platform(),
            address
        );
        let response = self
            .client
            .get(&url)
            .query(&[("x_api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            tracing::debug!("Metadata provider HTTP {} for {}", response.status(), address);
            return Ok(None);
        }

        let body: ContractResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;
        Ok(Some(body))
    }

    /// ATH fields only; used by enrichment when the merged record still lacks
    /// an all-time-high after the fan-out.
    pub async fn get_ath(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<AthInfo>, SignalError> {
        let Some(body) = self.contract(address, chain).await? else {
            return Ok(None);
        };
        let Some(market) = body.market_data else {
            return Ok(None);
        };
        let Some(ath) = market.ath.usd.filter(|a| *a > 0.0) else {
            return Ok(None);
        };
        Ok(Some(AthInfo {
            ath,
            ath_date: market.ath_date.usd,
            ath_change_percentage: market.ath_change_percentage.usd,
        }))
    }
}

#[async_trait]
impl PriceProvider for MetadataClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_price(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<PriceData>, SignalError> {
        let Some(body) = self.contract(address, chain).await? else {
            return Ok(None);
        };

        let market = body.market_data.unwrap_or_default();
        let Some(price) = market.current_price.usd.filter(|p| *p > 0.0) else {
            return Ok(None);
        };

        let mut data = PriceData::new(price, SOURCE);
        data.symbol = body.symbol.map(|s| s.to_uppercase());
        data.market_cap = market.market_cap.usd;
        data.volume_24h = market.total_volume.usd;
        data.ath = market.ath.usd;
        data.ath_date = market.ath_date.usd;
        data.ath_change_percentage = market.ath_change_percentage.usd;
        Ok(Some(data))
    }
}
