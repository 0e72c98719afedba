//! Keyless security/metadata provider adapter (GoPlus-style token security).
//!
//! Contributes symbol and holder/liquidity context; also consulted by the
//! dead-token detector for holder counts.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use signal_core::{ChainFamily, PriceData, PriceProvider, SignalError};

use crate::rate_limit::RateLimiter;

const DEFAULT_BASE_URL: &str = "https://api.gopluslabs.io/api/v1";
pub const SOURCE: &str = "goplus";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenSecurity {
    pub token_symbol: Option<String>,
    pub token_name: Option<String>,
    pub holder_count: Option<String>,
    pub lp_holder_count: Option<String>,
    pub total_supply: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecurityResponse {
    #[serde(default)]
    result: HashMap<String, TokenSecurity>,
}

fn chain_path(chain: ChainFamily) -> &'static str {
    match chain {
        // GoPlus keys EVM chains by chain id.
        ChainFamily::Evm => "1",
        ChainFamily::Solana => "solana",
        ChainFamily::Unknown => "1",
    }
}

#[derive(Clone)]
pub struct GoPlusClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl GoPlusClient {
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
            limiter: RateLimiter::per_second(10),
        }
    }

    pub async fn token_security(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<TokenSecurity>, SignalError> {
        if !self.limiter.try_acquire().await {
            tracing::debug!("Security provider budget exhausted, skipping {}", address);
            return Ok(None);
        }

        let url = format!("{}/token_security/{}", self.base_url, chain_path(chain));
        let response = self
            .client
            .get(&url)
            .query(&[("contract_addresses", address)])
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: SecurityResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        // Result keys vary in case; match case-insensitively.
        let lower = address.to_lowercase();
        Ok(body
            .result
            .into_iter()
            .find(|(k, _)| k.to_lowercase() == lower)
            .map(|(_, v)| v))
    }
}

impl Default for GoPlusClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceProvider for GoPlusClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_price(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<PriceData>, SignalError> {
        let Some(security) = self.token_security(address, chain).await? else {
            return Ok(None);
        };
        let Some(symbol) = security.token_symbol.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        // No price here; the record only carries identity fields for merging.
        let mut data = PriceData::new(0.0, SOURCE);
        data.symbol = Some(symbol.to_uppercase());
        Ok(Some(data))
    }
}
