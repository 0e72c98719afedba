//! Keyed block-explorer adapter (Etherscan v2-style multichain API).
//!
//! Serves the token metadata endpoint for EVM chains plus the on-chain stats
//! (supply, transfer count, contract creation) used by dead-token detection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use signal_core::{ChainFamily, PriceData, PriceProvider, SignalError};

use crate::rate_limit::RateLimiter;

const DEFAULT_BASE_URL: &str = "https://api.etherscan.io/v2/api";
pub const SOURCE: &str = "explorer";

fn chain_id(chain_specific: &str) -> u64 {
    match chain_specific {
        "ethereum" => 1,
        "bsc" => 56,
        "polygon" => 137,
        "arbitrum" => 42161,
        "optimism" => 10,
        "base" => 8453,
        _ => 1,
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: Option<String>,
    message: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfo {
    symbol: Option<String>,
    #[serde(rename = "tokenPriceUSD")]
    token_price_usd: Option<String>,
    market_cap: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContractCreation {
    timestamp: Option<String>,
}

#[derive(Clone)]
pub struct ExplorerClient {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

impl ExplorerClient {
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
            // Explorer free tier: 5 req/s.
            limiter: RateLimiter::per_second(5),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<Option<T>, SignalError> {
        if !self.limiter.try_acquire().await {
            tracing::debug!("Explorer budget exhausted, skipping call");
            return Ok(None);
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| SignalError::Decode(e.to_string()))?;

        if envelope.status.as_deref() != Some("1") {
            tracing::debug!(
                "Explorer call returned status {:?}: {:?}",
                envelope.status,
                envelope.message
            );
            return Ok(None);
        }
        Ok(envelope.result)
    }

    /// Total token supply in base units, as reported by the explorer.
    pub async fn token_supply(
        &self,
        address: &str,
        chain_specific: &str,
    ) -> Result<Option<u128>, SignalError> {
        let chain = chain_id(chain_specific).to_string();
        let result: Option<String> = self
            .call(&[
                ("chainid", chain.as_str()),
                ("module", "stats"),
                ("action", "tokensupply"),
                ("contractaddress", address),
            ])
            .await?;
        Ok(result.and_then(|s| s.parse().ok()))
    }

    /// Number of token transfers seen, capped at the page size.
    pub async fn transfer_count(
        &self,
        address: &str,
        chain_specific: &str,
    ) -> Result<Option<usize>, SignalError> {
        let chain = chain_id(chain_specific).to_string();
        let result: Option<Vec<serde_json::Value>> = self
            .call(&[
                ("chainid", chain.as_str()),
                ("module", "account"),
                ("action", "tokentx"),
                ("contractaddress", address),
                ("page", "1"),
                ("offset", "10000"),
                ("sort", "asc"),
            ])
            .await?;
        Ok(result.map(|r| r.len()))
    }

    /// Contract creation time as a unix timestamp.
    pub async fn contract_creation(
        &self,
        address: &str,
        chain_specific: &str,
    ) -> Result<Option<i64>, SignalError> {
        let chain = chain_id(chain_specific).to_string();
        let result: Option<Vec<ContractCreation>> = self
            .call(&[
                ("chainid", chain.as_str()),
                ("module", "contract"),
                ("action", "getcontractcreation"),
                ("contractaddresses", address),
            ])
            .await?;
        Ok(result
            .and_then(|r| r.into_iter().next())
            .and_then(|c| c.timestamp)
            .and_then(|t| t.parse().ok()))
    }
}

#[async_trait]
impl PriceProvider for ExplorerClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_price(
        &self,
        address: &str,
        chain: ChainFamily,
    ) -> Result<Option<PriceData>, SignalError> {
        // Token metadata exists for EVM chains only.
        if chain != ChainFamily::Evm {
            return Ok(None);
        }

        let result: Option<Vec<TokenInfo>> = self
            .call(&[
                ("chainid", "1"),
                ("module", "token"),
                ("action", "tokeninfo"),
                ("contractaddress", address),
            ])
            .await?;

        let Some(info) = result.and_then(|r| r.into_iter().next()) else {
            return Ok(None);
        };

        let price = info
            .token_price_usd
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| *p > 0.0);

        let Some(price) = price else {
            // Symbol-only records still help enrichment.
            if let Some(symbol) = info.symbol.filter(|s| !s.is_empty()) {
                let mut data = PriceData::new(0.0, SOURCE);
                data.symbol = Some(symbol.to_uppercase());
                return Ok(Some(data));
            }
            return Ok(None);
        };

        let mut data = PriceData::new(price, SOURCE);
        data.symbol = info.symbol.map(|s| s.to_uppercase());
        data.market_cap = info.market_cap.as_deref().and_then(|m| m.parse().ok());
        Ok(Some(data))
    }
}
