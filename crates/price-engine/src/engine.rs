//! Multi-source price fan-out with merge and enrichment.
//!
//! Provider preference order: DEX aggregator, cap/metadata provider, DeFi
//! meta-aggregator, block explorer, security provider, on-chain `symbol()`.
//! The primary call goes out alone; a complete primary answer ends the
//! request. Otherwise the secondaries run in parallel and their fields merge
//! into one record. A field is never overwritten once set; `source`
//! accumulates every contributor joined with `+`.

use signal_core::{ChainFamily, PriceData, PriceProvider, SignalError};

use crate::market::MarketAnalyzer;
use crate::providers::{
    DexAggregatorClient, EvmRpcClient, ExplorerClient, GoPlusClient, MetaAggregatorClient,
    MetadataClient,
};

#[derive(Debug, Clone, Default)]
pub struct PriceEngineConfig {
    /// Keyed cap/metadata provider key; the provider is skipped without one.
    pub metadata_api_key: Option<String>,
    /// Keyed block-explorer key; the explorer is skipped without one.
    pub explorer_api_key: Option<String>,
    /// EVM JSON-RPC endpoint for on-chain fallbacks.
    pub rpc_url: Option<String>,
}

pub struct PriceEngine {
    dex: DexAggregatorClient,
    metadata: Option<MetadataClient>,
    meta_aggregator: MetaAggregatorClient,
    explorer: Option<ExplorerClient>,
    goplus: GoPlusClient,
    rpc: EvmRpcClient,
}

impl PriceEngine {
    pub fn new(config: PriceEngineConfig) -> Self {
        let rpc = match &config.rpc_url {
            Some(url) => EvmRpcClient::with_rpc_url(url.clone()),
            None => EvmRpcClient::new(),
        };
        Self {
            dex: DexAggregatorClient::new(),
            metadata: config.metadata_api_key.map(MetadataClient::new),
            meta_aggregator: MetaAggregatorClient::new(),
            explorer: config.explorer_api_key.map(ExplorerClient::new),
            goplus: GoPlusClient::new(),
            rpc,
        }
    }

    /// Assemble clients explicitly; used when the orchestrator shares clients
    /// between the engine, the resolver and the dead-token detector.
    pub fn with_clients(
        dex: DexAggregatorClient,
        metadata: Option<MetadataClient>,
        meta_aggregator: MetaAggregatorClient,
        explorer: Option<ExplorerClient>,
        goplus: GoPlusClient,
        rpc: EvmRpcClient,
    ) -> Self {
        Self {
            dex,
            metadata,
            meta_aggregator,
            explorer,
            goplus,
            rpc,
        }
    }

    pub fn dex_client(&self) -> DexAggregatorClient {
        self.dex.clone()
    }

    pub fn rpc_client(&self) -> EvmRpcClient {
        self.rpc.clone()
    }

    /// Best-effort merged price for `(address, chain)`, or `None` when every
    /// provider came up empty.
    pub async fn get_price(&self, address: &str, chain: ChainFamily) -> Option<PriceData> {
        let mut merged = swallow(self.dex.fetch_price(address, chain).await, "dexscreener")
            .filter(|d| d.price_usd > 0.0);

        let complete = merged.as_ref().is_some_and(|d| d.is_complete());
        if !complete {
            self.fan_out_secondaries(&mut merged, address, chain).await;
        }

        let mut data = match merged {
            Some(data) => data,
            None => {
                tracing::debug!("All providers failed for {} on {:?}", address, chain);
                return None;
            }
        };

        self.enrich(&mut data, address, chain).await;
        MarketAnalyzer::annotate(&mut data);
        Some(data)
    }

    /// Query the secondary providers in parallel and merge partial answers in
    /// preference order.
    async fn fan_out_secondaries(
        &self,
        merged: &mut Option<PriceData>,
        address: &str,
        chain: ChainFamily,
    ) {
        let metadata_fut = async {
            match &self.metadata {
                Some(client) => swallow(client.fetch_price(address, chain).await, "metadata"),
                None => None,
            }
        };
        let llama_fut = async {
            swallow(
                self.meta_aggregator.fetch_price(address, chain).await,
                "meta-aggregator",
            )
        };
        let explorer_fut = async {
            match &self.explorer {
                Some(client) if chain == ChainFamily::Evm => {
                    swallow(client.fetch_price(address, chain).await, "explorer")
                }
                _ => None,
            }
        };
        let goplus_fut = async { swallow(self.goplus.fetch_price(address, chain).await, "goplus") };

        let (metadata, llama, explorer, goplus) =
            tokio::join!(metadata_fut, llama_fut, explorer_fut, goplus_fut);

        for secondary in [metadata, llama, explorer, goplus].into_iter().flatten() {
            match merged {
                Some(data) => merge_missing(data, &secondary),
                // Price-less records (symbol only) can still seed the merge.
                None => *merged = Some(secondary),
            }
        }
    }

    /// Post-merge enrichment: on-chain symbol read, security provider,
    /// meta-aggregator, then the metadata provider's ATH block.
    async fn enrich(&self, data: &mut PriceData, address: &str, chain: ChainFamily) {
        if symbol_missing(data) && chain == ChainFamily::Evm {
            match self.rpc.read_symbol(address).await {
                Ok(Some(symbol)) => {
                    tracing::info!("Enriched symbol from contract: {}", symbol);
                    data.symbol = Some(symbol);
                    data.add_source("contract");
                }
                Ok(None) => {}
                Err(e) => tracing::debug!("Contract symbol read failed: {}", e),
            }
        }

        if symbol_missing(data) {
            if let Some(security) = swallow(
                self.goplus.token_security(address, chain).await,
                "goplus",
            ) {
                if let Some(symbol) = security.token_symbol.filter(|s| !s.is_empty()) {
                    tracing::info!("Enriched symbol from security provider: {}", symbol);
                    data.symbol = Some(symbol.to_uppercase());
                    data.add_source("goplus");
                }
            }
        }

        if symbol_missing(data) {
            if let Some(llama) = swallow(
                self.meta_aggregator.fetch_price(address, chain).await,
                "meta-aggregator",
            ) {
                if let Some(symbol) = llama.symbol {
                    tracing::info!("Enriched symbol from meta-aggregator: {}", symbol);
                    data.symbol = Some(symbol);
                    data.add_source("defillama");
                }
            }
        }

        if data.ath.is_none() {
            if let Some(client) = &self.metadata {
                match client.get_ath(address, chain).await {
                    Ok(Some(info)) => {
                        tracing::debug!("Fetched ATH from metadata provider: ${:.6}", info.ath);
                        data.ath = Some(info.ath);
                        data.ath_date = info.ath_date;
                        data.ath_change_percentage = info.ath_change_percentage;
                        data.add_source("coingecko");
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!("ATH fetch failed: {}", e),
                }
            }
        }
    }
}

fn symbol_missing(data: &PriceData) -> bool {
    !data.symbol.as_deref().is_some_and(|s| !s.is_empty() && s != "UNKNOWN")
}

/// Per-provider errors are logged at debug and never propagate.
fn swallow<T>(result: Result<Option<T>, SignalError>, provider: &str) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("{} failed: {}", provider, e);
            None
        }
    }
}

/// Fill unset fields of `target` from `other`; never overwrite. Appends the
/// contributor to `source` when anything was taken.
pub fn merge_missing(target: &mut PriceData, other: &PriceData) {
    let mut contributed = false;

    if target.price_usd <= 0.0 && other.price_usd > 0.0 {
        target.price_usd = other.price_usd;
        contributed = true;
    }
    if symbol_missing(target) {
        if let Some(symbol) = other.symbol.as_deref().filter(|s| !s.is_empty() && *s != "UNKNOWN") {
            target.symbol = Some(symbol.to_string());
            contributed = true;
        }
    }

    macro_rules! fill {
        ($field:ident) => {
            if target.$field.is_none() && other.$field.is_some() {
                target.$field = other.$field.clone();
                contributed = true;
            }
        };
    }
    fill!(market_cap);
    fill!(volume_24h);
    fill!(price_change_24h);
    fill!(liquidity_usd);
    fill!(pair_created_at);
    fill!(ath);
    fill!(ath_date);
    fill!(ath_change_percentage);

    if contributed {
        target.add_source(&other.source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_never_overwrites() {
        let mut primary = PriceData::new(1.5, "dexscreener");
        primary.symbol = Some("PEPE".to_string());
        primary.market_cap = Some(1_000_000.0);

        let mut secondary = PriceData::new(1.6, "coingecko");
        secondary.symbol = Some("WRONG".to_string());
        secondary.market_cap = Some(2_000_000.0);
        secondary.volume_24h = Some(50_000.0);
        secondary.ath = Some(3.2);

        merge_missing(&mut primary, &secondary);

        assert_eq!(primary.price_usd, 1.5);
        assert_eq!(primary.symbol.as_deref(), Some("PEPE"));
        assert_eq!(primary.market_cap, Some(1_000_000.0));
        assert_eq!(primary.volume_24h, Some(50_000.0));
        assert_eq!(primary.ath, Some(3.2));
        assert_eq!(primary.source, "dexscreener+coingecko");
    }

    #[test]
    fn merge_fills_unknown_symbol() {
        let mut primary = PriceData::new(0.5, "dexscreener");
        primary.symbol = Some("UNKNOWN".to_string());

        let mut secondary = PriceData::new(0.0, "goplus");
        secondary.symbol = Some("DOGE".to_string());

        merge_missing(&mut primary, &secondary);
        assert_eq!(primary.symbol.as_deref(), Some("DOGE"));
        assert_eq!(primary.source, "dexscreener+goplus");
    }

    #[test]
    fn merge_without_contribution_keeps_source() {
        let mut primary = PriceData::new(1.0, "dexscreener");
        primary.symbol = Some("AAA".to_string());
        let secondary = PriceData::new(0.0, "defillama");

        merge_missing(&mut primary, &secondary);
        assert_eq!(primary.source, "dexscreener");
    }
}
