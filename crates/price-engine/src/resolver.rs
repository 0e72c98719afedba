//! LP pair resolution: rewrites liquidity-pool addresses to their base token.
//!
//! People paste pool contract addresses from DEX charts at least as often as
//! token contracts. Two independent probes, in order: the DEX aggregator pair
//! endpoint, then a `token0()`/`token1()` read-call that identifies
//! Uniswap-V2-compatible pools. Any failure downgrades to "not a pair".

use signal_core::{Address, ChainFamily};

use crate::providers::{DexAggregatorClient, EvmRpcClient};

#[derive(Debug, Clone, Default)]
pub struct PairResolution {
    pub is_pair: bool,
    pub token_address: Option<String>,
    pub token_symbol: Option<String>,
    pub pair_type: Option<String>,
}

pub struct PairResolver {
    dex: DexAggregatorClient,
    rpc: EvmRpcClient,
}

impl PairResolver {
    pub fn new(dex: DexAggregatorClient, rpc: EvmRpcClient) -> Self {
        Self { dex, rpc }
    }

    /// Check whether `address` is an LP pair; resolution failures never fail
    /// the pipeline, they just keep the original address.
    pub async fn resolve(&self, address: &str, chain: ChainFamily) -> PairResolution {
        // Solana pool addresses don't collide with token mints the same way.
        if chain != ChainFamily::Evm {
            return PairResolution::default();
        }

        match self.dex.get_pair(address, chain).await {
            Ok(Some(pair)) => {
                tracing::info!(
                    "Resolved LP pair {}... to token {} ({}...)",
                    &address[..10.min(address.len())],
                    pair.base_token.symbol.as_deref().unwrap_or("?"),
                    &pair.base_token.address[..10.min(pair.base_token.address.len())]
                );
                return PairResolution {
                    is_pair: true,
                    token_address: Some(pair.base_token.address),
                    token_symbol: pair.base_token.symbol,
                    pair_type: pair.dex_id,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("DEX pair check failed for {}: {}", address, e);
            }
        }

        // Fallback: both token0() and token1() answering marks a V2 pool.
        let token0 = self.rpc.token0(address).await.unwrap_or_default();
        let token1 = self.rpc.token1(address).await.unwrap_or_default();

        if let (Some(token0), Some(_)) = (token0, token1) {
            tracing::info!(
                "Detected LP pair {}... via contract call (token0: {}...)",
                &address[..10.min(address.len())],
                &token0[..10.min(token0.len())]
            );
            return PairResolution {
                is_pair: true,
                token_address: Some(token0),
                token_symbol: None,
                pair_type: Some("uniswap_v2_compatible".to_string()),
            };
        }

        PairResolution::default()
    }

    /// Rewrite each pool address in place to its underlying base token,
    /// keeping the pool address in `resolved_from`.
    pub async fn resolve_all(&self, addresses: Vec<Address>) -> Vec<Address> {
        let mut resolved = Vec::with_capacity(addresses.len());

        for addr in addresses {
            if !addr.valid || addr.family != ChainFamily::Evm {
                resolved.push(addr);
                continue;
            }

            let resolution = self.resolve(&addr.raw, addr.family).await;
            match resolution.token_address {
                Some(token_address) if resolution.is_pair => {
                    resolved.push(Address {
                        raw: token_address,
                        family: addr.family,
                        valid: true,
                        ticker: resolution.token_symbol,
                        chain_specific: addr.chain_specific.clone(),
                        is_pool: true,
                        resolved_from: Some(addr.raw),
                    });
                }
                _ => resolved.push(addr),
            }
        }

        resolved
    }
}
