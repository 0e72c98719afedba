//! Dead-token detection with a persistent advisory blacklist.
//!
//! A token is suspect when its on-chain state is obviously abnormal: supply
//! under 1000 wei, zero transfers on a contract older than 7 days, or a
//! V2-style pool with supply under 10000 wei. The blacklist only suppresses
//! repeated price fetches; it never stops tracking, and a token is never
//! automatically removed after a later price observation.

use std::path::PathBuf;

use atomic_store::JsonStore;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::providers::ExplorerClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub address: String,
    pub chain: String,
    pub reason: String,
    pub detected_at: DateTime<Utc>,
    pub total_supply: Option<String>,
    pub holders: Option<u64>,
    pub transfers: Option<usize>,
}

/// Result of a single health check.
#[derive(Debug, Clone, Default)]
pub struct TokenHealth {
    pub is_dead: bool,
    pub reason: Option<String>,
}

pub struct DeadTokenDetector {
    explorer: Option<ExplorerClient>,
    store: JsonStore,
    blacklist: DashMap<String, BlacklistEntry>,
}

impl DeadTokenDetector {
    pub fn new(explorer: Option<ExplorerClient>, blacklist_path: impl Into<PathBuf>) -> Self {
        let store = JsonStore::new(blacklist_path);
        let loaded: BTreeMap<String, BlacklistEntry> = store.load();
        let blacklist = DashMap::new();
        for (k, v) in loaded {
            blacklist.insert(k, v);
        }
        if !blacklist.is_empty() {
            tracing::info!("Loaded {} dead tokens from blacklist", blacklist.len());
        }
        Self {
            explorer,
            store,
            blacklist,
        }
    }

    pub fn is_blacklisted(&self, address: &str) -> bool {
        self.blacklist.contains_key(&address.to_lowercase())
    }

    pub fn blacklist_reason(&self, address: &str) -> Option<String> {
        self.blacklist
            .get(&address.to_lowercase())
            .map(|e| e.reason.clone())
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }

    /// Check on-chain health and blacklist when the evidence is conclusive.
    ///
    /// `has_valid_price` short-circuits blacklisting: tokens with live DEX
    /// prices but odd supply (pump.fun style) are not dead. Supply-only
    /// evidence also never blacklists; it defers to price verification.
    pub async fn check_token(
        &self,
        address: &str,
        chain_specific: &str,
        is_pool: bool,
        has_valid_price: bool,
    ) -> TokenHealth {
        let address_lower = address.to_lowercase();

        if let Some(entry) = self.blacklist.get(&address_lower) {
            tracing::info!(
                "Token {}... already blacklisted: {}",
                &address_lower[..10.min(address_lower.len())],
                entry.reason
            );
            return TokenHealth {
                is_dead: true,
                reason: Some(entry.reason.clone()),
            };
        }

        let Some(explorer) = &self.explorer else {
            return TokenHealth::default();
        };

        let supply = explorer
            .token_supply(&address_lower, chain_specific)
            .await
            .unwrap_or_default();

        let supply_abnormal = match supply {
            Some(s) if is_pool => s < 10_000,
            Some(s) => s < 1_000,
            None => false,
        };

        if !supply_abnormal {
            return TokenHealth::default();
        }

        if has_valid_price {
            tracing::info!(
                "Not blacklisting {}...: abnormal supply but valid price data",
                &address_lower[..10.min(address_lower.len())]
            );
            return TokenHealth {
                is_dead: false,
                reason: Some("Has valid price data despite abnormal supply".to_string()),
            };
        }

        // Supply alone is weak evidence; confirm with transfer history + age.
        let transfers = explorer
            .transfer_count(&address_lower, chain_specific)
            .await
            .unwrap_or_default();
        let created = explorer
            .contract_creation(&address_lower, chain_specific)
            .await
            .unwrap_or_default();

        let old_enough = created
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .is_some_and(|t| Utc::now() - t > Duration::days(7));

        if transfers == Some(0) && old_enough {
            let reason = if is_pool {
                "V2 pool with near-zero supply and no transfers".to_string()
            } else {
                "No transfers and contract older than 7 days".to_string()
            };
            self.add_to_blacklist(&address_lower, chain_specific, &reason, supply, transfers);
            return TokenHealth {
                is_dead: true,
                reason: Some(reason),
            };
        }

        tracing::info!(
            "Not blacklisting {}... yet: low supply, needs price verification",
            &address_lower[..10.min(address_lower.len())]
        );
        TokenHealth {
            is_dead: false,
            reason: Some("Low supply - needs price verification".to_string()),
        }
    }

    fn add_to_blacklist(
        &self,
        address_lower: &str,
        chain: &str,
        reason: &str,
        supply: Option<u128>,
        transfers: Option<usize>,
    ) {
        let entry = BlacklistEntry {
            address: address_lower.to_string(),
            chain: chain.to_string(),
            reason: reason.to_string(),
            detected_at: Utc::now(),
            total_supply: supply.map(|s| s.to_string()),
            holders: None,
            transfers,
        };
        self.blacklist.insert(address_lower.to_string(), entry);
        tracing::warn!("Blacklisted dead token {}...: {}", &address_lower[..10.min(address_lower.len())], reason);

        let snapshot: BTreeMap<String, BlacklistEntry> = self
            .blacklist
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        if let Err(e) = self.store.save(&snapshot) {
            tracing::error!("Failed to save blacklist: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blacklist_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead_tokens_blacklist.json");

        let detector = DeadTokenDetector::new(None, &path);
        detector.add_to_blacklist("0xabc", "ethereum", "No transfers", Some(1), Some(0));
        assert!(detector.is_blacklisted("0xABC"));

        let reloaded = DeadTokenDetector::new(None, &path);
        assert!(reloaded.is_blacklisted("0xabc"));
        assert_eq!(
            reloaded.blacklist_reason("0xabc").as_deref(),
            Some("No transfers")
        );
    }

    #[tokio::test]
    async fn no_explorer_means_no_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let detector = DeadTokenDetector::new(None, dir.path().join("bl.json"));
        let health = detector.check_token("0xabc", "ethereum", false, false).await;
        assert!(!health.is_dead);
    }
}
