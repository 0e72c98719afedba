//! Token admission filter.
//!
//! Rejects scam tokens reusing major symbols with non-canonical addresses,
//! tokens below the market-data thresholds, and market commentary about
//! major tokens that carries no address. Verdicts are logged at info; they
//! are filter decisions, not errors.

use signal_core::keys::normalize_address;

use crate::registry::{canonical_address, is_major_token, major_token_criteria};

/// Thresholds for non-major tokens. Overridable from configuration.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub min_market_cap: f64,
    pub min_price: f64,
    pub allow_missing_market_cap: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_market_cap: 10_000.0,
            min_price: 0.000001,
            allow_missing_market_cap: false,
        }
    }
}

/// Running counters over filter verdicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterStats {
    pub total_checked: u64,
    pub major_token_filtered: u64,
    pub market_cap_filtered: u64,
    pub price_filtered: u64,
    pub scam_filtered: u64,
    pub commentary_filtered: u64,
    pub passed: u64,
}

/// Words that flag a major-token message as market commentary rather than a
/// token call.
const COMMENTARY_INDICATORS: &[&str] = &[
    "rally",
    "rallying",
    "pump",
    "pumping",
    "dump",
    "dumping",
    "ath",
    "all time high",
    "all-time high",
    "breaking",
    "broke",
    "support",
    "resistance",
    "prediction",
    "forecast",
    "incoming",
    "coming",
    "market",
    "chart",
];

pub struct TokenFilter {
    config: FilterConfig,
    stats: FilterStats,
}

impl TokenFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            stats: FilterStats::default(),
        }
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    /// Major-token symbols in pure commentary (no address in the message) are
    /// dropped entirely: "ETH rally coming!" is not a signal.
    pub fn should_process_symbol(&mut self, symbol: &str, message_text: &str) -> bool {
        if is_major_token(symbol) && Self::is_market_commentary(message_text) {
            tracing::info!(
                "Skipping {} - appears to be market commentary, not a signal",
                symbol
            );
            self.stats.commentary_filtered += 1;
            return false;
        }
        true
    }

    fn is_market_commentary(message_text: &str) -> bool {
        if message_text.contains("0x") {
            return false;
        }
        let lower = message_text.to_lowercase();
        COMMENTARY_INDICATORS.iter().any(|w| lower.contains(w))
    }

    /// Reject a major-token symbol whose address is not the canonical one for
    /// the chain, or whose price falls outside the expected band.
    /// Returns (admit, reason-if-rejected).
    pub fn check_major_token_address(
        &mut self,
        symbol: &str,
        address: &str,
        chain: &str,
        price: Option<f64>,
    ) -> (bool, Option<String>) {
        self.stats.total_checked += 1;

        let Some(criteria) = major_token_criteria(symbol) else {
            self.stats.passed += 1;
            return (true, None);
        };

        let Some(canonical) = canonical_address(symbol, chain) else {
            self.stats.major_token_filtered += 1;
            let reason = format!("Major token {} has no canonical address for {}", symbol, chain);
            tracing::warn!("{}", reason);
            return (false, Some(reason));
        };

        if normalize_address(address) != normalize_address(canonical) {
            self.stats.major_token_filtered += 1;
            let reason = format!(
                "Address {} is not canonical for {} (expected {})",
                address, symbol, canonical
            );
            tracing::warn!("Filtering fake {} token: {}", symbol, reason);
            return (false, Some(reason));
        }

        if let Some(p) = price {
            if p < criteria.min_price {
                self.stats.price_filtered += 1;
                let reason = format!(
                    "Price ${:.6} too low for {} (expected > ${})",
                    p, symbol, criteria.min_price
                );
                tracing::warn!("{}", reason);
                return (false, Some(reason));
            }
            if p > criteria.max_price {
                self.stats.price_filtered += 1;
                let reason = format!(
                    "Price ${:.6} too high for {} (expected < ${})",
                    p, symbol, criteria.max_price
                );
                tracing::warn!("{}", reason);
                return (false, Some(reason));
            }
        }

        self.stats.passed += 1;
        (true, None)
    }

    /// Threshold checks against merged market data. Returns
    /// (admit, reason-if-rejected).
    pub fn check_market_data(
        &mut self,
        symbol: &str,
        price: Option<f64>,
        market_cap: Option<f64>,
        supply: Option<f64>,
    ) -> (bool, Option<String>) {
        self.stats.total_checked += 1;

        if let Some(criteria) = major_token_criteria(symbol) {
            // Major tokens passed the canonical-address gate already; here we
            // only enforce their market-cap floor.
            if let Some(mc) = market_cap {
                if mc < criteria.min_market_cap {
                    self.stats.market_cap_filtered += 1;
                    let reason = format!(
                        "Market cap ${:.0} too low for {} (expected > ${:.0})",
                        mc, symbol, criteria.min_market_cap
                    );
                    tracing::info!("{}", reason);
                    return (false, Some(reason));
                }
            }
            self.stats.passed += 1;
            return (true, None);
        }

        let price_value = match price {
            Some(p) if p > 0.0 => p,
            _ => {
                self.stats.price_filtered += 1;
                let reason = format!("Invalid or missing price for {}", symbol);
                tracing::info!("{}", reason);
                return (false, Some(reason));
            }
        };

        if price_value < self.config.min_price {
            self.stats.price_filtered += 1;
            let reason = format!(
                "Price ${:.12} below minimum ${:.12}",
                price_value, self.config.min_price
            );
            tracing::info!("Filtering {}: {}", symbol, reason);
            return (false, Some(reason));
        }

        match market_cap {
            Some(mc) if mc > 0.0 => {
                if mc < self.config.min_market_cap {
                    self.stats.market_cap_filtered += 1;
                    let reason = format!(
                        "Market cap ${:.0} below minimum ${:.0}",
                        mc, self.config.min_market_cap
                    );
                    tracing::info!("Filtering {}: {}", symbol, reason);
                    return (false, Some(reason));
                }
            }
            _ => {
                if !self.config.allow_missing_market_cap {
                    self.stats.market_cap_filtered += 1;
                    let reason = "Market cap data missing or zero".to_string();
                    tracing::info!("Filtering {}: {}", symbol, reason);
                    return (false, Some(reason));
                }
            }
        }

        if supply == Some(0.0) {
            self.stats.scam_filtered += 1;
            let reason = "Zero supply - likely dead/scam token".to_string();
            tracing::warn!("Filtering {}: {}", symbol, reason);
            return (false, Some(reason));
        }

        self.stats.passed += 1;
        (true, None)
    }

    pub fn log_statistics(&self) {
        let s = &self.stats;
        tracing::info!(
            "Token filter stats: checked={}, passed={}, major={}, mcap={}, price={}, scam={}, commentary={}",
            s.total_checked,
            s.passed,
            s.major_token_filtered,
            s.market_cap_filtered,
            s.price_filtered,
            s.scam_filtered,
            s.commentary_filtered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> TokenFilter {
        TokenFilter::new(FilterConfig::default())
    }

    #[test]
    fn fake_major_token_rejected_by_address() {
        let mut f = filter();
        let (admit, reason) = f.check_major_token_address(
            "ETH",
            "0xdead00000000000000000000000000000000beef",
            "ethereum",
            Some(0.002),
        );
        assert!(!admit);
        assert!(reason.unwrap().contains("not canonical"));
    }

    #[test]
    fn major_token_price_band_enforced() {
        let mut f = filter();
        // Canonical address but an absurd price: scam clone or depeg glitch.
        let (admit, reason) = f.check_major_token_address(
            "ETH",
            "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            "ethereum",
            Some(0.002),
        );
        assert!(!admit);
        assert!(reason.unwrap().contains("too low for ETH"));

        let (admit, _) = f.check_major_token_address(
            "ETH",
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
            "ethereum",
            Some(3200.0),
        );
        assert!(admit);
    }

    #[test]
    fn non_major_thresholds() {
        let mut f = filter();

        let (admit, _) = f.check_market_data("PEPE", Some(0.0000012), Some(500_000.0), None);
        assert!(admit);

        let (admit, reason) = f.check_market_data("DUST", Some(1e-9), Some(500_000.0), None);
        assert!(!admit);
        assert!(reason.unwrap().contains("below minimum"));

        let (admit, reason) = f.check_market_data("TINY", Some(0.5), Some(5_000.0), None);
        assert!(!admit);
        assert!(reason.unwrap().contains("Market cap"));

        let (admit, reason) = f.check_market_data("GONE", Some(0.5), Some(50_000.0), Some(0.0));
        assert!(!admit);
        assert!(reason.unwrap().contains("Zero supply"));
    }

    #[test]
    fn missing_market_cap_policy() {
        let mut strict = filter();
        let (admit, _) = strict.check_market_data("NEW", Some(0.5), None, None);
        assert!(!admit);

        let mut lenient = TokenFilter::new(FilterConfig {
            allow_missing_market_cap: true,
            ..FilterConfig::default()
        });
        let (admit, _) = lenient.check_market_data("NEW", Some(0.5), None, None);
        assert!(admit);
    }

    #[test]
    fn commentary_suppression() {
        let mut f = filter();
        assert!(!f.should_process_symbol("ETH", "ETH rally coming!"));
        assert!(f.should_process_symbol("PEPE", "PEPE rally coming!"));
        // An address in the message makes it a call, not commentary.
        assert!(f.should_process_symbol(
            "ETH",
            "ETH pumping, buy 0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
        ));
    }
}
