//! Registry of major tokens with canonical per-chain addresses.
//!
//! Used to reject scam tokens that reuse a major symbol with a different
//! contract address, and to sanity-band their prices.

/// Criteria for one recognized major token.
#[derive(Debug, Clone, Copy)]
pub struct MajorToken {
    pub symbol: &'static str,
    pub canonical_name: &'static str,
    /// (chain, canonical address) pairs.
    pub addresses: &'static [(&'static str, &'static str)],
    pub min_price: f64,
    pub max_price: f64,
    pub min_market_cap: f64,
    pub aliases: &'static [&'static str],
}

const MAJOR_TOKENS: &[MajorToken] = &[
    MajorToken {
        symbol: "ETH",
        canonical_name: "Ethereum",
        addresses: &[
            ("ethereum", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            ("solana", "7vfCXTUXx5WJV5JADk17DUJ4ksgau7utNKj4b963voxs"),
        ],
        min_price: 1000.0,
        max_price: f64::INFINITY,
        min_market_cap: 100_000_000.0,
        aliases: &["WETH", "ETHEREUM"],
    },
    MajorToken {
        symbol: "BTC",
        canonical_name: "Bitcoin",
        addresses: &[
            ("ethereum", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"),
            ("solana", "3NZ9JMVBmGAqocybic2c7LQCJScmgsAZ6vQqTDzcqmJh"),
        ],
        min_price: 10_000.0,
        max_price: f64::INFINITY,
        min_market_cap: 1_000_000_000.0,
        aliases: &["WBTC", "BITCOIN"],
    },
    MajorToken {
        symbol: "SOL",
        canonical_name: "Solana",
        addresses: &[
            ("solana", "So11111111111111111111111111111111111111112"),
            ("ethereum", "0xD31a59c85aE9D8edEFeC411D448f90841571b89c"),
        ],
        min_price: 10.0,
        max_price: f64::INFINITY,
        min_market_cap: 10_000_000_000.0,
        aliases: &["SOLANA", "WSOL"],
    },
    MajorToken {
        symbol: "USDC",
        canonical_name: "USD Coin",
        addresses: &[
            ("ethereum", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            ("solana", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
        ],
        min_price: 0.95,
        max_price: 1.05,
        min_market_cap: 10_000_000_000.0,
        aliases: &["USD-COIN"],
    },
    MajorToken {
        symbol: "USDT",
        canonical_name: "Tether",
        addresses: &[
            ("ethereum", "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            ("solana", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
        ],
        min_price: 0.95,
        max_price: 1.05,
        min_market_cap: 50_000_000_000.0,
        aliases: &["TETHER"],
    },
];

/// Look up a major token by symbol or alias (case-insensitive).
pub fn major_token_criteria(symbol: &str) -> Option<&'static MajorToken> {
    let upper = symbol.to_uppercase();
    MAJOR_TOKENS.iter().find(|t| {
        t.symbol == upper || t.aliases.iter().any(|a| a.eq_ignore_ascii_case(&upper))
    })
}

pub fn is_major_token(symbol: &str) -> bool {
    major_token_criteria(symbol).is_some()
}

/// Canonical address for a major token on a specific chain, if registered.
pub fn canonical_address(symbol: &str, chain: &str) -> Option<&'static str> {
    let chain_lower = chain.to_lowercase();
    major_token_criteria(symbol)?
        .addresses
        .iter()
        .find(|(c, _)| *c == chain_lower)
        .map(|(_, addr)| *addr)
}

/// Guess which chain a message is talking about from DEX/platform names and
/// address shapes. Used only to bias later resolver calls.
pub fn detect_chain_context(message_text: &str) -> Option<&'static str> {
    let lower = message_text.to_lowercase();

    if ["ethereum", "eth mainnet", "erc-20", "uniswap"]
        .iter()
        .any(|w| lower.contains(w))
    {
        return Some("ethereum");
    }
    if ["solana", "spl", "raydium", "jupiter", "pump.fun"]
        .iter()
        .any(|w| lower.contains(w))
    {
        return Some("solana");
    }
    if ["polygon", "matic", "quickswap"].iter().any(|w| lower.contains(w)) {
        return Some("polygon");
    }
    if ["bsc", "binance smart chain", "pancakeswap"]
        .iter()
        .any(|w| lower.contains(w))
    {
        return Some("bsc");
    }

    // Address-shape fallback: 0x runs default to Ethereum.
    if message_text.contains("0x") {
        return Some("ethereum");
    }
    if message_text.split_whitespace().any(|w| {
        (32..=44).contains(&w.len())
            && w.chars()
                .all(|c| matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z'))
    }) {
        return Some("solana");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_same_token() {
        assert!(is_major_token("eth"));
        assert!(is_major_token("WETH"));
        assert!(is_major_token("wbtc"));
        assert!(!is_major_token("PEPE"));
    }

    #[test]
    fn canonical_addresses_per_chain() {
        assert_eq!(
            canonical_address("ETH", "ethereum"),
            Some("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")
        );
        assert_eq!(
            canonical_address("SOL", "solana"),
            Some("So11111111111111111111111111111111111111112")
        );
        assert_eq!(canonical_address("ETH", "tron"), None);
    }

    #[test]
    fn chain_context_from_platform_names() {
        assert_eq!(detect_chain_context("new gem on raydium"), Some("solana"));
        assert_eq!(detect_chain_context("uniswap listing soon"), Some("ethereum"));
        assert_eq!(detect_chain_context("ape it on pancakeswap"), Some("bsc"));
        assert_eq!(detect_chain_context("CA: 0xdeadbeef"), Some("ethereum"));
        assert_eq!(detect_chain_context("nothing here"), None);
    }
}
