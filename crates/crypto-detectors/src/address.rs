//! Address shape validation and chain family classification.
//!
//! EVM: `0x` + 40 hex chars. Solana: base58, 32-44 chars, decoding to exactly
//! 32 bytes. Checksum validation (EIP-55) is deliberately not enforced.

use signal_core::{Address, ChainFamily};

/// Identify the chain family from address shape alone.
pub fn identify_chain(address: &str) -> ChainFamily {
    if is_evm_shape(address) {
        ChainFamily::Evm
    } else if is_base58_shape(address) {
        ChainFamily::Solana
    } else {
        ChainFamily::Unknown
    }
}

/// Validate an address for its chain family. Solana candidates must decode
/// to exactly 32 bytes; a 31-byte decode is rejected.
pub fn validate_address(address: &str, family: ChainFamily) -> bool {
    match family {
        ChainFamily::Evm => is_evm_shape(address),
        ChainFamily::Solana => {
            is_base58_shape(address)
                && bs58::decode(address)
                    .into_vec()
                    .map(|bytes| bytes.len() == 32)
                    .unwrap_or(false)
        }
        ChainFamily::Unknown => false,
    }
}

fn is_evm_shape(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_base58_shape(address: &str) -> bool {
    (32..=44).contains(&address.len())
        && address
            .chars()
            .all(|c| matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z'))
}

/// Turns raw mention strings into validated `Address` records.
pub struct AddressExtractor;

impl AddressExtractor {
    /// Filter mentions down to address-shaped entries, classify and validate
    /// each. Tickers and other words pass through untouched (empty result).
    pub fn extract(mentions: &[String]) -> Vec<Address> {
        let mut addresses = Vec::new();

        for mention in mentions {
            if !Self::looks_like_address(mention) {
                continue;
            }
            let family = identify_chain(mention);
            let valid = validate_address(mention, family);
            if valid {
                tracing::debug!("{:?} address validated: {}...", family, &mention[..10.min(mention.len())]);
            } else {
                tracing::warn!("Invalid address detected: {}...", &mention[..10.min(mention.len())]);
            }
            addresses.push(Address::new(mention.clone(), family, valid));
        }

        if !addresses.is_empty() {
            tracing::info!("Found {} address candidate(s)", addresses.len());
        }

        addresses
    }

    /// Fast pre-filter before full validation.
    pub fn looks_like_address(text: &str) -> bool {
        if text.starts_with("0x") && text.len() == 42 {
            return true;
        }
        (32..=44).contains(&text.len()) && text.chars().next().is_some_and(|c| {
            matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z')
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
    const USDC_SOL: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn evm_shape_accepted_without_checksum() {
        // Mixed-case with an invalid EIP-55 checksum still validates.
        assert!(validate_address(&WETH.to_lowercase(), ChainFamily::Evm));
        assert!(validate_address(WETH, ChainFamily::Evm));
        assert!(!validate_address("0x1234", ChainFamily::Evm));
    }

    #[test]
    fn solana_requires_32_byte_decode() {
        assert!(validate_address(USDC_SOL, ChainFamily::Solana));

        // Valid base58 shape but decodes to 31 bytes: rejected.
        let short = bs58::encode(vec![7u8; 31]).into_string();
        if (32..=44).contains(&short.len()) {
            assert!(!validate_address(&short, ChainFamily::Solana));
        }
        let long = bs58::encode(vec![7u8; 33]).into_string();
        assert!(!validate_address(&long, ChainFamily::Solana));
    }

    #[test]
    fn chain_identification() {
        assert_eq!(identify_chain(WETH), ChainFamily::Evm);
        assert_eq!(identify_chain(USDC_SOL), ChainFamily::Solana);
        assert_eq!(identify_chain("hello"), ChainFamily::Unknown);
    }

    #[test]
    fn extract_classifies_and_validates() {
        let mentions = vec![
            "ETH".to_string(),
            WETH.to_string(),
            USDC_SOL.to_string(),
        ];
        let addresses = AddressExtractor::extract(&mentions);
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].family, ChainFamily::Evm);
        assert!(addresses[0].valid);
        assert_eq!(addresses[0].chain_specific.as_deref(), Some("ethereum"));
        assert_eq!(addresses[1].family, ChainFamily::Solana);
        assert!(addresses[1].valid);
    }
}
