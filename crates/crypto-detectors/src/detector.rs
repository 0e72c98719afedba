//! Cryptocurrency mention detection.
//!
//! Finds ticker symbols (whole-word, case-insensitive, from a configured
//! set), address-shaped substrings, and crypto keywords in raw message text.
//! Detection is shape-only; cryptographic validation happens downstream.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

/// Ticker configuration file shape: category name -> list of symbols.
#[derive(Debug, Default, Deserialize)]
struct TickerConfig {
    #[serde(flatten)]
    categories: std::collections::BTreeMap<String, Vec<String>>,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_base58_char(c: char) -> bool {
    matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z')
}

/// Scan for EVM-shaped addresses: `0x` followed by exactly 40 hex chars.
fn find_evm_addresses(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i + 42 <= bytes.len() {
        if bytes[i] == b'0' && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X') {
            let hex_run = bytes[i + 2..]
                .iter()
                .take_while(|b| b.is_ascii_hexdigit())
                .count();
            if hex_run >= 40 {
                // Exactly 40 hex chars; a longer run is a hash, not an address.
                if hex_run == 40 {
                    found.push(text[i..i + 42].to_string());
                }
                i += 2 + hex_run;
                continue;
            }
        }
        i += 1;
    }
    found
}

/// Scan for base58 runs of plausible Solana-address length (32-44 chars).
fn find_base58_candidates(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if is_base58_char(c) {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            let run = &text[start..i];
            if (32..=44).contains(&run.len()) && !run.starts_with("0x") {
                found.push(run.to_string());
            }
        }
    }
    if let Some(start) = run_start {
        let run = &text[start..];
        if (32..=44).contains(&run.len()) && !run.starts_with("0x") {
            found.push(run.to_string());
        }
    }
    found
}

/// Detects crypto mentions (tickers + addresses) and crypto relevance.
pub struct MentionDetector {
    tickers: HashSet<String>,
    keywords: Vec<String>,
    functional: bool,
}

impl MentionDetector {
    /// Build from explicit sets. Tickers are uppercased and deduplicated.
    pub fn new(tickers: impl IntoIterator<Item = String>, keywords: Vec<String>) -> Self {
        let tickers: HashSet<String> = tickers.into_iter().map(|t| t.to_uppercase()).collect();
        let keywords: Vec<String> = keywords.into_iter().map(|k| k.to_lowercase()).collect();

        let functional = !tickers.is_empty() || !keywords.is_empty();
        if !functional {
            tracing::warn!(
                "Mention detector has no tickers and no keywords; detection is non-functional"
            );
        } else {
            tracing::info!(
                "Mention detector initialized ({} tickers, {} keywords)",
                tickers.len(),
                keywords.len()
            );
        }

        Self {
            tickers,
            keywords,
            functional,
        }
    }

    /// Load the ticker map (category -> symbols, flattened) and keyword list
    /// from JSON data files. Missing or malformed files yield empty sets with
    /// a warning; the pipeline keeps running.
    pub fn from_files(tickers_path: &Path, keywords_path: &Path) -> Self {
        let tickers = match std::fs::read(tickers_path) {
            Ok(bytes) => match serde_json::from_slice::<TickerConfig>(&bytes) {
                Ok(config) => config.categories.into_values().flatten().collect(),
                Err(e) => {
                    tracing::warn!("Malformed ticker file {}: {}", tickers_path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => {
                tracing::warn!("Ticker file not found: {}", tickers_path.display());
                Vec::new()
            }
        };

        let keywords = match std::fs::read(keywords_path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<String>>(&bytes) {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!("Malformed keyword file {}: {}", keywords_path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => {
                tracing::warn!("Keyword file not found: {}", keywords_path.display());
                Vec::new()
            }
        };

        Self::new(tickers, keywords)
    }

    pub fn is_functional(&self) -> bool {
        self.functional
    }

    /// Detect all crypto mentions in order of appearance, deduplicated.
    /// Tickers come back uppercased; addresses keep their original casing.
    pub fn detect_mentions(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut mentions: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut push = |m: String, mentions: &mut Vec<String>| {
            if seen.insert(m.clone()) {
                mentions.push(m);
            }
        };

        // Ticker symbols: whole-word, case-insensitive.
        if !self.tickers.is_empty() {
            for word in text.split(|c: char| !is_word_char(c)) {
                if word.is_empty() {
                    continue;
                }
                let upper = word.to_uppercase();
                if self.tickers.contains(&upper) {
                    push(upper, &mut mentions);
                }
            }
        }

        for addr in find_evm_addresses(text) {
            push(addr, &mut mentions);
        }

        for candidate in find_base58_candidates(text) {
            push(candidate, &mut mentions);
        }

        if !mentions.is_empty() {
            tracing::debug!("Crypto mentions found: {:?}", mentions);
        }

        mentions
    }

    /// A message is crypto-relevant when it has mentions or matches any
    /// configured crypto keyword.
    pub fn is_crypto_relevant(&self, text: &str, mentions: &[String]) -> bool {
        if !mentions.is_empty() {
            return true;
        }
        if self.keywords.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.keywords.iter().any(|kw| contains_word(&lower, kw))
    }
}

/// Substring match with word boundaries on both sides, so "eth" does not
/// match inside "together". Keywords may be multi-word phrases.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = start == 0
            || !haystack[..start]
                .chars()
                .next_back()
                .is_some_and(is_word_char);
        let after_ok = end == haystack.len()
            || !haystack[end..].chars().next().is_some_and(is_word_char);
        if before_ok && after_ok {
            return true;
        }
        from = start
            + haystack[start..]
                .chars()
                .next()
                .map_or(1, |c| c.len_utf8());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> MentionDetector {
        MentionDetector::new(
            vec!["BTC".to_string(), "ETH".to_string(), "PEPE".to_string()],
            vec!["airdrop".to_string(), "smart contract".to_string()],
        )
    }

    #[test]
    fn detects_tickers_whole_word_case_insensitive() {
        let d = detector();
        let mentions = d.detect_mentions("buying eth and pepe today");
        assert_eq!(mentions, vec!["ETH", "PEPE"]);

        // "ETHereum" is not a whole-word ETH match.
        assert!(d.detect_mentions("ethereumlike word").is_empty());
    }

    #[test]
    fn detects_evm_addresses_exact_length() {
        let d = detector();
        let text = "gem: 0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2 !!";
        let mentions = d.detect_mentions(text);
        assert_eq!(mentions, vec!["0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"]);

        // 64 hex chars is a tx hash, not an address.
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(d.detect_mentions(&hash).is_empty());
    }

    #[test]
    fn detects_base58_candidates() {
        let d = detector();
        let mentions = d.detect_mentions("ape EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v now");
        assert_eq!(mentions, vec!["EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"]);
    }

    #[test]
    fn dedupes_preserving_order() {
        let d = detector();
        let mentions = d.detect_mentions("ETH eth BTC eth");
        assert_eq!(mentions, vec!["ETH", "BTC"]);
    }

    #[test]
    fn relevance_from_keywords_without_mentions() {
        let d = detector();
        assert!(d.is_crypto_relevant("new airdrop coming", &[]));
        assert!(d.is_crypto_relevant("deploying a smart contract", &[]));
        assert!(!d.is_crypto_relevant("going to the gym together", &[]));
    }

    #[test]
    fn empty_sets_mark_detector_non_functional() {
        let d = MentionDetector::new(Vec::new(), Vec::new());
        assert!(!d.is_functional());
        assert!(d.detect_mentions("anything").is_empty());
    }
}
