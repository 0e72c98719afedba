//! Pattern-based sentiment analysis.
//!
//! Counts positive and negative indicator matches (optionally including
//! crypto-specific vocabulary) and maps the dominant side onto a score in
//! [-1, 1]. Implements the pluggable `SentimentAnalyzer` capability; a
//! model-backed analyzer can be layered behind the same trait.

use signal_core::{Sentiment, SentimentAnalyzer};

const POSITIVE_PATTERNS: &[&str] = &[
    "moon", "bullish", "pump", "breakout", "rally", "surge", "rocket", "🚀", "📈", "buy",
    "long", "calls", "gem", "bullrun", "lambo", "gains", "profit", "green", "strong",
    "support", "bounce", "recovery", "momentum",
];

const CRYPTO_POSITIVE: &[&str] = &[
    "wagmi",
    "lfg",
    "degen",
    "ape",
    "diamond hands",
    "hodl",
    "alpha",
    "based",
    "chad",
    "moonshot",
    "to the moon",
];

const NEGATIVE_PATTERNS: &[&str] = &[
    "dump", "bearish", "crash", "rug", "scam", "exit", "sell", "short", "📉", "warning",
    "avoid", "dead", "rekt", "liquidated", "ponzi", "red", "weak", "resistance", "drop",
    "fall", "loss", "bear",
];

const CRYPTO_NEGATIVE: &[&str] = &[
    "ngmi",
    "paper hands",
    "fud",
    "jeet",
    "rugged",
    "honeypot",
    "bagholder",
    "exit liquidity",
    "vaporware",
    "shitcoin",
    "pump and dump",
    "wash trading",
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whole-word (or whole-phrase) containment check over lowercased text.
fn count_matches(text: &str, patterns: &[&str]) -> usize {
    patterns
        .iter()
        .filter(|pattern| {
            let mut from = 0;
            while let Some(pos) = text[from..].find(*pattern) {
                let start = from + pos;
                let end = start + pattern.len();
                let boundary_before = start == 0
                    || !text[..start].chars().next_back().is_some_and(is_word_char);
                let boundary_after =
                    end == text.len() || !text[end..].chars().next().is_some_and(is_word_char);
                // Emoji patterns have no word boundaries to respect.
                if (boundary_before && boundary_after)
                    || !pattern.chars().next().is_some_and(is_word_char)
                {
                    return true;
                }
                from = start
                    + text[start..]
                        .chars()
                        .next()
                        .map_or(1, |c| c.len_utf8());
            }
            false
        })
        .count()
}

pub struct PatternSentimentAnalyzer {
    positive: Vec<&'static str>,
    negative: Vec<&'static str>,
}

impl PatternSentimentAnalyzer {
    pub fn new(use_crypto_vocabulary: bool) -> Self {
        let mut positive = POSITIVE_PATTERNS.to_vec();
        let mut negative = NEGATIVE_PATTERNS.to_vec();
        if use_crypto_vocabulary {
            positive.extend_from_slice(CRYPTO_POSITIVE);
            negative.extend_from_slice(CRYPTO_NEGATIVE);
            tracing::debug!("Crypto-specific sentiment vocabulary enabled");
        }
        tracing::info!(
            "Pattern sentiment analyzer initialized ({} positive, {} negative patterns)",
            positive.len(),
            negative.len()
        );
        Self { positive, negative }
    }
}

impl Default for PatternSentimentAnalyzer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SentimentAnalyzer for PatternSentimentAnalyzer {
    fn analyze(&self, text: &str) -> (Sentiment, f64) {
        if text.is_empty() {
            return (Sentiment::Neutral, 0.0);
        }

        let lower = text.to_lowercase();
        let positive_count = count_matches(&lower, &self.positive);
        let negative_count = count_matches(&lower, &self.negative);
        let total = positive_count + negative_count;

        if total == 0 || positive_count == negative_count {
            return (Sentiment::Neutral, 0.0);
        }

        if positive_count > negative_count {
            let ratio = positive_count as f64 / total as f64;
            (Sentiment::Positive, 0.5 + ratio * 0.5)
        } else {
            let ratio = negative_count as f64 / total as f64;
            (Sentiment::Negative, -0.5 - ratio * 0.5)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_positive() {
        let analyzer = PatternSentimentAnalyzer::default();
        let (label, score) = analyzer.analyze("this gem is going to moon, huge gains 🚀");
        assert_eq!(label, Sentiment::Positive);
        assert!(score > 0.5);
    }

    #[test]
    fn clear_negative() {
        let analyzer = PatternSentimentAnalyzer::default();
        let (label, score) = analyzer.analyze("total rug, devs dumped, avoid this scam");
        assert_eq!(label, Sentiment::Negative);
        assert!(score < -0.5);
    }

    #[test]
    fn neutral_when_silent_or_balanced() {
        let analyzer = PatternSentimentAnalyzer::default();
        assert_eq!(analyzer.analyze("contract deployed at noon"), (Sentiment::Neutral, 0.0));
        assert_eq!(analyzer.analyze("pump then dump"), (Sentiment::Neutral, 0.0));
        assert_eq!(analyzer.analyze(""), (Sentiment::Neutral, 0.0));
    }

    #[test]
    fn crypto_vocabulary_is_optional() {
        let with = PatternSentimentAnalyzer::new(true);
        let without = PatternSentimentAnalyzer::new(false);
        let (label, _) = with.analyze("wagmi lfg");
        assert_eq!(label, Sentiment::Positive);
        let (label, _) = without.analyze("wagmi lfg");
        assert_eq!(label, Sentiment::Neutral);
    }

    #[test]
    fn whole_word_matching() {
        let analyzer = PatternSentimentAnalyzer::default();
        // "selling" must not match "sell", "bullish" inside a word must not fire.
        let (label, _) = analyzer.analyze("reselling tickets");
        assert_eq!(label, Sentiment::Neutral);
    }

    #[test]
    fn score_magnitude_reflects_dominance() {
        let analyzer = PatternSentimentAnalyzer::default();
        let (_, clear) = analyzer.analyze("moon moon pump rally gem");
        let (_, mixed) = analyzer.analyze("moon pump rally but beware the dump");
        assert!(clear > mixed);
    }
}
