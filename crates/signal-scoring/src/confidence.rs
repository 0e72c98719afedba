//! Composite confidence scoring with reputation adjustment.
//!
//! Base confidence is a weighted sum of four components, each in [0, 1]:
//! HDRB 40%, crypto relevance 30%, sentiment clarity 20%, message length 10%.
//! When a channel reputation is available, the base is multiplied by a factor
//! derived from the channel's Sharpe-like ratio and re-clamped.

use signal_core::{ReputationSnapshot, ReputationView};

#[derive(Debug, Clone)]
pub struct ConfidenceResult {
    pub base: f64,
    pub adjusted: f64,
    pub adjustment_factor: f64,
    pub is_high: bool,
    pub label: &'static str,
}

pub struct ConfidenceCalculator {
    threshold: f64,
}

impl ConfidenceCalculator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Base confidence from message features alone.
    pub fn base_confidence(
        &self,
        hdrb_score: f64,
        mention_count: usize,
        sentiment_score: f64,
        message_length: usize,
    ) -> f64 {
        let hdrb_component = (hdrb_score / 100.0) * 0.4;
        let crypto_component = if mention_count > 0 { 0.3 } else { 0.0 };
        let sentiment_component = sentiment_score.abs() * 0.2;
        let length_component = (message_length as f64 / 200.0).min(1.0) * 0.1;

        let confidence = hdrb_component + crypto_component + sentiment_component + length_component;
        confidence.clamp(0.0, 1.0)
    }

    /// Sharpe-ratio-based adjustment factor:
    /// >1.5 -> 1.25, 1.0-1.5 -> 1.20, 0.5-1.0 -> 1.10, 0.0-0.5 -> 1.00,
    /// negative -> 0.90.
    fn adjustment_factor(sharpe_ratio: f64) -> f64 {
        if sharpe_ratio > 1.5 {
            1.25
        } else if sharpe_ratio >= 1.0 {
            1.20
        } else if sharpe_ratio >= 0.5 {
            1.10
        } else if sharpe_ratio >= 0.0 {
            1.00
        } else {
            0.90
        }
    }

    /// Full scoring pass: base, reputation adjustment, HIGH/LOW label.
    pub fn score(
        &self,
        hdrb_score: f64,
        mention_count: usize,
        sentiment_score: f64,
        message_length: usize,
        reputation: Option<&dyn ReputationView>,
        channel_name: &str,
    ) -> ConfidenceResult {
        let base = self.base_confidence(hdrb_score, mention_count, sentiment_score, message_length);

        let snapshot: Option<ReputationSnapshot> =
            reputation.and_then(|view| view.snapshot(channel_name));

        let adjustment_factor = snapshot
            .map(|s| Self::adjustment_factor(s.sharpe_ratio))
            .unwrap_or(1.0);

        let adjusted = (base * adjustment_factor).clamp(0.0, 1.0);

        if let Some(s) = snapshot {
            tracing::debug!(
                "Confidence adjusted: {:.2} -> {:.2} ({:?}, Sharpe={:.2}, factor={:.2})",
                base,
                adjusted,
                s.reputation_tier,
                s.sharpe_ratio,
                adjustment_factor
            );
        }

        let is_high = adjusted >= self.threshold;
        ConfidenceResult {
            base,
            adjusted,
            adjustment_factor,
            is_high,
            label: if is_high { "HIGH" } else { "LOW" },
        }
    }
}

impl Default for ConfidenceCalculator {
    fn default() -> Self {
        Self::new(0.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::ReputationTier;

    struct FixedReputation(f64);

    impl ReputationView for FixedReputation {
        fn snapshot(&self, _channel_name: &str) -> Option<ReputationSnapshot> {
            Some(ReputationSnapshot {
                reputation_score: 80.0,
                reputation_tier: ReputationTier::Excellent,
                sharpe_ratio: self.0,
                expected_roi: 2.0,
            })
        }
    }

    #[test]
    fn base_components_weighted_sum() {
        let calc = ConfidenceCalculator::default();
        // Full marks on every component.
        let full = calc.base_confidence(100.0, 2, 1.0, 400);
        assert!((full - 1.0).abs() < 1e-9);

        // HDRB only.
        let hdrb_only = calc.base_confidence(50.0, 0, 0.0, 0);
        assert!((hdrb_only - 0.2).abs() < 1e-9);

        // Mentions flip the 0.3 component on.
        let with_mentions = calc.base_confidence(0.0, 1, 0.0, 0);
        assert!((with_mentions - 0.3).abs() < 1e-9);

        // Length saturates at 200 chars.
        let long = calc.base_confidence(0.0, 0, 0.0, 1000);
        assert!((long - 0.1).abs() < 1e-9);
    }

    #[test]
    fn sharpe_ladder() {
        let calc = ConfidenceCalculator::default();
        let score = |sharpe: f64| {
            calc.score(50.0, 1, 0.5, 100, Some(&FixedReputation(sharpe)), "ch")
                .adjustment_factor
        };
        assert_eq!(score(2.0), 1.25);
        assert_eq!(score(1.2), 1.20);
        assert_eq!(score(0.7), 1.10);
        assert_eq!(score(0.2), 1.00);
        assert_eq!(score(-0.5), 0.90);
    }

    #[test]
    fn adjusted_confidence_is_clamped() {
        let calc = ConfidenceCalculator::default();
        let result = calc.score(100.0, 3, 1.0, 500, Some(&FixedReputation(3.0)), "ch");
        assert_eq!(result.adjusted, 1.0);
    }

    #[test]
    fn high_low_label_uses_threshold() {
        let calc = ConfidenceCalculator::new(0.7);
        let low = calc.score(40.0, 1, 0.0, 100, None, "ch");
        assert!(!low.is_high);
        assert_eq!(low.label, "LOW");

        let high = calc.score(90.0, 1, 0.9, 300, None, "ch");
        assert!(high.is_high);
        assert_eq!(high.label, "HIGH");
    }
}
