//! Market tier classification and multi-factor risk scoring.
//!
//! Four weighted factors with graceful degradation when data is missing:
//! tier risk 40%, liquidity risk 30%, volume risk 20%, volatility risk 10%.
//! `data_completeness` records how many factors were available (0.25 each).

use signal_core::{MarketTier, PriceData, RiskLevel};

pub struct MarketAnalyzer;

impl MarketAnalyzer {
    /// Fill tier, risk and ratio fields on a merged price record.
    pub fn annotate(data: &mut PriceData) {
        let tier = MarketTier::classify(data.market_cap);
        data.market_tier = Some(tier);

        data.liquidity_ratio = match (data.liquidity_usd, data.market_cap) {
            (Some(liq), Some(mc)) if mc > 0.0 => Some(liq / mc),
            _ => None,
        };
        data.volume_ratio = match (data.volume_24h, data.market_cap) {
            (Some(vol), Some(mc)) if mc > 0.0 => Some(vol / mc),
            _ => None,
        };

        let (risk_score, completeness) = Self::assess_risk(
            tier,
            data.liquidity_ratio,
            data.volume_ratio,
            data.price_change_24h,
        );
        data.risk_score = Some(risk_score);
        data.risk_level = Some(Self::risk_level(risk_score));
        data.data_completeness = completeness;

        tracing::debug!(
            "Market analysis: tier={}, risk={:.1} ({:.0}% data)",
            tier.label(),
            risk_score,
            completeness * 100.0
        );
    }

    fn tier_risk(tier: MarketTier) -> Option<f64> {
        match tier {
            MarketTier::Large => Some(20.0),
            MarketTier::Mid => Some(45.0),
            MarketTier::Small => Some(70.0),
            MarketTier::Micro => Some(95.0),
            MarketTier::Unknown => None,
        }
    }

    /// Weighted risk over the available factors, renormalized so missing data
    /// does not drag the score toward zero.
    fn assess_risk(
        tier: MarketTier,
        liquidity_ratio: Option<f64>,
        volume_ratio: Option<f64>,
        price_change_24h: Option<f64>,
    ) -> (f64, f64) {
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        let mut factors = 0u32;

        if let Some(risk) = Self::tier_risk(tier) {
            weighted += risk * 0.40;
            weight_sum += 0.40;
            factors += 1;
        }
        if let Some(ratio) = liquidity_ratio {
            // 10%+ liquidity/mcap reads as healthy; thin books score high.
            let risk = (100.0 * (1.0 - ratio / 0.10)).clamp(0.0, 100.0);
            weighted += risk * 0.30;
            weight_sum += 0.30;
            factors += 1;
        }
        if let Some(ratio) = volume_ratio {
            let risk = (100.0 * (1.0 - ratio / 0.20)).clamp(0.0, 100.0);
            weighted += risk * 0.20;
            weight_sum += 0.20;
            factors += 1;
        }
        if let Some(change) = price_change_24h {
            let risk = (change.abs() * 2.0).clamp(0.0, 100.0);
            weighted += risk * 0.10;
            weight_sum += 0.10;
            factors += 1;
        }

        if weight_sum == 0.0 {
            // No data at all: maximum uncertainty.
            return (75.0, 0.0);
        }
        (weighted / weight_sum, factors as f64 * 0.25)
    }

    fn risk_level(score: f64) -> RiskLevel {
        if score < 25.0 {
            RiskLevel::Low
        } else if score < 50.0 {
            RiskLevel::Moderate
        } else if score < 75.0 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        assert_eq!(MarketTier::classify(Some(2e9)), MarketTier::Large);
        assert_eq!(MarketTier::classify(Some(5e8)), MarketTier::Mid);
        assert_eq!(MarketTier::classify(Some(5e7)), MarketTier::Small);
        assert_eq!(MarketTier::classify(Some(5e6)), MarketTier::Micro);
        assert_eq!(MarketTier::classify(None), MarketTier::Unknown);
    }

    #[test]
    fn annotate_fills_ratios_and_risk() {
        let mut data = PriceData::new(1.0, "dexscreener");
        data.market_cap = Some(50_000_000.0);
        data.liquidity_usd = Some(5_000_000.0);
        data.volume_24h = Some(10_000_000.0);
        data.price_change_24h = Some(12.0);

        MarketAnalyzer::annotate(&mut data);

        assert_eq!(data.market_tier, Some(MarketTier::Small));
        assert_eq!(data.liquidity_ratio, Some(0.1));
        assert_eq!(data.volume_ratio, Some(0.2));
        assert_eq!(data.data_completeness, 1.0);
        // Tier risk dominates; liquidity and volume are perfect here.
        let risk = data.risk_score.unwrap();
        assert!(risk > 25.0 && risk < 50.0, "risk was {risk}");
        assert_eq!(data.risk_level, Some(RiskLevel::Moderate));
    }

    #[test]
    fn no_data_scores_max_uncertainty() {
        let mut data = PriceData::new(1.0, "defillama");
        MarketAnalyzer::annotate(&mut data);
        assert_eq!(data.market_tier, Some(MarketTier::Unknown));
        assert_eq!(data.data_completeness, 0.0);
        assert_eq!(data.risk_level, Some(RiskLevel::Extreme));
    }
}
