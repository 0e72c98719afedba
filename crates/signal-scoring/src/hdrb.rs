//! HDRB salience scoring from engagement counters.
//!
//! The raw information-content value weighs forwards, reactions and replies,
//! scaled by audience reach (views). It is normalized onto [0, 100] by
//! clipping at `max_ic`. The weights and `max_ic` are tunables; callers see
//! both the raw and normalized values.

use signal_core::Engagement;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HdrbScore {
    pub raw_ic: f64,
    pub normalized: f64,
}

#[derive(Debug, Clone)]
pub struct HdrbScorer {
    max_ic: f64,
    forward_weight: f64,
    reaction_weight: f64,
    reply_weight: f64,
}

impl HdrbScorer {
    pub fn new(max_ic: f64) -> Self {
        Self {
            max_ic: if max_ic > 0.0 { max_ic } else { 1000.0 },
            forward_weight: 2.0,
            reaction_weight: 1.5,
            reply_weight: 1.25,
        }
    }

    pub fn with_weights(
        max_ic: f64,
        forward_weight: f64,
        reaction_weight: f64,
        reply_weight: f64,
    ) -> Self {
        Self {
            max_ic: if max_ic > 0.0 { max_ic } else { 1000.0 },
            forward_weight,
            reaction_weight,
            reply_weight,
        }
    }

    /// Missing counters default to zero upstream (`Engagement` is zeroed).
    pub fn calculate_score(&self, engagement: &Engagement) -> HdrbScore {
        let base = self.forward_weight * engagement.forwards as f64
            + self.reaction_weight * engagement.reactions as f64
            + self.reply_weight * engagement.replies as f64;

        // Reach factor: log-scaled so giant channels don't saturate the score
        // on view count alone.
        let reach = 1.0 + (1.0 + engagement.views as f64 / 1000.0).ln();
        let raw_ic = base * reach;

        let normalized = (raw_ic / self.max_ic).clamp(0.0, 1.0) * 100.0;

        HdrbScore { raw_ic, normalized }
    }
}

impl Default for HdrbScorer {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_engagement_scores_zero() {
        let score = HdrbScorer::default().calculate_score(&Engagement::default());
        assert_eq!(score.raw_ic, 0.0);
        assert_eq!(score.normalized, 0.0);
    }

    #[test]
    fn normalization_clips_at_max_ic() {
        let scorer = HdrbScorer::new(100.0);
        let huge = Engagement {
            forwards: 10_000,
            reactions: 10_000,
            replies: 10_000,
            views: 1_000_000,
        };
        let score = scorer.calculate_score(&huge);
        assert!(score.raw_ic > 100.0);
        assert_eq!(score.normalized, 100.0);
    }

    #[test]
    fn forwards_weigh_more_than_replies() {
        let scorer = HdrbScorer::default();
        let forwards = scorer.calculate_score(&Engagement {
            forwards: 10,
            ..Engagement::default()
        });
        let replies = scorer.calculate_score(&Engagement {
            replies: 10,
            ..Engagement::default()
        });
        assert!(forwards.raw_ic > replies.raw_ic);
    }

    #[test]
    fn views_scale_the_base_signal() {
        let scorer = HdrbScorer::default();
        let quiet = scorer.calculate_score(&Engagement {
            forwards: 5,
            ..Engagement::default()
        });
        let loud = scorer.calculate_score(&Engagement {
            forwards: 5,
            views: 50_000,
            ..Engagement::default()
        });
        assert!(loud.raw_ic > quiet.raw_ic);
        // Views alone carry no signal without base engagement.
        let views_only = scorer.calculate_score(&Engagement {
            views: 50_000,
            ..Engagement::default()
        });
        assert_eq!(views_only.raw_ic, 0.0);
    }
}
