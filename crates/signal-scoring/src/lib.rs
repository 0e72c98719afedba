pub mod confidence;
pub mod hdrb;
pub mod sentiment;

pub use confidence::{ConfidenceCalculator, ConfidenceResult};
pub use hdrb::{HdrbScore, HdrbScorer};
pub use sentiment::PatternSentimentAnalyzer;
