//! Console output: the per-message block and the periodic verification
//! report (counts, sentiment distribution, latency percentiles, sink error
//! rate).

use std::sync::Mutex;

use signal_core::Sentiment;

#[derive(Debug, Default)]
struct ReportState {
    processed: u64,
    skipped: u64,
    errors: u64,
    sink_errors: u64,
    positive: u64,
    neutral: u64,
    negative: u64,
    latencies_ms: Vec<f64>,
}

#[derive(Debug, Default)]
pub struct VerificationReport {
    state: Mutex<ReportState>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self, sentiment: Sentiment, latency_ms: f64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.processed += 1;
        match sentiment {
            Sentiment::Positive => state.positive += 1,
            Sentiment::Neutral => state.neutral += 1,
            Sentiment::Negative => state.negative += 1,
        }
        state.latencies_ms.push(latency_ms);
        // Keep the percentile window bounded.
        if state.latencies_ms.len() > 10_000 {
            let overflow = state.latencies_ms.len() - 10_000;
            state.latencies_ms.drain(..overflow);
        }
    }

    pub fn record_skipped(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).skipped += 1;
    }

    pub fn record_error(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).errors += 1;
    }

    pub fn record_sink_error(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).sink_errors += 1;
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Human-readable summary block.
    pub fn summary(&self) -> String {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut sorted = state.latencies_ms.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        format!(
            "=== Verification report ===\n\
             processed: {}  skipped: {}  errors: {}  sink errors: {}\n\
             sentiment: {} positive / {} neutral / {} negative\n\
             latency ms: p50={:.0} p90={:.0} p99={:.0}",
            state.processed,
            state.skipped,
            state.errors,
            state.sink_errors,
            state.positive,
            state.neutral,
            state.negative,
            Self::percentile(&sorted, 0.50),
            Self::percentile(&sorted, 0.90),
            Self::percentile(&sorted, 0.99),
        )
    }

    pub fn log_summary(&self) {
        for line in self.summary().lines() {
            tracing::info!("{}", line);
        }
    }
}

/// Per-message console block printed after processing.
#[allow(clippy::too_many_arguments)]
pub fn render_message_block(
    channel_name: &str,
    message_id: i64,
    hdrb_score: f64,
    raw_ic: f64,
    mentions: &[String],
    addresses: usize,
    sentiment: Sentiment,
    sentiment_score: f64,
    confidence: f64,
    confidence_label: &str,
    processing_ms: f64,
) -> String {
    let sentiment_str = match sentiment {
        Sentiment::Positive => "positive",
        Sentiment::Neutral => "neutral",
        Sentiment::Negative => "negative",
    };
    format!(
        "--- {} (message {}) ---\n\
         HDRB: {:.1}/100 (IC {:.1})\n\
         mentions: {}  addresses: {}\n\
         sentiment: {} ({:+.2})\n\
         confidence: {:.2} [{}]\n\
         processed in {:.0}ms",
        channel_name,
        message_id,
        hdrb_score,
        raw_ic,
        if mentions.is_empty() {
            "-".to_string()
        } else {
            mentions.join(", ")
        },
        addresses,
        sentiment_str,
        sentiment_score,
        confidence,
        confidence_label,
        processing_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_and_percentiles() {
        let report = VerificationReport::new();
        for i in 0..100 {
            report.record_processed(Sentiment::Positive, i as f64);
        }
        report.record_skipped();
        report.record_error();

        let summary = report.summary();
        assert!(summary.contains("processed: 100"));
        assert!(summary.contains("skipped: 1"));
        assert!(summary.contains("100 positive"));
        assert!(summary.contains("p50=50"));
    }

    #[test]
    fn message_block_renders() {
        let block = render_message_block(
            "alpha_calls",
            42,
            55.0,
            550.0,
            &["PEPE".to_string()],
            1,
            Sentiment::Positive,
            0.8,
            0.75,
            "HIGH",
            120.0,
        );
        assert!(block.contains("alpha_calls"));
        assert!(block.contains("HDRB: 55.0/100"));
        assert!(block.contains("[HIGH]"));
    }
}
