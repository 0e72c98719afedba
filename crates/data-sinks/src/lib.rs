//! CSV sinks: an append-only message log and keyed upsert tables.
//!
//! Upsert tables identify rows by normalized composite keys (addresses
//! lowercased, symbols uppercased, quote prefixes stripped) so fresh-start
//! re-monitoring and case drift never duplicate rows. Prices are written in
//! fixed notation. Writes retry once after a short delay.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use signal_core::keys::{format_price, normalize_address, normalize_symbol};
use signal_core::{
    ChannelReputation, CoinCrossChannel, MessageEvent, SignalError, SignalOutcome,
};

const SINK_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Run a sink write, retrying once after a delay on failure.
async fn with_retry<F>(describe: &str, mut write: F) -> Result<(), SignalError>
where
    F: FnMut() -> Result<(), SignalError>,
{
    match write() {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::warn!("{} failed ({}), retrying in {:?}", describe, first, SINK_RETRY_DELAY);
            tokio::time::sleep(SINK_RETRY_DELAY).await;
            write().map_err(|second| {
                tracing::error!("{} failed after retry: {}", describe, second);
                second
            })
        }
    }
}

fn read_rows(path: &Path, expected_headers: &[&str]) -> Result<Vec<Vec<String>>, SignalError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path).map_err(|e| SignalError::Storage(e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| SignalError::Storage(e.to_string()))?;
    if headers.iter().ne(expected_headers.iter().copied()) {
        tracing::warn!(
            "Header mismatch in {}; rewriting table",
            path.display()
        );
        return Ok(Vec::new());
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SignalError::Storage(e.to_string()))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }
    Ok(rows)
}

fn write_rows(
    path: &Path,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<(), SignalError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(headers)
        .map_err(|e| SignalError::Storage(e.to_string()))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| SignalError::Storage(e.to_string()))?;
    }
    let payload = writer
        .into_inner()
        .map_err(|e| SignalError::Storage(e.to_string()))?;
    atomic_store::write_bytes(path, &payload)
}

/// Generic upsert table: row identity is the tuple of `key_columns`.
/// Existing rows are overwritten in place; new rows append.
pub struct CsvUpsertSink {
    path: PathBuf,
    headers: Vec<&'static str>,
    key_columns: Vec<usize>,
}

impl CsvUpsertSink {
    pub fn new(path: impl Into<PathBuf>, headers: Vec<&'static str>, key_columns: Vec<usize>) -> Self {
        Self {
            path: path.into(),
            headers,
            key_columns,
        }
    }

    fn key_of(&self, row: &[String]) -> String {
        self.key_columns
            .iter()
            .map(|i| row.get(*i).map(String::as_str).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("|")
    }

    pub async fn upsert_rows(&self, incoming: Vec<Vec<String>>) -> Result<(), SignalError> {
        let describe = format!("Upsert into {}", self.path.display());
        with_retry(&describe, || {
            let existing = read_rows(&self.path, &self.headers)?;
            let mut by_key: BTreeMap<String, Vec<String>> = existing
                .into_iter()
                .map(|row| (self.key_of(&row), row))
                .collect();
            for row in &incoming {
                by_key.insert(self.key_of(row), row.clone());
            }
            let rows: Vec<Vec<String>> = by_key.into_values().collect();
            write_rows(&self.path, &self.headers, &rows)
        })
        .await
    }

    pub fn row_count(&self) -> usize {
        read_rows(&self.path, &self.headers).map(|r| r.len()).unwrap_or(0)
    }
}

/// Append-only log of every admitted message.
pub struct MessageLogSink {
    path: PathBuf,
}

const MESSAGE_LOG_HEADERS: &[&str] = &[
    "timestamp",
    "channel_name",
    "message_id",
    "text",
    "mentions",
    "hdrb_score",
    "sentiment",
    "sentiment_score",
    "confidence",
];

impl MessageLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        event: &MessageEvent,
        mentions: &[String],
        hdrb_score: f64,
        sentiment: &str,
        sentiment_score: f64,
        confidence: f64,
    ) -> Result<(), SignalError> {
        let path = self.path.clone();
        let row = vec![
            event.timestamp.to_rfc3339(),
            event.channel_name.clone(),
            event.message_id.to_string(),
            event.text.chars().take(500).collect(),
            mentions.join(" "),
            format!("{:.1}", hdrb_score),
            sentiment.to_string(),
            format!("{:+.2}", sentiment_score),
            format!("{:.2}", confidence),
        ];

        with_retry("Message log append", move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let fresh = !path.exists();
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            if fresh {
                writer
                    .write_record(MESSAGE_LOG_HEADERS)
                    .map_err(|e| SignalError::Storage(e.to_string()))?;
            }
            writer
                .write_record(&row)
                .map_err(|e| SignalError::Storage(e.to_string()))?;
            writer
                .flush()
                .map_err(|e| SignalError::Storage(e.to_string()))?;
            Ok(())
        })
        .await
    }
}

/// The full set of upsert tables the pipeline republishes.
pub struct DataSinks {
    pub messages: MessageLogSink,
    pub performance: CsvUpsertSink,
    pub reputations: CsvUpsertSink,
    pub cross_channel: CsvUpsertSink,
}

impl DataSinks {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let dir = output_dir.into();
        Self {
            messages: MessageLogSink::new(dir.join("messages.csv")),
            performance: CsvUpsertSink::new(
                dir.join("signal_performance.csv"),
                vec![
                    "address",
                    "first_message_id",
                    "symbol",
                    "channel_name",
                    "signal_number",
                    "entry_price",
                    "ath_price",
                    "ath_multiplier",
                    "days_to_ath",
                    "current_multiplier",
                    "status",
                    "outcome_category",
                    "is_winner",
                ],
                vec![0, 1],
            ),
            reputations: CsvUpsertSink::new(
                dir.join("channel_reputations.csv"),
                vec![
                    "channel_name",
                    "reputation_score",
                    "reputation_tier",
                    "total_signals",
                    "win_rate",
                    "average_roi",
                    "median_roi",
                    "sharpe_ratio",
                    "speed_score",
                    "expected_roi",
                ],
                vec![0],
            ),
            cross_channel: CsvUpsertSink::new(
                dir.join("coins_cross_channel.csv"),
                vec![
                    "address",
                    "symbol",
                    "total_mentions",
                    "total_channels",
                    "average_roi",
                    "consensus_strength",
                    "best_channel",
                    "worst_channel",
                ],
                vec![0],
            ),
        }
    }

    /// Performance row identity is `(address, first_message_id)`, where the
    /// first message is the one that admitted this signal instance. Each
    /// fresh-start generation starts from its own message, so generations
    /// never collide on the key.
    pub async fn upsert_performance(&self, outcome: &SignalOutcome) -> Result<(), SignalError> {
        let row = vec![
            normalize_address(&outcome.address),
            outcome.message_id.to_string(),
            outcome
                .symbol
                .as_deref()
                .map(normalize_symbol)
                .unwrap_or_default(),
            outcome.channel_name.clone(),
            outcome.signal_number.to_string(),
            format_price(outcome.entry_price),
            format_price(outcome.ath_price),
            format!("{:.3}", outcome.ath_multiplier),
            format!("{:.2}", outcome.days_to_ath),
            format!("{:.3}", outcome.current_multiplier),
            outcome.status.label().to_string(),
            outcome
                .outcome_category
                .map(|c| c.label().to_string())
                .unwrap_or_default(),
            outcome.is_winner.to_string(),
        ];
        self.performance.upsert_rows(vec![row]).await
    }

    pub async fn upsert_reputations(
        &self,
        reputations: &[ChannelReputation],
    ) -> Result<(), SignalError> {
        let rows: Vec<Vec<String>> = reputations
            .iter()
            .map(|r| {
                vec![
                    r.channel_name.clone(),
                    format!("{:.1}", r.reputation_score),
                    format!("{:?}", r.reputation_tier),
                    r.total_signals.to_string(),
                    format!("{:.1}", r.win_rate),
                    format!("{:.3}", r.average_roi),
                    format!("{:.3}", r.median_roi),
                    format!("{:.3}", r.sharpe_ratio),
                    format!("{:.1}", r.speed_score),
                    format!("{:.3}", r.expected_roi),
                ]
            })
            .collect();
        self.reputations.upsert_rows(rows).await
    }

    pub async fn upsert_cross_channel(
        &self,
        coins: &[CoinCrossChannel],
    ) -> Result<(), SignalError> {
        let rows: Vec<Vec<String>> = coins
            .iter()
            .map(|c| {
                vec![
                    normalize_address(&c.address),
                    normalize_symbol(&c.symbol),
                    c.total_mentions.to_string(),
                    c.total_channels.to_string(),
                    format!("{:.3}", c.average_roi_all_channels),
                    format!("{:.3}", c.consensus_strength),
                    c.best_channel.clone().unwrap_or_default(),
                    c.worst_channel.clone().unwrap_or_default(),
                ]
            })
            .collect();
        self.cross_channel.upsert_rows(rows).await
    }
}
