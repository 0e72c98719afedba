//! Environment-driven configuration.
//!
//! Startup-time validation is strict: bad chat credentials or a completely
//! empty detection vocabulary abort the process. An invalid log level falls
//! back to INFO.

use std::path::PathBuf;
use std::time::Duration;

use signal_core::SignalError;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Chat transport credentials. The transport itself is an external
/// collaborator; the pipeline only validates and hands these through.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
}

impl ChatConfig {
    pub fn from_env() -> Result<Option<Self>, SignalError> {
        let (Some(api_id), Some(api_hash), Some(phone)) = (
            env_var("CHAT_API_ID"),
            env_var("CHAT_API_HASH"),
            env_var("CHAT_PHONE"),
        ) else {
            // No credentials: replay-source mode.
            return Ok(None);
        };

        let api_id: i32 = api_id
            .parse()
            .map_err(|_| SignalError::Config("CHAT_API_ID must be an integer".to_string()))?;

        let config = Self {
            api_id,
            api_hash,
            phone,
        };
        config.validate()?;
        Ok(Some(config))
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        if self.api_id <= 0 {
            return Err(SignalError::Config("CHAT_API_ID must be positive".to_string()));
        }
        if self.api_hash.len() != 32 {
            return Err(SignalError::Config(
                "CHAT_API_HASH must be 32 characters".to_string(),
            ));
        }
        if !self.phone.starts_with('+')
            || self.phone.len() < 8
            || !self.phone[1..].chars().all(|c| c.is_ascii_digit())
        {
            return Err(SignalError::Config(
                "CHAT_PHONE must be E.164 (+<country><number>)".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chat: Option<ChatConfig>,

    // Pipeline
    pub confidence_threshold: f64,
    pub max_queue_size: usize,
    pub messages_per_second: f64,
    pub reputation_update_interval: Duration,
    pub historical_price_timeout: Duration,
    pub ohlc_fetch_timeout: Duration,

    // Filter
    pub min_market_cap: f64,
    pub min_price: f64,
    pub allow_missing_market_cap: bool,

    // Scorer
    pub max_ic: f64,
    pub use_crypto_vocabulary: bool,

    // Providers
    pub metadata_api_key: Option<String>,
    pub explorer_api_key: Option<String>,
    pub daily_candle_api_key: String,
    pub rpc_url: Option<String>,

    // Paths
    pub data_dir: PathBuf,
    pub csv_output_dir: PathBuf,
    pub tickers_path: PathBuf,
    pub keywords_path: PathBuf,
    pub symbol_mapping_path: Option<PathBuf>,
    pub replay_path: Option<PathBuf>,

    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, SignalError> {
        let data_dir = PathBuf::from(env_var("DATA_DIR").unwrap_or_else(|| "data".to_string()));

        let log_level = match env_var("LOG_LEVEL")
            .unwrap_or_else(|| "INFO".to_string())
            .to_uppercase()
            .as_str()
        {
            level @ ("DEBUG" | "INFO" | "WARNING" | "ERROR" | "CRITICAL") => level.to_string(),
            other => {
                eprintln!("Invalid LOG_LEVEL '{}', falling back to INFO", other);
                "INFO".to_string()
            }
        };

        Ok(Self {
            chat: ChatConfig::from_env()?,
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", 0.7),
            max_queue_size: env_parse("MAX_QUEUE_SIZE", 1000),
            messages_per_second: env_parse("MESSAGES_PER_SECOND", 2.0),
            reputation_update_interval: Duration::from_secs(env_parse(
                "REPUTATION_UPDATE_INTERVAL_SECONDS",
                1800,
            )),
            historical_price_timeout: Duration::from_secs(env_parse(
                "HISTORICAL_PRICE_TIMEOUT",
                15,
            )),
            ohlc_fetch_timeout: Duration::from_secs(env_parse("OHLC_FETCH_TIMEOUT", 30)),
            min_market_cap: env_parse("MIN_MARKET_CAP", 10_000.0),
            min_price: env_parse("MIN_PRICE", 0.000001),
            allow_missing_market_cap: env_parse("ALLOW_MISSING_MARKET_CAP", false),
            max_ic: env_parse("MAX_IC", 1000.0),
            use_crypto_vocabulary: env_parse("USE_CRYPTO_VOCABULARY", true),
            metadata_api_key: env_var("METADATA_API_KEY"),
            explorer_api_key: env_var("EXPLORER_API_KEY"),
            daily_candle_api_key: env_var("DAILY_CANDLE_API_KEY").unwrap_or_default(),
            rpc_url: env_var("EVM_RPC_URL"),
            csv_output_dir: env_var("CSV_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("output")),
            tickers_path: env_var("TICKERS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("config/tickers.json")),
            keywords_path: env_var("KEYWORDS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("config/keywords.json")),
            symbol_mapping_path: env_var("SYMBOL_MAPPING_PATH").map(PathBuf::from),
            replay_path: env_var("REPLAY_PATH").map(PathBuf::from),
            data_dir,
            log_level,
        })
    }

    pub fn reputation_dir(&self) -> PathBuf {
        self.data_dir.join("reputation")
    }

    pub fn active_tracking_path(&self) -> PathBuf {
        self.reputation_dir().join("active_tracking.json")
    }

    pub fn completed_history_path(&self) -> PathBuf {
        self.reputation_dir().join("completed_history.json")
    }

    pub fn channels_path(&self) -> PathBuf {
        self.reputation_dir().join("channels.json")
    }

    pub fn cross_channel_path(&self) -> PathBuf {
        self.reputation_dir().join("coins_cross_channel.json")
    }

    pub fn historical_cache_path(&self) -> PathBuf {
        self.data_dir.join("cache/historical_prices.json")
    }

    pub fn blacklist_path(&self) -> PathBuf {
        self.data_dir.join("dead_tokens_blacklist.json")
    }

    /// Tracing filter directive for the configured level.
    pub fn tracing_directive(&self) -> &'static str {
        match self.log_level.as_str() {
            "DEBUG" => "debug",
            "WARNING" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(api_id: i32, hash_len: usize, phone: &str) -> ChatConfig {
        ChatConfig {
            api_id,
            api_hash: "a".repeat(hash_len),
            phone: phone.to_string(),
        }
    }

    #[test]
    fn chat_config_validation() {
        assert!(chat(12345, 32, "+15551234567").validate().is_ok());
        assert!(chat(0, 32, "+15551234567").validate().is_err());
        assert!(chat(12345, 31, "+15551234567").validate().is_err());
        assert!(chat(12345, 32, "15551234567").validate().is_err());
        assert!(chat(12345, 32, "+1555abc").validate().is_err());
    }
}
