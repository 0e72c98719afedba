pub mod config;
pub mod handler;
pub mod report;
pub mod scheduler;
pub mod source;

use std::sync::{Arc, Mutex};

use config::AppConfig;
use data_sinks::DataSinks;
use handler::MessageHandler;
use historical_prices::{HistoricalPriceService, HistoricalServiceConfig};
use message_queue::{PriorityMessageQueue, QueueConfig};
use outcome_tracker::OutcomeTracker;
use price_engine::providers::{
    DexAggregatorClient, EvmRpcClient, ExplorerClient, GoPlusClient, MetaAggregatorClient,
    MetadataClient,
};
use price_engine::{DeadTokenDetector, PairResolver, PriceEngine};
use report::VerificationReport;
use reputation_engine::{CrossChannelRepo, ReputationEngine};
use scheduler::ReputationScheduler;
use signal_core::{ChatSource, SignalError};
use signal_scoring::{ConfidenceCalculator, HdrbScorer, PatternSentimentAnalyzer};
use token_filter::{FilterConfig, TokenFilter};
use tokio::sync::watch;

/// The wired pipeline: queue in front, handler in the middle, scheduler in
/// the background, shared state engines underneath.
pub struct Pipeline {
    pub queue: Arc<PriorityMessageQueue>,
    pub handler: Arc<MessageHandler>,
    pub scheduler: Arc<ReputationScheduler>,
    pub tracker: Arc<OutcomeTracker>,
    pub reputation: Arc<ReputationEngine>,
    pub report: Arc<VerificationReport>,
}

impl Pipeline {
    pub fn build(config: &AppConfig) -> Result<Self, SignalError> {
        let detector = crypto_detectors::MentionDetector::from_files(
            &config.tickers_path,
            &config.keywords_path,
        );
        if !detector.is_functional() {
            return Err(SignalError::Config(
                "No tickers and no keywords configured; detection would be non-functional"
                    .to_string(),
            ));
        }

        // Shared provider clients: the engine, the resolver and the
        // dead-token detector ride the same rate limiters.
        let dex = DexAggregatorClient::new();
        let rpc = match &config.rpc_url {
            Some(url) => EvmRpcClient::with_rpc_url(url.clone()),
            None => EvmRpcClient::new(),
        };
        let explorer = config
            .explorer_api_key
            .as_ref()
            .map(|key| ExplorerClient::new(key.clone()));
        let metadata = config
            .metadata_api_key
            .as_ref()
            .map(|key| MetadataClient::new(key.clone()));

        let price_engine = PriceEngine::with_clients(
            dex.clone(),
            metadata,
            MetaAggregatorClient::new(),
            explorer.clone(),
            GoPlusClient::new(),
            rpc.clone(),
        );
        let resolver = PairResolver::new(dex, rpc);
        let dead_tokens = Arc::new(DeadTokenDetector::new(explorer, config.blacklist_path()));

        let historical = Arc::new(HistoricalPriceService::new(HistoricalServiceConfig {
            daily_candle_api_key: config.daily_candle_api_key.clone(),
            cache_path: config.historical_cache_path(),
            symbol_mapping_path: config.symbol_mapping_path.clone(),
            historical_price_timeout: config.historical_price_timeout,
            ohlc_fetch_timeout: config.ohlc_fetch_timeout,
        }));

        let tracker = Arc::new(OutcomeTracker::new(
            config.active_tracking_path(),
            config.completed_history_path(),
        ));
        let reputation = Arc::new(ReputationEngine::new(config.channels_path()));
        let cross_channel = Arc::new(CrossChannelRepo::new(config.cross_channel_path()));
        let sinks = Arc::new(DataSinks::new(config.csv_output_dir.clone()));
        let report = Arc::new(VerificationReport::new());

        let handler = Arc::new(MessageHandler {
            detector,
            filter: Mutex::new(TokenFilter::new(FilterConfig {
                min_market_cap: config.min_market_cap,
                min_price: config.min_price,
                allow_missing_market_cap: config.allow_missing_market_cap,
            })),
            resolver,
            price_engine,
            historical: Arc::clone(&historical),
            hdrb: HdrbScorer::new(config.max_ic),
            sentiment: Arc::new(PatternSentimentAnalyzer::new(config.use_crypto_vocabulary)),
            confidence: ConfidenceCalculator::new(config.confidence_threshold),
            tracker: Arc::clone(&tracker),
            dead_tokens,
            reputation: Arc::clone(&reputation),
            sinks: Arc::clone(&sinks),
            report: Arc::clone(&report),
        });

        let queue = PriorityMessageQueue::new(
            QueueConfig {
                max_queue_size: config.max_queue_size,
                messages_per_second: config.messages_per_second,
                drain_timeout: std::time::Duration::from_secs(30),
            },
            reputation.clone(),
        );

        let scheduler = Arc::new(ReputationScheduler {
            tracker: Arc::clone(&tracker),
            reputation: Arc::clone(&reputation),
            cross_channel,
            historical,
            sinks,
            interval: config.reputation_update_interval,
        });

        Ok(Self {
            queue,
            handler,
            scheduler,
            tracker,
            reputation,
            report,
        })
    }

    /// Consume a chat source to completion: enqueue everything, drain the
    /// queue, run a final maintenance cycle, print the report.
    pub async fn run(&self, mut source: impl ChatSource) -> Result<(), SignalError> {
        let handler = Arc::clone(&self.handler);
        let consumer = self
            .queue
            .start_consumer(move |event| {
                let handler = Arc::clone(&handler);
                async move { handler.handle(event).await }
            });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler_task = tokio::spawn(Arc::clone(&self.scheduler).run(shutdown_rx));

        while let Some(event) = source.next_message().await {
            self.queue.enqueue(event);
        }

        self.queue.stop(consumer).await;
        let _ = shutdown_tx.send(true);
        let _ = scheduler_task.await;

        // Final maintenance pass so freshly completed signals reach the sinks.
        if let Err(e) = self.scheduler.cycle().await {
            tracing::error!("Final scheduler cycle failed: {}", e);
        }

        self.report.log_summary();
        println!("{}", self.report.summary());
        Ok(())
    }
}
