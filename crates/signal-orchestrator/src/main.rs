use std::sync::Arc;

use anyhow::{Context, Result};
use signal_orchestrator::config::AppConfig;
use signal_orchestrator::source::ReplaySource;
use signal_orchestrator::Pipeline;
use tokio::signal;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("configuration error")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.tracing_directive())),
        )
        .init();

    if let Some(chat) = &config.chat {
        tracing::info!(
            "Chat credentials validated for api_id {} (transport runs externally)",
            chat.api_id
        );
    }

    let pipeline = Pipeline::build(&config).context("pipeline startup failed")?;

    match &config.replay_path {
        Some(path) => {
            let source = ReplaySource::from_file(path)
                .with_context(|| format!("cannot open replay file {}", path.display()))?;
            pipeline.run(source).await?;
        }
        None => {
            // No replay file: run the background machinery (scheduler +
            // consumer) until interrupted, serving whatever an external
            // transport enqueues.
            let handler = Arc::clone(&pipeline.handler);
            let consumer = pipeline.queue.start_consumer(move |event| {
                let handler = Arc::clone(&handler);
                async move { handler.handle(event).await }
            });
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let scheduler = tokio::spawn(Arc::clone(&pipeline.scheduler).run(shutdown_rx));

            tracing::info!("Pipeline idle-running; press Ctrl-C to stop");
            signal::ctrl_c().await.context("signal handler")?;
            tracing::info!("Shutdown requested");

            pipeline.queue.stop(consumer).await;
            let _ = shutdown_tx.send(true);
            let _ = scheduler.await;
            pipeline.report.log_summary();
        }
    }

    Ok(())
}
