use std::sync::Arc;
use anyhow::Context;
use OiPulse::CONFIG_ENV_VAR;
use OiPulse::chain::aggregator::ChainAggregator;
use OiPulse::chain::source::FileSnapshotSource;
use OiPulse::config::loader::AppConfig;
use OiPulse::error::Error;
use OiPulse::history::{HistoryStore, JsonLinesLog};
use OiPulse::observability::metrics::register_metrics;
use OiPulse::observability::tracing::init_tracing;
use OiPulse::scheduler::{PollingScheduler, Shutdown};
use OiPulse::types::SeriesKey;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| "default".to_string());
    let config = AppConfig::load(&env).context("loading configuration")?;

    init_tracing(config.logging.format)?;
    register_metrics()?;

    let key = SeriesKey::new(config.selection.instrument, config.selection.expiry);
    tracing::info!("Starting OI pulse for {} (env {})", key, env);

    let log = JsonLinesLog::open(&config.history.log_path)
        .await
        .with_context(|| format!("opening {}", config.history.log_path.display()))?;
    let store = Arc::new(HistoryStore::new(log, config.history.capacity));
    store.load_from_durable_log().await?;

    let source = FileSnapshotSource::new(&config.source.snapshot_dir);
    let aggregator = ChainAggregator::with_specs(config.contract_specs());
    let scheduler = PollingScheduler::new(
        source,
        aggregator,
        Arc::clone(&store),
        key,
        config.polling.settings(),
    );

    let shutdown = Arc::new(Shutdown::new());
    let signal = shutdown.signal();
    let trigger = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => trigger.trigger("ctrl-c"),
            Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    scheduler.run(signal).await;

    match store.require_latest(&key) {
        Ok(latest) => tracing::info!(
            "Last record for {}: price {} CE OI {} PE OI {} PCR {}",
            key,
            latest.price,
            latest.ce_open_interest,
            latest.pe_open_interest,
            latest.put_call_ratio
        ),
        Err(Error::EmptyHistory(_)) => tracing::info!("No data yet for {}", key),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
