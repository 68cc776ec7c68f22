use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry};
use crate::error::{Error, Result};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Scheduler metrics
    pub static ref TICKS_TOTAL: Counter = Counter::new(
        "oi_ticks_total",
        "Total number of polling ticks"
    ).unwrap();

    pub static ref SNAPSHOTS_COMMITTED: Counter = Counter::new(
        "oi_snapshots_committed_total",
        "Total number of snapshots aggregated and committed"
    ).unwrap();

    pub static ref TICKS_DEGRADED: CounterVec = CounterVec::new(
        Opts::new("oi_ticks_degraded_total", "Ticks that fell back to the last known value"),
        &["kind"]
    ).unwrap();

    // History metrics
    pub static ref HISTORY_RECORDS_RELOADED: Counter = Counter::new(
        "oi_history_records_reloaded_total",
        "Records replayed from the durable log at startup"
    ).unwrap();

    // Latency metrics
    pub static ref FETCH_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "oi_fetch_latency_seconds",
            "Option chain fetch latency"
        ).buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0])
    ).unwrap();
}

pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TICKS_TOTAL.clone()),
        Box::new(SNAPSHOTS_COMMITTED.clone()),
        Box::new(TICKS_DEGRADED.clone()),
        Box::new(HISTORY_RECORDS_RELOADED.clone()),
        Box::new(FETCH_LATENCY.clone()),
    ];

    for collector in collectors {
        REGISTRY
            .register(collector)
            .map_err(|e| Error::ConfigError(format!("metrics registration failed: {}", e)))?;
    }
    Ok(())
}
