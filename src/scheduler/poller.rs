use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::Instrument as _;
use crate::chain::aggregator::ChainAggregator;
use crate::chain::source::SnapshotSource;
use crate::error::{Error, Result};
use crate::history::log::MetricsLog;
use crate::history::store::HistoryStore;
use crate::observability::metrics::{FETCH_LATENCY, SNAPSHOTS_COMMITTED, TICKS_DEGRADED, TICKS_TOTAL};
use crate::observability::tracing::trace_tick;
use crate::scheduler::shutdown::ShutdownSignal;
use crate::scheduler::state::{DegradedReason, MetricsView, SchedulerState, TickReport};
use crate::types::metrics::DerivedMetrics;
use crate::types::series_key::SeriesKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollingSettings {
    /// Pause between the end of one tick and the start of the next; also the retry interval.
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PollingSettings {
    fn default() -> Self {
        PollingSettings {
            interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

/// Polling Scheduler - drives source -> aggregator -> store for one series key
///
/// ## States
/// `Idle -> Fetching -> Committing -> Idle` on success,
/// `Idle -> Fetching -> Degraded -> Idle` when the fetch fails or times out,
/// the document is invalid, or the record cannot be persisted.
///
/// ## Failure policy
/// - One attempt per tick, no backoff; the fixed interval caps the upstream request rate
/// - A degraded tick appends nothing and surfaces the last committed record, or
///   `NoDataYet` when the key has no history
/// - Nothing is fatal; the loop runs until the shutdown signal fires
///
/// ## Cancellation
/// Shutdown is observed only between ticks, so an in-flight fetch and its
/// commit always finish first.
pub struct PollingScheduler<S: SnapshotSource, L: MetricsLog> {
    source: S,
    aggregator: ChainAggregator,
    store: Arc<HistoryStore<L>>,
    key: SeriesKey,
    settings: PollingSettings,
    state: SchedulerState,
    ticks: u64,
    reports: watch::Sender<TickReport>,
}

impl<S: SnapshotSource, L: MetricsLog> PollingScheduler<S, L> {
    pub fn new(
        source: S,
        aggregator: ChainAggregator,
        store: Arc<HistoryStore<L>>,
        key: SeriesKey,
        settings: PollingSettings,
    ) -> Self {
        let initial = TickReport {
            key,
            tick: 0,
            outcome: SchedulerState::Idle,
            view: MetricsView::Starting {
                last_known: store.latest(&key),
            },
        };
        let (reports, _rx) = watch::channel(initial);

        PollingScheduler {
            source,
            aggregator,
            store,
            key,
            settings,
            state: SchedulerState::Idle,
            ticks: 0,
            reports,
        }
    }

    pub fn key(&self) -> SeriesKey {
        self.key
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn settings(&self) -> PollingSettings {
        self.settings
    }

    /// Receiver of the report published after every tick.
    pub fn subscribe(&self) -> watch::Receiver<TickReport> {
        self.reports.subscribe()
    }

    /// Poll until `shutdown` fires. The first tick runs immediately.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            "Polling {} every {:?} (fetch timeout {:?})",
            self.key,
            self.settings.interval,
            self.settings.fetch_timeout
        );

        while !shutdown.is_cancelled() {
            self.tick().await;

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep(self.settings.interval) => {}
            }
        }

        tracing::info!("Polling for {} stopped after {} ticks", self.key, self.ticks);
    }

    /// One full iteration, ending back in `Idle`.
    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        TICKS_TOTAL.inc();

        let span = trace_tick(&self.key, self.ticks);
        let report = self.tick_inner().instrument(span).await;

        self.transition(SchedulerState::Idle);
        self.reports.send_replace(report.clone());
        report
    }

    async fn tick_inner(&mut self) -> TickReport {
        self.transition(SchedulerState::Fetching);

        let metrics = match self.fetch_and_aggregate().await {
            Ok(metrics) => metrics,
            Err(e) => return self.degrade(e),
        };

        self.transition(SchedulerState::Committing);
        if let Err(e) = self.store.append(self.key, metrics.clone()).await {
            tracing::error!("Failed to persist {} record: {}", self.key, e);
            return self.degrade(e);
        }

        SNAPSHOTS_COMMITTED.inc();
        tracing::info!(
            "Committed {} @ {}: price={} ce_chg={} pe_chg={} pcr={}",
            self.key,
            metrics.timestamp,
            metrics.price,
            metrics.ce_change,
            metrics.pe_change,
            metrics.put_call_ratio
        );

        self.report(SchedulerState::Committing, MetricsView::Live(metrics))
    }

    async fn fetch_and_aggregate(&self) -> Result<DerivedMetrics> {
        let started = Instant::now();
        let fetched = timeout(self.settings.fetch_timeout, self.source.fetch(self.key.instrument)).await;
        FETCH_LATENCY.observe(started.elapsed().as_secs_f64());

        let raw = fetched.map_err(|_| Error::FetchTimeout(self.settings.fetch_timeout))??;
        self.aggregator.aggregate(&raw, self.key)
    }

    fn degrade(&mut self, cause: Error) -> TickReport {
        self.transition(SchedulerState::Degraded);
        TICKS_DEGRADED.with_label_values(&[cause.kind().as_str()]).inc();

        let reason = DegradedReason::from(&cause);
        let view = match self.store.latest(&self.key) {
            Some(last_known) => {
                tracing::warn!(
                    "{} degraded ({}), serving last known from {}",
                    self.key,
                    cause,
                    last_known.timestamp
                );
                MetricsView::Stale { last_known, reason }
            }
            None => {
                tracing::warn!("{} degraded ({}), no data yet", self.key, cause);
                MetricsView::NoDataYet { reason }
            }
        };

        self.report(SchedulerState::Degraded, view)
    }

    fn report(&self, outcome: SchedulerState, view: MetricsView) -> TickReport {
        TickReport {
            key: self.key,
            tick: self.ticks,
            outcome,
            view,
        }
    }

    fn transition(&mut self, next: SchedulerState) {
        tracing::trace!("{}: {} -> {}", self.key, self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use async_trait::async_trait;
    use crate::chain::{OptionLeg, RawSnapshot, StrikeRow};
    use crate::chain::source::MockSnapshotSource;
    use crate::error::FailureKind;
    use crate::history::log::MemoryLog;
    use crate::scheduler::shutdown::Shutdown;
    use crate::types::expiry::ExpirySelector;
    use crate::types::instrument::{ContractSpec, Instrument};

    const EXPIRY: &str = "23-Oct-2026";

    fn nifty_week() -> SeriesKey {
        SeriesKey::new(Instrument::Nifty, ExpirySelector::CurrentWeek)
    }

    /// Lot of 1000 so 100 contracts read as 1.0 lakh.
    fn aggregator() -> ChainAggregator {
        let mut specs = HashMap::new();
        specs.insert(Instrument::Nifty, ContractSpec::new(1000, 50.0, 800.0));
        ChainAggregator::with_specs(specs)
    }

    fn chain(minute: u32, ce_change_contracts: f64) -> RawSnapshot {
        RawSnapshot {
            timestamp: Some(format!("16-Oct-2026 10:{:02}:00", minute)),
            underlying_value: Some(22_153.0),
            data: Some(vec![StrikeRow {
                strike_price: 22_150.0,
                expiry_date: EXPIRY.to_string(),
                ce: Some(OptionLeg {
                    open_interest: 1000.0,
                    change_in_open_interest: ce_change_contracts,
                    last_price: 120.0,
                }),
                pe: Some(OptionLeg {
                    open_interest: 800.0,
                    change_in_open_interest: 0.0,
                    last_price: 95.0,
                }),
            }]),
            expiry_dates: vec![EXPIRY.to_string()],
        }
    }

    fn settings() -> PollingSettings {
        PollingSettings {
            interval: Duration::from_secs(7),
            fetch_timeout: Duration::from_secs(15),
        }
    }

    fn scheduler<S: SnapshotSource>(
        source: S,
        store: Arc<HistoryStore<MemoryLog>>,
    ) -> PollingScheduler<S, MemoryLog> {
        PollingScheduler::new(source, aggregator(), store, nifty_week(), settings())
    }

    fn store() -> Arc<HistoryStore<MemoryLog>> {
        Arc::new(HistoryStore::new(MemoryLog::new(), 100))
    }

    /// Never answers.
    struct StalledSource;

    #[async_trait]
    impl SnapshotSource for StalledSource {
        async fn fetch(&self, _instrument: Instrument) -> Result<RawSnapshot> {
            std::future::pending().await
        }
    }

    /// Replays scripted responses, stamping each fetch with the (paused) clock.
    /// Optionally requests shutdown from inside the fetch that exhausts the script.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<RawSnapshot>>>,
        fetched_at: Arc<Mutex<Vec<Instant>>>,
        shutdown_when_exhausted: Option<Arc<Shutdown>>,
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch(&self, _instrument: Instrument) -> Result<RawSnapshot> {
            self.fetched_at.lock().unwrap().push(Instant::now());
            let (next, exhausted) = {
                let mut responses = self.responses.lock().unwrap();
                let next = responses
                    .pop_front()
                    .unwrap_or_else(|| Err(Error::TransportFailure("script exhausted".to_string())));
                (next, responses.is_empty())
            };
            if exhausted {
                if let Some(shutdown) = &self.shutdown_when_exhausted {
                    shutdown.trigger("script exhausted");
                }
            }
            next
        }
    }

    #[tokio::test]
    async fn successful_tick_commits_and_returns_to_idle() {
        let mut source = MockSnapshotSource::new();
        source
            .expect_fetch()
            .withf(|instrument| *instrument == Instrument::Nifty)
            .times(1)
            .returning(|_| Ok(chain(0, 120.0)));

        let store = store();
        let mut scheduler = scheduler(source, store.clone());
        let mut reports = scheduler.subscribe();

        let report = scheduler.tick().await;

        assert_eq!(report.outcome, SchedulerState::Committing);
        assert_eq!(report.tick, 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        let MetricsView::Live(metrics) = &report.view else {
            panic!("expected live view, got {:?}", report.view);
        };
        assert_eq!(metrics.ce_change, 1.2);
        assert_eq!(metrics.atm_straddle_premium, Some(215.0));
        assert_eq!(store.latest(&nifty_week()).as_ref(), Some(metrics));
        assert_eq!(store.log().len().await, 1);

        assert!(reports.has_changed().unwrap());
        assert_eq!(*reports.borrow_and_update(), report);
    }

    #[tokio::test]
    async fn transport_failure_without_history_is_no_data_yet() {
        let mut source = MockSnapshotSource::new();
        source
            .expect_fetch()
            .returning(|_| Err(Error::TransportFailure("connection refused".to_string())));

        let store = store();
        let mut scheduler = scheduler(source, store.clone());
        let report = scheduler.tick().await;

        assert_eq!(report.outcome, SchedulerState::Degraded);
        assert!(report.view.is_degraded());
        assert!(report.view.metrics().is_none());
        match &report.view {
            MetricsView::NoDataYet { reason } => assert_eq!(reason.kind, FailureKind::Transport),
            other => panic!("expected NoDataYet, got {:?}", other),
        }
        assert_eq!(store.log().len().await, 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_timeout_serves_last_known_without_writing() {
        let store = store();
        let existing = aggregator().aggregate(&chain(0, 120.0), nifty_week()).unwrap();
        store.append(nifty_week(), existing.clone()).await.unwrap();

        let mut scheduler = scheduler(StalledSource, store.clone());
        let started = Instant::now();
        let report = scheduler.tick().await;

        assert!(started.elapsed() >= settings().fetch_timeout);
        assert_eq!(report.outcome, SchedulerState::Degraded);
        match &report.view {
            MetricsView::Stale { last_known, reason } => {
                assert_eq!(last_known, &existing);
                assert_eq!(reason.kind, FailureKind::Transport);
                assert!(reason.message.contains("timed out"));
            }
            other => panic!("expected Stale, got {:?}", other),
        }
        assert_eq!(store.latest(&nifty_week()), Some(existing));
        assert_eq!(store.log().len().await, 1);
    }

    #[tokio::test]
    async fn invalid_snapshot_is_never_recorded() {
        let mut source = MockSnapshotSource::new();
        source.expect_fetch().returning(|_| {
            let mut raw = chain(0, 0.0);
            raw.underlying_value = None;
            Ok(raw)
        });

        let store = store();
        let mut scheduler = scheduler(source, store.clone());
        let report = scheduler.tick().await;

        assert_eq!(report.view.reason().map(|r| r.kind), Some(FailureKind::InvalidSnapshot));
        assert!(store.latest(&nifty_week()).is_none());
        assert_eq!(store.log().len().await, 0);
    }

    #[tokio::test]
    async fn parse_failure_after_success_keeps_serving_previous() {
        let mut source = MockSnapshotSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(chain(0, 120.0)));
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(Error::ParseFailure("expected value at line 1".to_string())));

        let mut scheduler = scheduler(source, store());
        let first = scheduler.tick().await;
        let second = scheduler.tick().await;

        assert_eq!(second.tick, 2);
        assert_eq!(second.view.metrics(), first.view.metrics());
        assert_eq!(second.view.reason().map(|r| r.kind), Some(FailureKind::Parse));
    }

    #[tokio::test]
    async fn persistence_failure_degrades() {
        struct ReadOnlyLog;

        #[async_trait]
        impl MetricsLog for ReadOnlyLog {
            async fn append(&self, _record: &crate::history::log::LogRecord) -> Result<()> {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
            }

            async fn replay(&self) -> Result<crate::history::log::Replay> {
                Ok(Default::default())
            }
        }

        let mut source = MockSnapshotSource::new();
        source.expect_fetch().returning(|_| Ok(chain(0, 120.0)));

        let store = Arc::new(HistoryStore::new(ReadOnlyLog, 10));
        let mut scheduler =
            PollingScheduler::new(source, aggregator(), store.clone(), nifty_week(), settings());
        let report = scheduler.tick().await;

        assert_eq!(report.outcome, SchedulerState::Degraded);
        assert_eq!(report.view.reason().map(|r| r.kind), Some(FailureKind::Persistence));
        assert!(store.latest(&nifty_week()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_and_stops_between_ticks() {
        let shutdown = Arc::new(Shutdown::new());
        let fetched_at = Arc::new(Mutex::new(Vec::new()));
        let source = ScriptedSource {
            responses: Mutex::new(VecDeque::from(vec![
                Ok(chain(0, 120.0)),
                Err(Error::TransportFailure("reset by peer".to_string())),
                Ok(chain(2, -50.0)),
            ])),
            fetched_at: fetched_at.clone(),
            shutdown_when_exhausted: Some(shutdown.clone()),
        };

        let store = store();
        let scheduler = scheduler(source, store.clone());
        let reports = scheduler.subscribe();

        scheduler.run(shutdown.signal()).await;

        // the third fetch requested shutdown, yet its record was still committed
        let history = store.tail(&nifty_week(), 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].net_change, 1.2);
        assert_eq!(history[1].net_change, -0.5);
        assert_eq!(reports.borrow().tick, 3);

        let fetched_at = fetched_at.lock().unwrap();
        assert_eq!(fetched_at.len(), 3);
        for pair in fetched_at.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= settings().interval, "ticks {:?} apart", gap);
            assert!(gap < settings().interval + Duration::from_millis(10), "ticks {:?} apart", gap);
        }
    }

    #[tokio::test]
    async fn already_cancelled_run_does_nothing() {
        let mut source = MockSnapshotSource::new();
        source.expect_fetch().times(0);

        let shutdown = Shutdown::new();
        shutdown.trigger("before start");
        scheduler(source, store()).run(shutdown.signal()).await;
    }

    #[tokio::test]
    async fn initial_report_carries_reloaded_history() {
        let store = store();
        let existing = aggregator().aggregate(&chain(5, 10.0), nifty_week()).unwrap();
        store.append(nifty_week(), existing.clone()).await.unwrap();

        let scheduler = scheduler(MockSnapshotSource::new(), store);
        let report = scheduler.subscribe().borrow().clone();

        assert_eq!(report.tick, 0);
        assert_eq!(report.key, scheduler.key());
        assert_eq!(scheduler.settings(), settings());
        assert_eq!(report.view, MetricsView::Starting { last_known: Some(existing) });
        assert!(!report.view.is_degraded());
    }
}
