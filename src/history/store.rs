use dashmap::DashMap;
use crate::error::{Error, Result};
use crate::history::buffer::HistoryBuffer;
use crate::history::log::{LogRecord, MetricsLog};
use crate::history::series::MetricSeries;
use crate::observability::metrics::HISTORY_RECORDS_RELOADED;
use crate::types::metrics::DerivedMetrics;
use crate::types::series_key::SeriesKey;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Outcome of rebuilding the in-memory buffers from the durable log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub records: usize,
    pub skipped: usize,
    pub series: usize,
}

/// History Store - bounded per-key series backed by a durable log
///
/// ## Source of truth
/// The log holds every record ever committed; each key's buffer is a
/// bounded cache over it, rebuilt at any time by `load_from_durable_log`.
///
/// ## Write path
/// `append` persists first and only then touches memory, so a failed write
/// leaves the buffer exactly as it was.
///
/// ## Concurrency
/// - Buffers are sharded per key; readers copy out and never see a buffer mid-mutation
/// - Reads on one key do not wait on an append to another key
/// - One writer per key is assumed; distinct schedulers must poll distinct keys
pub struct HistoryStore<L: MetricsLog> {
    log: L,
    buffers: DashMap<SeriesKey, HistoryBuffer>,
    capacity: usize,
}

impl<L: MetricsLog> HistoryStore<L> {
    pub fn new(log: L, capacity: usize) -> Self {
        HistoryStore {
            log,
            buffers: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Persist `metrics` tagged with `key`, then append it to the key's buffer.
    pub async fn append(&self, key: SeriesKey, metrics: DerivedMetrics) -> Result<()> {
        let record = LogRecord::new(key, metrics);
        self.log.append(&record).await?;

        let mut buffer = self
            .buffers
            .entry(key)
            .or_insert_with(|| HistoryBuffer::new(self.capacity));
        let dropped = buffer.push(record.metrics);

        tracing::debug!("{}: appended, len={} dropped={}", key, buffer.len(), dropped);
        Ok(())
    }

    pub fn latest(&self, key: &SeriesKey) -> Option<DerivedMetrics> {
        self.buffers
            .get(key)
            .and_then(|buffer| buffer.latest().cloned())
    }

    /// Like [`latest`](Self::latest) but reports a key without data as `EmptyHistory`.
    pub fn require_latest(&self, key: &SeriesKey) -> Result<DerivedMetrics> {
        self.latest(key).ok_or(Error::EmptyHistory(*key))
    }

    /// The most recent `min(n, available)` records for `key`, oldest first.
    pub fn tail(&self, key: &SeriesKey, n: usize) -> Vec<DerivedMetrics> {
        self.buffers
            .get(key)
            .map(|buffer| buffer.tail(n))
            .unwrap_or_default()
    }

    pub fn series(&self, key: &SeriesKey, n: usize) -> MetricSeries {
        self.tail(key, n).iter().collect()
    }

    pub fn len(&self, key: &SeriesKey) -> usize {
        self.buffers.get(key).map(|buffer| buffer.len()).unwrap_or(0)
    }

    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.buffers.iter().map(|entry| *entry.key()).collect();
        keys.sort();
        keys
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Rebuild every buffer by replaying the whole log in write order.
    pub async fn load_from_durable_log(&self) -> Result<ReloadSummary> {
        let replay = self.log.replay().await?;

        self.buffers.clear();
        let records = replay.records.len();
        for record in replay.records {
            let key = record.key();
            self.buffers
                .entry(key)
                .or_insert_with(|| HistoryBuffer::new(self.capacity))
                .push(record.metrics);
        }

        let summary = ReloadSummary {
            records,
            skipped: replay.skipped,
            series: self.buffers.len(),
        };
        HISTORY_RECORDS_RELOADED.inc_by(records as f64);

        tracing::info!(
            "Reloaded {} records into {} series ({} skipped)",
            summary.records,
            summary.series,
            summary.skipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::history::buffer::tests::sample;
    use crate::history::log::{JsonLinesLog, MemoryLog, Replay};
    use crate::types::expiry::ExpirySelector;
    use crate::types::instrument::Instrument;

    fn nifty_week() -> SeriesKey {
        SeriesKey::new(Instrument::Nifty, ExpirySelector::CurrentWeek)
    }

    fn bank_month() -> SeriesKey {
        SeriesKey::new(Instrument::BankNifty, ExpirySelector::Monthly)
    }

    struct BrokenLog;

    #[async_trait]
    impl MetricsLog for BrokenLog {
        async fn append(&self, _record: &LogRecord) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "read-only filesystem").into())
        }

        async fn replay(&self) -> Result<Replay> {
            Ok(Replay::default())
        }
    }

    #[tokio::test]
    async fn empty_key_is_representable() {
        let store = HistoryStore::new(MemoryLog::new(), 5);
        assert!(store.latest(&nifty_week()).is_none());
        assert!(store.tail(&nifty_week(), 10).is_empty());
        assert!(store.series(&nifty_week(), 10).is_empty());
        assert!(matches!(
            store.require_latest(&nifty_week()),
            Err(Error::EmptyHistory(key)) if key == nifty_week()
        ));
    }

    #[tokio::test]
    async fn append_bounds_each_key_independently() {
        let store = HistoryStore::new(MemoryLog::new(), 3);
        for i in 0..5 {
            store.append(nifty_week(), sample(i)).await.unwrap();
        }
        store.append(bank_month(), sample(100)).await.unwrap();

        assert_eq!(store.len(&nifty_week()), 3);
        assert_eq!(store.len(&bank_month()), 1);
        assert_eq!(store.tail(&nifty_week(), 10), vec![sample(2), sample(3), sample(4)]);
        assert_eq!(store.latest(&nifty_week()), Some(sample(4)));
        assert_eq!(store.latest(&bank_month()), Some(sample(100)));
        assert_eq!(store.keys(), vec![nifty_week(), bank_month()]);

        // the log keeps everything
        assert_eq!(store.log().len().await, 6);
    }

    #[tokio::test]
    async fn series_projects_tail_columns() {
        let store = HistoryStore::new(MemoryLog::new(), 10);
        for i in 0..4 {
            store.append(nifty_week(), sample(i)).await.unwrap();
        }

        let series = store.series(&nifty_week(), 2);
        assert_eq!(series.len(), 2);
        assert_eq!(series.price, vec![22_002.0, 22_003.0]);
        assert_eq!(series.timestamps, vec![sample(2).timestamp, sample(3).timestamp]);
    }

    #[tokio::test]
    async fn failed_persistence_leaves_buffer_untouched() {
        let store = HistoryStore::new(BrokenLog, 3);
        let err = store.append(nifty_week(), sample(0)).await.unwrap_err();

        assert!(matches!(err, Error::IoError(_)));
        assert!(store.latest(&nifty_week()).is_none());
    }

    #[tokio::test]
    async fn reload_reproduces_buffers_after_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.jsonl");

        let (before_nifty, before_bank) = {
            let store = HistoryStore::new(JsonLinesLog::open(&path).await.unwrap(), 4);
            for i in 0..9 {
                let key = if i % 3 == 0 { bank_month() } else { nifty_week() };
                store.append(key, sample(i)).await.unwrap();
            }
            (store.tail(&nifty_week(), 100), store.tail(&bank_month(), 100))
        };

        let restarted = HistoryStore::new(JsonLinesLog::open(&path).await.unwrap(), 4);
        let summary = restarted.load_from_durable_log().await.unwrap();

        assert_eq!(summary, ReloadSummary { records: 9, skipped: 0, series: 2 });
        assert_eq!(restarted.tail(&nifty_week(), 100), before_nifty);
        assert_eq!(restarted.tail(&bank_month(), 100), before_bank);
        assert_eq!(before_nifty.len(), 4);
        assert_eq!(before_bank.len(), 3);
    }

    #[tokio::test]
    async fn reload_with_smaller_capacity_keeps_newest() {
        let log = MemoryLog::new();
        for i in 0..6 {
            log.append(&LogRecord::new(nifty_week(), sample(i))).await.unwrap();
        }

        let store = HistoryStore::new(log, 2);
        store.load_from_durable_log().await.unwrap();
        assert_eq!(store.tail(&nifty_week(), 10), vec![sample(4), sample(5)]);
    }

    #[tokio::test]
    async fn reads_do_not_expose_later_appends() {
        let store = HistoryStore::new(MemoryLog::new(), 10);
        store.append(nifty_week(), sample(0)).await.unwrap();

        let snapshot = store.tail(&nifty_week(), 10);
        store.append(nifty_week(), sample(1)).await.unwrap();

        assert_eq!(snapshot, vec![sample(0)]);
        assert_eq!(store.len(&nifty_week()), 2);
    }
}
