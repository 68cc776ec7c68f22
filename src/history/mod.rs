pub mod buffer;
pub mod log;
pub mod series;
pub mod store;

pub use buffer::HistoryBuffer;
pub use log::{JsonLinesLog, LogRecord, MemoryLog, MetricsLog, Replay, LOG_RECORD_VERSION};
pub use series::MetricSeries;
pub use store::{HistoryStore, ReloadSummary, DEFAULT_HISTORY_CAPACITY};
