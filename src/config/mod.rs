use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::history::store::DEFAULT_HISTORY_CAPACITY;
use crate::observability::tracing::LogFormat;
use crate::scheduler::poller::PollingSettings;
use crate::types::expiry::ExpirySelector;
use crate::types::instrument::{ContractSpec, Instrument};

pub mod loader;

pub const REFRESH_SECONDS_RANGE: RangeInclusive<u64> = 5..=60;
pub const FETCH_TIMEOUT_SECONDS_RANGE: RangeInclusive<u64> = 1..=30;
pub const HISTORY_CAPACITY_RANGE: RangeInclusive<usize> = 1..=10_000;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub instrument: Instrument,
    pub expiry: ExpirySelector,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            instrument: Instrument::Nifty,
            expiry: ExpirySelector::CurrentWeek,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub refresh_seconds: u64,
    pub fetch_timeout_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            refresh_seconds: 10,
            fetch_timeout_seconds: 15,
        }
    }
}

impl PollingConfig {
    pub fn settings(&self) -> PollingSettings {
        PollingSettings {
            interval: Duration::from_secs(self.refresh_seconds),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_seconds),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub log_path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            capacity: DEFAULT_HISTORY_CAPACITY,
            log_path: PathBuf::from("data/oi_history.jsonl"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub snapshot_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            snapshot_dir: PathBuf::from("data/snapshots"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Per-instrument overrides; unset fields keep the instrument's defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractOverride {
    pub lot_size: Option<u32>,
    pub strike_step: Option<f64>,
    pub band_width: Option<f64>,
}

impl ContractOverride {
    pub fn apply(&self, base: ContractSpec) -> ContractSpec {
        ContractSpec {
            lot_size: self.lot_size.unwrap_or(base.lot_size),
            strike_step: self.strike_step.unwrap_or(base.strike_step),
            band_width: self.band_width.unwrap_or(base.band_width),
        }
    }
}
