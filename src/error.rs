use std::time::Duration;
use thiserror::Error;
use crate::types::series_key::SeriesKey;

#[derive(Error, Debug)]
pub enum Error {
    // Source Errors
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Fetch timed out after {0:?}")]
    FetchTimeout(Duration),

    #[error("Parse failure: {0}")]
    ParseFailure(String),

    // Aggregation Errors
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // History Errors
    #[error("No history for {0}")]
    EmptyHistory(SeriesKey),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Log record deserialization failed: {0}")]
    DeserializationError(String),

    #[error("Unsupported log record version: {record_version}, max supported: {max_supported}")]
    UnsupportedRecordVersion {
        record_version: u32,
        max_supported: u32,
    },

    // Selection Errors
    #[error("Unsupported instrument: {0}")]
    UnsupportedInstrument(String),

    #[error("Unsupported expiry selector: {0}")]
    UnsupportedExpirySelector(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by the scheduler's fallback policy and metrics labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Transport,
    Parse,
    InvalidSnapshot,
    Persistence,
    EmptyHistory,
    Config,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::Parse => "parse",
            FailureKind::InvalidSnapshot => "invalid_snapshot",
            FailureKind::Persistence => "persistence",
            FailureKind::EmptyHistory => "empty_history",
            FailureKind::Config => "config",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::TransportFailure(_) | Error::FetchTimeout(_) => FailureKind::Transport,
            Error::ParseFailure(_) => FailureKind::Parse,
            Error::InvalidSnapshot(_) => FailureKind::InvalidSnapshot,
            Error::EmptyHistory(_) => FailureKind::EmptyHistory,
            Error::SerializationError(_)
            | Error::DeserializationError(_)
            | Error::UnsupportedRecordVersion { .. }
            | Error::IoError(_) => FailureKind::Persistence,
            Error::UnsupportedInstrument(_)
            | Error::UnsupportedExpirySelector(_)
            | Error::ConfigError(_) => FailureKind::Config,
        }
    }
}
