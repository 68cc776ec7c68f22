use serde::{Deserialize, Serialize};
use std::fmt;
use crate::types::expiry::ExpirySelector;
use crate::types::instrument::Instrument;

/// Partition key of the history: one time series per (instrument, expiry) selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub instrument: Instrument,
    pub expiry: ExpirySelector,
}

impl SeriesKey {
    pub fn new(instrument: Instrument, expiry: ExpirySelector) -> Self {
        SeriesKey { instrument, expiry }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.expiry)
    }
}
