pub mod instrument;
pub mod expiry;
pub mod series_key;
pub mod metrics;

pub use expiry::ExpirySelector;
pub use instrument::{ContractSpec, Instrument};
pub use metrics::DerivedMetrics;
pub use series_key::SeriesKey;
