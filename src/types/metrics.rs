use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Aggregates derived from one accepted chain snapshot.
///
/// OI quantities are in lakh units (contracts x lot size / 100 000).
/// `timestamp` is the exchange's wall-clock time as reported in the snapshot.
/// Records are immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub ce_open_interest: f64,
    pub pe_open_interest: f64,
    pub ce_change: f64,
    pub pe_change: f64,
    pub net_change: f64,
    pub put_call_ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atm_straddle_premium: Option<f64>,
}
