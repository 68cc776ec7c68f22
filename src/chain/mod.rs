pub mod aggregator;
pub mod source;

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// One option-chain document as served upstream (the `records` section).
///
/// Required fields are optional here so that a structurally valid but
/// incomplete document reaches the aggregator and is rejected as an
/// invalid snapshot rather than a parse failure.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSnapshot {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub underlying_value: Option<f64>,
    #[serde(default)]
    pub data: Option<Vec<StrikeRow>>,
    #[serde(default)]
    pub expiry_dates: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrikeRow {
    pub strike_price: f64,
    pub expiry_date: String,
    #[serde(default, rename = "CE", skip_serializing_if = "Option::is_none")]
    pub ce: Option<OptionLeg>,
    #[serde(default, rename = "PE", skip_serializing_if = "Option::is_none")]
    pub pe: Option<OptionLeg>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionLeg {
    #[serde(default)]
    pub open_interest: f64,
    #[serde(default, rename = "changeinOpenInterest")]
    pub change_in_open_interest: f64,
    #[serde(default)]
    pub last_price: f64,
}

impl RawSnapshot {
    /// Parse either the full exchange envelope (`{"records": {...}}`) or a bare records object.
    pub fn from_json(body: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| Error::ParseFailure(e.to_string()))?;

        let records = match value.get_mut("records").map(serde_json::Value::take) {
            Some(records) => records,
            None => value,
        };

        if !records.is_object() {
            return Err(Error::ParseFailure("chain document is not an object".to_string()));
        }

        serde_json::from_value(records).map_err(|e| Error::ParseFailure(e.to_string()))
    }
}
