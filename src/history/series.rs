use chrono::NaiveDateTime;
use serde::Serialize;
use crate::types::metrics::DerivedMetrics;

/// Column-oriented view of a history tail, shaped for chart consumers
/// (one vector per plotted line, all sharing `timestamps`).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub price: Vec<f64>,
    pub ce_open_interest: Vec<f64>,
    pub pe_open_interest: Vec<f64>,
    pub ce_change: Vec<f64>,
    pub pe_change: Vec<f64>,
    pub net_change: Vec<f64>,
    pub put_call_ratio: Vec<f64>,
}

impl MetricSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl<'a> FromIterator<&'a DerivedMetrics> for MetricSeries {
    fn from_iter<I: IntoIterator<Item = &'a DerivedMetrics>>(iter: I) -> Self {
        let mut series = MetricSeries::default();
        for m in iter {
            series.timestamps.push(m.timestamp);
            series.price.push(m.price);
            series.ce_open_interest.push(m.ce_open_interest);
            series.pe_open_interest.push(m.pe_open_interest);
            series.ce_change.push(m.ce_change);
            series.pe_change.push(m.pe_change);
            series.net_change.push(m.net_change);
            series.put_call_ratio.push(m.put_call_ratio);
        }
        series
    }
}
