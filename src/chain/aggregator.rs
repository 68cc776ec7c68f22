use std::collections::HashMap;
use crate::chain::{OptionLeg, RawSnapshot, StrikeRow};
use crate::error::{Error, Result};
use crate::types::instrument::{ContractSpec, Instrument};
use crate::types::metrics::DerivedMetrics;
use crate::types::series_key::SeriesKey;
use crate::utils::helper::{parse_server_timestamp, round_to};

/// OI is reported in lakhs (hundred-thousands of units).
const LAKH: f64 = 100_000.0;
/// Strikes are listed on whole-number grids; anything closer than this is the same strike.
const STRIKE_EPSILON: f64 = 1e-6;

/// Nearest listed strike to `price`, halves rounded away from zero.
pub fn atm_strike(price: f64, strike_step: f64) -> f64 {
    (price / strike_step).round() * strike_step
}

/// Inclusive on both ends.
pub fn in_band(strike: f64, atm: f64, band_width: f64) -> bool {
    strike >= atm - band_width - STRIKE_EPSILON && strike <= atm + band_width + STRIKE_EPSILON
}

#[derive(Clone, Copy, Debug, Default)]
struct SideTotals {
    open_interest: f64,
    change: f64,
}

impl SideTotals {
    fn add(&mut self, leg: Option<&OptionLeg>) {
        if let Some(leg) = leg {
            self.open_interest += leg.open_interest;
            self.change += leg.change_in_open_interest;
        }
    }
}

/// Turns one raw chain document into a [`DerivedMetrics`] record for a selection.
///
/// Only rows of the selected expiry whose strike lies within
/// `[atm - band_width, atm + band_width]` contribute; everything else in the
/// chain is ignored. The aggregator is stateless across snapshots: change
/// figures come straight from the upstream change-in-OI field.
pub struct ChainAggregator {
    specs: HashMap<Instrument, ContractSpec>,
}

impl ChainAggregator {
    pub fn new() -> Self {
        ChainAggregator {
            specs: Instrument::ALL
                .into_iter()
                .map(|instrument| (instrument, instrument.default_spec()))
                .collect(),
        }
    }

    pub fn with_specs(specs: HashMap<Instrument, ContractSpec>) -> Self {
        let mut aggregator = ChainAggregator::new();
        aggregator.specs.extend(specs);
        aggregator
    }

    pub fn spec_for(&self, instrument: Instrument) -> ContractSpec {
        self.specs
            .get(&instrument)
            .copied()
            .unwrap_or_else(|| instrument.default_spec())
    }

    pub fn aggregate(&self, raw: &RawSnapshot, key: SeriesKey) -> Result<DerivedMetrics> {
        let spec = self.spec_for(key.instrument);

        // Step 1: Validate required fields
        let price = raw
            .underlying_value
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| Error::InvalidSnapshot("missing or non-positive underlying price".to_string()))?;

        let raw_timestamp = raw
            .timestamp
            .as_deref()
            .ok_or_else(|| Error::InvalidSnapshot("missing server timestamp".to_string()))?;
        let timestamp = parse_server_timestamp(raw_timestamp)
            .ok_or_else(|| Error::InvalidSnapshot(format!("unparseable server timestamp: {raw_timestamp}")))?;

        let rows = raw
            .data
            .as_deref()
            .ok_or_else(|| Error::InvalidSnapshot("missing strike rows".to_string()))?;

        // Step 2: Resolve ATM strike and target expiry
        let atm = atm_strike(price, spec.strike_step);
        let target_expiry = key
            .expiry
            .resolve(&raw.expiry_dates)
            .ok_or_else(|| Error::InvalidSnapshot("no expiry dates listed".to_string()))?;

        // Step 3: Restrict to the selected expiry and the band around ATM
        let band: Vec<&StrikeRow> = rows
            .iter()
            .filter(|row| row.expiry_date == target_expiry)
            .filter(|row| in_band(row.strike_price, atm, spec.band_width))
            .collect();

        tracing::debug!(
            "{}: atm={} expiry={} rows_in_band={}/{}",
            key,
            atm,
            target_expiry,
            band.len(),
            rows.len()
        );

        // Step 4: Sum each side
        let mut calls = SideTotals::default();
        let mut puts = SideTotals::default();
        for row in &band {
            calls.add(row.ce.as_ref());
            puts.add(row.pe.as_ref());
        }

        // Step 5: Scale into lakh units
        let scale = |contracts: f64| round_to(contracts * spec.lot_size as f64 / LAKH, 1);
        let ce_open_interest = scale(calls.open_interest);
        let pe_open_interest = scale(puts.open_interest);
        let ce_change = scale(calls.change);
        let pe_change = scale(puts.change);

        // Step 6: Derived ratios
        let put_call_ratio = if ce_open_interest > 0.0 {
            round_to(pe_open_interest / ce_open_interest, 2)
        } else {
            0.0
        };

        // Step 7: ATM straddle
        let atm_straddle_premium = band
            .iter()
            .find(|row| (row.strike_price - atm).abs() < STRIKE_EPSILON)
            .map(|row| {
                let ce = row.ce.map(|leg| leg.last_price).unwrap_or(0.0);
                let pe = row.pe.map(|leg| leg.last_price).unwrap_or(0.0);
                round_to(ce + pe, 2)
            });

        Ok(DerivedMetrics {
            timestamp,
            price: round_to(price, 2),
            ce_open_interest,
            pe_open_interest,
            ce_change,
            pe_change,
            net_change: round_to(ce_change - pe_change, 1),
            put_call_ratio,
            atm_straddle_premium,
        })
    }
}

impl Default for ChainAggregator {
    fn default() -> Self {
        Self::new()
    }
}
