use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::Error;

/// Index underlyings whose option chains can be tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Instrument {
    Nifty,
    BankNifty,
    FinNifty,
    MidcpNifty,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Instrument::Nifty,
        Instrument::BankNifty,
        Instrument::FinNifty,
        Instrument::MidcpNifty,
    ];

    /// Exchange symbol, as used in the upstream request and the persisted log.
    pub fn symbol(&self) -> &'static str {
        match self {
            Instrument::Nifty => "NIFTY",
            Instrument::BankNifty => "BANKNIFTY",
            Instrument::FinNifty => "FINNIFTY",
            Instrument::MidcpNifty => "MIDCPNIFTY",
        }
    }

    /// Contract constants used by the aggregator. The band is 16 strike steps
    /// either side of the ATM strike for every index.
    pub fn default_spec(&self) -> ContractSpec {
        match self {
            Instrument::Nifty => ContractSpec::new(75, 50.0, 800.0),
            Instrument::BankNifty => ContractSpec::new(35, 100.0, 1600.0),
            Instrument::FinNifty => ContractSpec::new(65, 50.0, 800.0),
            Instrument::MidcpNifty => ContractSpec::new(140, 25.0, 400.0),
        }
    }
}

impl FromStr for Instrument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Instrument::ALL
            .into_iter()
            .find(|i| i.symbol() == normalized)
            .ok_or_else(|| Error::UnsupportedInstrument(s.to_string()))
    }
}

impl TryFrom<String> for Instrument {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Instrument> for String {
    fn from(value: Instrument) -> Self {
        value.symbol().to_string()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Contracts per lot.
    pub lot_size: u32,
    /// Distance between adjacent listed strikes.
    pub strike_step: f64,
    /// Half-width of the strike band summed around the ATM strike.
    pub band_width: f64,
}

impl ContractSpec {
    pub fn new(lot_size: u32, strike_step: f64, band_width: f64) -> Self {
        ContractSpec { lot_size, strike_step, band_width }
    }
}
