use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::Error;

/// Which listed expiry a series tracks. Resolved against the expiry list of
/// the latest snapshot, which the exchange orders earliest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExpirySelector {
    CurrentWeek,
    NextWeek,
    Monthly,
}

impl ExpirySelector {
    pub const ALL: [ExpirySelector; 3] = [
        ExpirySelector::CurrentWeek,
        ExpirySelector::NextWeek,
        ExpirySelector::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpirySelector::CurrentWeek => "current-week",
            ExpirySelector::NextWeek => "next-week",
            ExpirySelector::Monthly => "monthly",
        }
    }

    /// Picks the concrete expiry date. Next-week falls back to the last listed
    /// expiry when only one is available.
    pub fn resolve<'a>(&self, expiries: &'a [String]) -> Option<&'a str> {
        let index = match self {
            ExpirySelector::CurrentWeek => 0,
            ExpirySelector::NextWeek if expiries.len() > 1 => 1,
            ExpirySelector::NextWeek | ExpirySelector::Monthly => expiries.len().checked_sub(1)?,
        };
        expiries.get(index).map(String::as_str)
    }
}

impl FromStr for ExpirySelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "current-week" | "current" | "weekly" => Ok(ExpirySelector::CurrentWeek),
            "next-week" | "next" => Ok(ExpirySelector::NextWeek),
            "monthly" | "month" => Ok(ExpirySelector::Monthly),
            _ => Err(Error::UnsupportedExpirySelector(s.to_string())),
        }
    }
}

impl TryFrom<String> for ExpirySelector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExpirySelector> for String {
    fn from(value: ExpirySelector) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ExpirySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
