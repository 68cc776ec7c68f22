use std::collections::HashMap;
use std::fmt::Display;
use std::ops::RangeInclusive;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use crate::config::*;
use crate::error::{Error, Result};
use crate::types::instrument::{ContractSpec, Instrument};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub selection: SelectionConfig,
    pub polling: PollingConfig,
    pub history: HistoryConfig,
    pub source: SourceConfig,
    pub logging: LoggingConfig,
    pub instruments: HashMap<Instrument, ContractOverride>,
}

impl AppConfig {
    /// Layers `config/default`, `config/{env}` (both optional) and
    /// `OIPULSE__SECTION__KEY` environment variables, then validates.
    pub fn load(env: &str) -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("OIPULSE")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::build(builder)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(contents, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config = builder
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        check_range("polling.refresh_seconds", self.polling.refresh_seconds, &REFRESH_SECONDS_RANGE)?;
        check_range(
            "polling.fetch_timeout_seconds",
            self.polling.fetch_timeout_seconds,
            &FETCH_TIMEOUT_SECONDS_RANGE,
        )?;
        check_range("history.capacity", self.history.capacity, &HISTORY_CAPACITY_RANGE)?;

        for (instrument, spec) in self.contract_specs() {
            if spec.lot_size == 0 {
                return Err(Error::ConfigError(format!("instruments.{instrument}.lot_size must be positive")));
            }
            if !(spec.strike_step.is_finite() && spec.strike_step > 0.0) {
                return Err(Error::ConfigError(format!("instruments.{instrument}.strike_step must be positive")));
            }
            if !(spec.band_width.is_finite() && spec.band_width >= 0.0) {
                return Err(Error::ConfigError(format!("instruments.{instrument}.band_width must be non-negative")));
            }
        }

        Ok(())
    }

    /// Contract constants for every instrument, overrides applied.
    pub fn contract_specs(&self) -> HashMap<Instrument, ContractSpec> {
        Instrument::ALL
            .into_iter()
            .map(|instrument| {
                let base = instrument.default_spec();
                let spec = self
                    .instruments
                    .get(&instrument)
                    .map(|o| o.apply(base))
                    .unwrap_or(base);
                (instrument, spec)
            })
            .collect()
    }
}

fn check_range<T: PartialOrd + Display>(field: &str, value: T, range: &RangeInclusive<T>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::ConfigError(format!(
            "{} = {} is outside {}..={}",
            field,
            value,
            range.start(),
            range.end()
        )))
    }
}
