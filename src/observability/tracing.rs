use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use crate::error::{Error, Result};
use crate::types::series_key::SeriesKey;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global subscriber. Level comes from `RUST_LOG`, default `info`.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    installed.map_err(|e| Error::ConfigError(format!("tracing init failed: {}", e)))
}

pub fn trace_tick(key: &SeriesKey, tick: u64) -> Span {
    tracing::info_span!(
        "tick",
        key = %key,
        tick,
    )
}
