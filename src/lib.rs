pub mod utils;
pub mod types;
pub mod chain;
pub mod history;
pub mod scheduler;
pub mod error;
pub mod config;
pub mod observability;

// Environment variable naming the config overlay (`config/{env}`)
pub const CONFIG_ENV_VAR: &str = "OIPULSE_ENV";
