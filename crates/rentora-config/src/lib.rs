//! # Rentora Config
//!
//! Configuration for the Rentora scheduler, layered from TOML files and
//! `RENTORA_`-prefixed environment variables.

mod app_config;
mod loader;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use rentora_core::telemetry::LoggingConfig;
pub use validation::validate_config;
