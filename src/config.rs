//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (bind address, port, metrics path)
//! - The per-source poll deadline
//! - Source definitions (asic, hwmon, smonctl, mstpd) and the hwmon sensor list

mod app;
mod validation;

pub use app::{
    AppConfig, CollectorsConfig, DEFAULT_METRICS_PATH, DEFAULT_PORT, ServerConfig, load_sensor_list,
};
pub use validation::{ConfigError, expand_env_vars, parse_poll_timeout, validate_sensors};
