//! Application configuration module.
//!
//! Manages the TOML config file holding schedule, listing source and
//! output settings.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, OutputConfig, ScheduleConfig, SourceConfig};
pub use paths::resolve_config_path;
