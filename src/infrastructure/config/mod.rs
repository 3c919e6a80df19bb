//! Application configuration.

/// Config file schema and defaults.
pub mod app_config;
/// Command-line arguments.
pub mod args;
/// Reading and creating the config file.
pub mod storage;

pub use app_config::{AppConfig, LoaderConfig, LogLevel};
pub use args::{CliArgs, Command};
pub use storage::{ConfigError, ConfigStore};
