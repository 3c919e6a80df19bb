//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::infrastructure::image::{
    LoaderOptions, ShutdownPolicy, default_cache_dir, memory_cache::DEFAULT_CACHE_SIZE,
    worker_pool::DEFAULT_POOL_SIZE,
};

use super::args::CliArgs;

const APP_NAME: &str = "async-image-loader";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "asyncimageloader";

/// Log level configuration. Its `Display` form is an `EnvFilter` directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by CLI flags.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Image loader settings.
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// `[loader]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Keep decoded images in memory.
    #[serde(default = "default_true")]
    pub memory_cache: bool,

    /// Number of images held in memory.
    #[serde(default = "default_memory_cache_capacity")]
    pub memory_cache_capacity: usize,

    /// Persist images on disk.
    #[serde(default = "default_true")]
    pub disk_cache: bool,

    /// Disk cache directory; the platform cache directory when unset.
    #[serde(default)]
    pub disk_cache_dir: Option<PathBuf>,

    /// Concurrent fetch tasks.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Maximum image width in pixels.
    #[serde(default = "default_max_width")]
    pub max_width: f32,

    /// Maximum image height in pixels.
    #[serde(default = "default_max_height")]
    pub max_height: f32,

    /// HTTP connect timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// HTTP read timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Log where each image was loaded from.
    #[serde(default)]
    pub debug_logging: bool,

    /// Pending work on shutdown: "graceful" or "abort".
    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            memory_cache: true,
            memory_cache_capacity: default_memory_cache_capacity(),
            disk_cache: true,
            disk_cache_dir: None,
            worker_pool_size: default_worker_pool_size(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            connect_timeout_secs: default_timeout_secs(),
            read_timeout_secs: default_timeout_secs(),
            debug_logging: false,
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Builds the immutable loader options.
    #[must_use]
    pub fn to_options(&self) -> LoaderOptions {
        LoaderOptions::builder()
            .cache_in_memory(self.memory_cache)
            .memory_cache_capacity(self.memory_cache_capacity)
            .cache_on_disk(self.disk_cache)
            .disk_cache_dir(self.disk_cache_dir.clone().unwrap_or_else(default_cache_dir))
            .worker_pool_size(self.worker_pool_size)
            .max_size(self.max_width, self.max_height)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .read_timeout(Duration::from_secs(self.read_timeout_secs))
            .debug_logging(self.debug_logging)
            .shutdown_policy(self.shutdown_policy)
            .build()
    }
}

fn default_true() -> bool {
    true
}

fn default_memory_cache_capacity() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_worker_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_max_width() -> f32 {
    320.0
}

fn default_max_height() -> f32 {
    800.0
}

fn default_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.loader.disk_cache_dir = Some(cache_dir.clone());
        }
        if let Some(memory_cache) = args.memory_cache {
            self.loader.memory_cache = memory_cache;
        }
        if let Some(disk_cache) = args.disk_cache {
            self.loader.disk_cache = disk_cache;
        }
        if let Some(workers) = args.workers {
            self.loader.worker_pool_size = workers;
        }
        if let Some(max_width) = args.max_width {
            self.loader.max_width = max_width;
        }
        if let Some(max_height) = args.max_height {
            self.loader.max_height = max_height;
        }
        if let Some(debug_logging) = args.debug_logging {
            self.loader.debug_logging = debug_logging;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_loader_table() {
        let toml_content = r#"
            log_level = "debug"

            [loader]
            memory_cache = false
            disk_cache_dir = "/var/cache/thumbs"
            worker_pool_size = 6
            max_width = 128.0
            shutdown_policy = "abort"
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(!config.loader.memory_cache);
        assert!(config.loader.disk_cache); // default_true
        assert_eq!(
            config.loader.disk_cache_dir,
            Some(PathBuf::from("/var/cache/thumbs"))
        );
        assert_eq!(config.loader.worker_pool_size, 6);
        assert!((config.loader.max_width - 128.0).abs() < f32::EPSILON);
        assert!((config.loader.max_height - 800.0).abs() < f32::EPSILON);
        assert_eq!(config.loader.shutdown_policy, ShutdownPolicy::Abort);
    }

    #[test]
    fn test_log_level_display_is_filter_directive() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        let config: AppConfig = toml::from_str("log_level = \"trace\"").unwrap();
        assert_eq!(config.log_level.to_string(), "trace");
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_path.is_none());
        assert_eq!(config.loader, LoaderConfig::default());
    }

    #[test]
    fn test_to_options() {
        let loader = LoaderConfig {
            disk_cache_dir: Some(PathBuf::from("/tmp/imgs")),
            read_timeout_secs: 3,
            ..LoaderConfig::default()
        };

        let options = loader.to_options();

        assert!(options.memory_cache_enabled);
        assert!(options.disk_cache_enabled);
        assert_eq!(options.disk_cache_dir, PathBuf::from("/tmp/imgs"));
        assert_eq!(options.worker_pool_size, 3);
        assert_eq!(options.read_timeout, Duration::from_secs(3));
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = AppConfig::default();
        let args = CliArgs::parse_from([
            "async-image-loader",
            "--workers",
            "9",
            "--disk-cache",
            "false",
            "--log-level",
            "warn",
            "clear",
        ]);

        config.merge_with_args(&args);

        assert_eq!(config.loader.worker_pool_size, 9);
        assert!(!config.loader.disk_cache);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(config.loader.memory_cache);
    }
}
