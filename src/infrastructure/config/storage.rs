use super::app_config::AppConfig;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform configuration directory exists.
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    /// Filesystem error on the config file.
    #[error("config file {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The default configuration could not be rendered.
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// One `config.toml` file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Uses `config.toml` in the platform configuration directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigDirNotFound` if the platform has no config directory.
    pub fn new() -> Result<Self, ConfigError> {
        AppConfig::default_config_dir()
            .map(|dir| Self::at(dir.join(CONFIG_FILE_NAME)))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    /// Uses the file at `path`.
    #[must_use]
    pub const fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the config file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the configuration.
    ///
    /// A missing file is created with the defaults. A file that does not
    /// parse is kept as is and the defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or the defaults
    /// cannot be written.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Writing default config");
                let config = AppConfig::default();
                self.write(&config)?;
                return Ok(config);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(toml::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Invalid config, using defaults");
            AppConfig::default()
        }))
    }

    fn write(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let rendered = toml::to_string_pretty(config)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        staged
            .write_all(rendered.as_bytes())
            .map_err(|e| self.io_error(e))?;
        staged
            .persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::LoaderConfig;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(CONFIG_FILE_NAME);

        let config = ConfigStore::at(path.clone()).load().unwrap();

        assert_eq!(config.loader, LoaderConfig::default());
        let written: AppConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.loader, LoaderConfig::default());
    }

    #[test]
    fn test_unparsable_file_falls_back_and_is_kept() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.toml");
        std::fs::write(&path, "[loader\nworker_pool_size = ").unwrap();

        let config = ConfigStore::at(path.clone()).load().unwrap();

        assert_eq!(config.loader, LoaderConfig::default());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[loader\nworker_pool_size = "
        );
    }

    #[test]
    fn test_reads_loader_table() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        std::fs::write(&path, "[loader]\nworker_pool_size = 8\n").unwrap();

        let store = ConfigStore::at(path.clone());

        assert_eq!(store.path(), path.as_path());
        assert_eq!(store.load().unwrap().loader.worker_pool_size, 8);
    }

    #[test]
    fn test_directory_path_is_an_io_error() {
        let temp = TempDir::new().unwrap();

        let result = ConfigStore::at(temp.path().to_path_buf()).load();

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
