use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments. Every flag overrides the matching config entry.
#[derive(Debug, Parser)]
#[command(
    name = "async-image-loader",
    version,
    about = "Fetch remote images through a memory and disk cache",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Disk cache directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Enable the memory cache.
    #[arg(long)]
    pub memory_cache: Option<bool>,

    /// Enable the disk cache.
    #[arg(long)]
    pub disk_cache: Option<bool>,

    /// Number of concurrent fetches.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Maximum image width.
    #[arg(long)]
    pub max_width: Option<f32>,

    /// Maximum image height.
    #[arg(long)]
    pub max_height: Option<f32>,

    /// Log where each image was loaded from.
    #[arg(long)]
    pub debug_logging: Option<bool>,

    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Actions the binary can perform.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load an image and print where it came from.
    Fetch {
        /// Image URL.
        url: String,

        /// Cache key; derived from the URL when omitted.
        #[arg(long)]
        key: Option<String>,

        /// Write the loaded image to this path.
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,

        /// Number of times to request the image.
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },
    /// Remove every file from the disk cache.
    Clear,
}
