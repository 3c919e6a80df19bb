use std::path::Path;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use async_image_loader::domain::CacheKey;
use async_image_loader::infrastructure::{
    AppConfig, CliArgs, Command, ConfigStore, DiskImageCache, ImageLoader,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let store = match &args.config {
        Some(path) => ConfigStore::at(path.clone()),
        None => ConfigStore::new()?,
    };
    let mut config = store.load()?;
    config.merge_with_args(args);
    Ok(config)
}

async fn fetch(
    config: &AppConfig,
    url: &str,
    key: Option<String>,
    out: Option<&Path>,
    repeat: usize,
) -> Result<()> {
    let loader = ImageLoader::new(config.loader.to_options()).await?;
    let key = key.map_or_else(|| CacheKey::from_url(url), CacheKey::from);

    let mut last = None;
    for _ in 0..repeat.max(1) {
        let loaded = loader.load(key.clone(), url).await?;
        println!(
            "{key}: {}x{} from {}",
            loaded.width(),
            loaded.height(),
            loaded.source
        );
        last = Some(loaded);
    }

    if let (Some(path), Some(loaded)) = (out, last) {
        loaded
            .image
            .save(path)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote image");
    }

    loader.release(false).await;
    Ok(())
}

async fn clear(config: &AppConfig) -> Result<()> {
    let options = config.loader.to_options();
    let cache = DiskImageCache::new(options.disk_cache_dir).await?;
    let removed = cache.clear().await?;
    println!("Removed {removed} cached images from {}", cache.root().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = async_image_loader::VERSION, "Starting {}", async_image_loader::NAME);

    match args.command {
        Command::Fetch {
            url,
            key,
            out,
            repeat,
        } => fetch(&config, &url, key, out.as_deref(), repeat).await,
        Command::Clear => clear(&config).await,
    }
}
