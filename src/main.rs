//! Photo Uploadr - concurrent uploader for photo-library services
//!
//! Uploads files and URLs, then adds them to the library or an album.

use anyhow::Context;
use clap::Parser;
use photo_uploadr::item::{discover, RequestOptions, UploadItem};
use photo_uploadr::photos::PhotosClient;
use photo_uploadr::upload::{ensure_any_added, PipelineOptions, Uploader};
use photo_uploadr::{config::Config, logging, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Photo Uploadr - upload files and URLs to a photo library
#[derive(Parser, Debug)]
#[command(name = "photo-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files, directories or http(s) URLs to upload
    #[arg(required = true)]
    items: Vec<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter (overridden by RUST_LOG)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Add to the album with this title, creating it if needed
    #[arg(short, long, conflicts_with = "new_album")]
    album: Option<String>,

    /// Create a new album with this title and add to it
    #[arg(short, long)]
    new_album: Option<String>,

    /// OAuth2 access token for the photo-library API
    #[arg(long, env = "PHOTOS_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Extra header for URL downloads, as "Name: value"
    #[arg(short = 'H', long = "request-header")]
    request_headers: Vec<String>,

    /// Basic auth for URL downloads, as "username:password"
    #[arg(long)]
    request_auth: Option<String>,

    /// Number of uploads in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Items per batch-create call
    #[arg(long)]
    batch_size: Option<usize>,

    /// Write Prometheus metrics to this file after the run
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("could not load configuration from {:?}", path))?,
            None => Config::default(),
        };

        if let Some(token) = &self.access_token {
            config.api.access_token = Some(token.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.pipeline.concurrency = concurrency;
        }
        if let Some(batch_size) = self.batch_size {
            config.pipeline.batch_size = batch_size;
        }
        if let Some(path) = &self.metrics_file {
            config.metrics.textfile = Some(path.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

fn print_items(items: &[Box<dyn UploadItem>]) {
    println!("The following {} item(s) will be uploaded:", items.len());
    for (i, item) in items.iter().enumerate() {
        println!("{:3}: {}", i + 1, item);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;

    logging::init(&config.logging, args.log_level.as_deref())?;
    info!("Starting Photo Uploadr v{}", photo_uploadr::VERSION);

    if config.api.access_token.is_none() {
        warn!("No access token set; the service will likely reject every call");
    }

    let downloader = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api.timeout_seconds))
        .build()
        .context("could not build download client")?;
    let options = RequestOptions {
        headers: args.request_headers.clone(),
        basic_auth: args.request_auth.clone(),
    };
    let items = discover(&args.items, &downloader, &options)?;
    if items.is_empty() {
        anyhow::bail!("no file found in {}", args.items.join(", "));
    }
    print_items(&items);

    let client = PhotosClient::new(&config.api)?;
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let uploader = Uploader::new(Arc::new(client), PipelineOptions::from(&config.pipeline))
        .with_cancellation(cancel);
    let results = match (&args.album, &args.new_album) {
        (Some(title), _) => uploader.add_to_album(title, &items).await?,
        (None, Some(title)) => uploader.create_album(title, &items).await?,
        (None, None) => uploader.add_to_library(&items).await,
    };

    println!("--------");
    for (i, result) in results.iter().enumerate() {
        println!("{:3}: {}", i + 1, result.summary());
    }

    if let Some(path) = &config.metrics.textfile {
        if let Err(e) = metrics::write_textfile(path) {
            warn!(error = %e, "Could not write metrics");
        }
    }

    let added = ensure_any_added(&results)?;
    info!("Added {} of {} item(s)", added, results.len());
    Ok(())
}
