//! Photo Uploadr Library
//!
//! Uploads local files and remote URLs into a photo-library service.
//!
//! # Features
//!
//! - **Concurrent uploads**: bounded worker pool with per-item retry
//! - **Batched commits**: fixed-size batch-create calls, overlapping with
//!   later uploads
//! - **Albums**: add to an existing album by title or create a new one
//! - **Ordered results**: one result per input, in input order
//!
//! # Example
//!
//! ```no_run
//! use photo_uploadr::item::{discover, RequestOptions};
//! use photo_uploadr::photos::PhotosClient;
//! use photo_uploadr::upload::{ensure_any_added, PipelineOptions, Uploader};
//! use photo_uploadr::Config;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let client = PhotosClient::new(&config.api)?;
//!     let items = discover(
//!         &["photos/".to_string()],
//!         &reqwest::Client::new(),
//!         &RequestOptions::default(),
//!     )?;
//!
//!     let uploader = Uploader::new(Arc::new(client), PipelineOptions::from(&config.pipeline));
//!     let results = uploader.add_to_library(&items).await;
//!     ensure_any_added(&results)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod item;
pub mod logging;
pub mod metrics;
pub mod photos;
pub mod retry;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use upload::{AddResult, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
