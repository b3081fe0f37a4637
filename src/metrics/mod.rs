//! Metrics module
//!
//! Prometheus counters for the upload pipeline. A one-shot CLI run has no
//! scrape endpoint, so the registry is written out as a node-exporter
//! textfile at the end of the run instead.

use crate::upload::{AddError, AddResult};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "photo_uploadr_uploads_total",
        "Total number of item uploads",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "photo_uploadr_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "photo_uploadr_upload_duration_seconds",
        "Upload duration in seconds, retries included",
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    pub static ref RETRIES_TOTAL: CounterVec = register_counter_vec!(
        "photo_uploadr_retries_total",
        "Retried API calls",
        &["call"]  // "upload", "batch_create", "list_albums", "create_album"
    ).unwrap();

    // Commit metrics
    pub static ref BATCH_CREATE_TOTAL: CounterVec = register_counter_vec!(
        "photo_uploadr_batch_create_total",
        "Batch-create calls",
        &["status"]
    ).unwrap();

    pub static ref BATCH_SIZE: Histogram = register_histogram!(
        "photo_uploadr_batch_size",
        "Items per batch-create call",
        vec![1.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0]
    ).unwrap();

    // Outcome metrics
    pub static ref ADD_RESULTS_TOTAL: CounterVec = register_counter_vec!(
        "photo_uploadr_add_results_total",
        "Final per-item outcomes",
        &["outcome"]
    ).unwrap();
}

/// Metrics export errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("could not encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("could not write metrics to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Record a successful upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure() {
    UPLOADS_TOTAL.with_label_values(&["failure"]).inc();
}

pub fn record_upload_duration(duration_secs: f64) {
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record one retry of the named call
pub fn record_retry(call: &str) {
    RETRIES_TOTAL.with_label_values(&[call]).inc();
}

pub fn record_batch_create(success: bool) {
    let status = if success { "success" } else { "failure" };
    BATCH_CREATE_TOTAL.with_label_values(&[status]).inc();
}

pub fn observe_batch_size(items: usize) {
    BATCH_SIZE.observe(items as f64);
}

/// Record the final outcome of every item of a run
pub fn record_add_results(results: &[AddResult]) {
    for result in results {
        let outcome = match &result.outcome {
            Ok(_) => "added",
            Err(AddError::Upload(_)) => "upload_failed",
            Err(AddError::Commit(_)) => "commit_failed",
            Err(AddError::Rejected { .. }) => "rejected",
            Err(AddError::MissingResult) => "missing_result",
            Err(AddError::Cancelled) => "cancelled",
        };
        ADD_RESULTS_TOTAL.with_label_values(&[outcome]).inc();
    }
}

/// Render the default registry in the Prometheus text format.
pub fn render() -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write the default registry to `path` for the node-exporter textfile
/// collector.
///
/// The file is written next to its final location and renamed into place so
/// the collector never reads a partial file.
pub fn write_textfile(path: &Path) -> Result<(), MetricsError> {
    let text = render()?;
    let io_error = |source| MetricsError::Io {
        path: path.to_path_buf(),
        source,
    };

    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, text).map_err(io_error)?;
    std::fs::rename(&tmp, path).map_err(io_error)?;
    tracing::debug!(path = %path.display(), "Wrote metrics");
    Ok(())
}
