//! Upload stage: one item from open to upload token

use super::UploadError;
use crate::item::UploadItem;
use crate::metrics;
use crate::photos::{PhotosApi, UploadToken};
use crate::retry::RetryPolicy;
use std::time::Instant;

/// Upload one item, retrying transient failures.
///
/// Every attempt opens the item afresh; a body left over from a failed
/// attempt is dropped with that attempt. Open failures are never retried.
#[tracing::instrument(name = "pipeline.upload", skip_all, fields(item = %item))]
pub(crate) async fn upload_item(
    api: &dyn PhotosApi,
    retry: &RetryPolicy,
    item: &dyn UploadItem,
) -> Result<UploadToken, UploadError> {
    let started = Instant::now();

    let result = retry
        .run("upload", |attempt| async move {
            let body = item.open().await.map_err(UploadError::Open)?;
            let length = body.length;
            tracing::debug!(attempt = attempt, bytes = length, "Opened item");

            let token = api
                .upload(item.name(), body)
                .await
                .map_err(UploadError::Api)?;
            Ok::<_, UploadError>((token, length))
        })
        .await
        .map_err(UploadError::from);

    metrics::record_upload_duration(started.elapsed().as_secs_f64());
    match result {
        Ok((token, length)) => {
            metrics::record_upload_success(length);
            tracing::info!(
                duration_ms = started.elapsed().as_millis() as u64,
                "Uploaded {}",
                item
            );
            Ok(token)
        }
        Err(e) => {
            metrics::record_upload_failure();
            tracing::error!(error = %e, "Error while uploading {}", item);
            Err(e)
        }
    }
}
