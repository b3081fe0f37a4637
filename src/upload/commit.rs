//! Commit stage: one batch-create call per batch

use super::batch::Batch;
use super::{CommitError, CommitTarget};
use crate::metrics;
use crate::photos::{BatchCreateResponse, PhotosApi};
use crate::retry::RetryPolicy;

/// Commit every entry of `batch` with one (retried) batch-create call.
///
/// The batch is handed back alongside the outcome so the caller can map
/// results onto input positions.
#[tracing::instrument(
    name = "pipeline.commit",
    skip_all,
    fields(batch = batch.number, items = batch.len())
)]
pub(crate) async fn commit_batch(
    api: &dyn PhotosApi,
    retry: &RetryPolicy,
    target: &CommitTarget,
    batch: Batch,
) -> (Batch, Result<BatchCreateResponse, CommitError>) {
    let request = target.request(batch.entries.iter().map(|entry| entry.item.clone()));
    tracing::info!("Adding {} item(s)", request.new_media_items.len());
    metrics::observe_batch_size(batch.len());

    let result = retry
        .run("batch_create", |_| api.batch_create(&request))
        .await
        .map_err(CommitError::from);

    match &result {
        Ok(response) => {
            metrics::record_batch_create(true);
            tracing::debug!(
                results = response.new_media_item_results.len(),
                "Batch committed"
            );
        }
        Err(e) => {
            metrics::record_batch_create(false);
            tracing::error!(error = %e, "Error while adding {} item(s)", batch.len());
        }
    }
    (batch, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemBody;
    use crate::photos::{
        Album, AlbumPage, AlbumPosition, ApiError, BatchCreateRequest, MediaItem, NewMediaItem,
        NewMediaItemResult, Status, UploadToken,
    };
    use crate::upload::batch::BatchEntry;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails the first `failures` batch-create calls with 500.
    struct RecordingApi {
        failures: Mutex<u32>,
        requests: Mutex<Vec<BatchCreateRequest>>,
    }

    #[async_trait]
    impl PhotosApi for RecordingApi {
        async fn upload(&self, _: &str, _: ItemBody) -> Result<UploadToken, ApiError> {
            unimplemented!()
        }

        async fn batch_create(
            &self,
            request: &BatchCreateRequest,
        ) -> Result<BatchCreateResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ApiError::Status {
                    status: 500,
                    body: "internal".into(),
                });
            }
            let new_media_item_results = request
                .new_media_items
                .iter()
                .map(|item| NewMediaItemResult {
                    upload_token: item.upload_token().clone(),
                    status: Status::ok(),
                    media_item: Some(MediaItem {
                        id: format!("media-{}", item.upload_token()),
                        description: item.description.clone(),
                        product_url: None,
                        filename: None,
                    }),
                })
                .collect();
            Ok(BatchCreateResponse {
                new_media_item_results,
            })
        }

        async fn list_albums(&self, _: u32, _: Option<&str>) -> Result<AlbumPage, ApiError> {
            unimplemented!()
        }

        async fn create_album(&self, _: &str) -> Result<Album, ApiError> {
            unimplemented!()
        }
    }

    fn batch(n: usize) -> Batch {
        Batch {
            number: 1,
            entries: (0..n)
                .map(|index| BatchEntry {
                    index,
                    item: NewMediaItem::new(
                        UploadToken::new(format!("tok-{}", index)),
                        &format!("{}.jpg", index),
                    ),
                })
                .collect(),
        }
    }

    fn retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            multiplier: 1.0,
            deadline: None,
        }
    }

    fn api(failures: u32) -> RecordingApi {
        RecordingApi {
            failures: Mutex::new(failures),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_commit_to_album_sets_target_fields() {
        let api = api(0);
        let target = CommitTarget::album("album-9");

        let (batch, result) = commit_batch(&api, &retry(0), &target, batch(3)).await;

        assert_eq!(batch.len(), 3);
        assert_eq!(result.unwrap().new_media_item_results.len(), 3);
        let requests = api.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].album_id.as_deref(), Some("album-9"));
        assert_eq!(
            requests[0].album_position,
            Some(AlbumPosition::last_in_album())
        );
        assert_eq!(requests[0].new_media_items[2].description, "2.jpg");
    }

    #[tokio::test]
    async fn test_commit_retries_whole_batch() {
        let api = api(2);

        let (_, result) = commit_batch(&api, &retry(5), &CommitTarget::library(), batch(4)).await;

        assert!(result.is_ok());
        let requests = api.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.new_media_items.len() == 4));
        assert!(requests[0].album_id.is_none());
    }

    #[tokio::test]
    async fn test_commit_exhaustion_fails_batch() {
        let api = api(u32::MAX);

        let (_, result) = commit_batch(&api, &retry(1), &CommitTarget::library(), batch(2)).await;

        assert!(matches!(
            result,
            Err(CommitError::RetryExhausted { attempts: 2, .. })
        ));
    }
}
