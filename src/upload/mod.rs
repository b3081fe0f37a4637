//! Upload pipeline
//!
//! Items are uploaded by a bounded pool of concurrent workers and committed
//! to the library in batches:
//!
//! ```text
//! items ─► partition into groups of batch_size
//!            │
//!            ▼
//!        upload workers (≤ concurrency in flight, each retried)
//!            │ a group's last upload finished
//!            ▼
//!        batch-create call per group (retried as a whole)
//!            │
//!            ▼
//!        results, one per input, in input order
//! ```
//!
//! Batch membership is fixed before the first upload starts, so it depends
//! only on input order. Commits of earlier groups overlap with uploads of
//! later ones.

use crate::config::PipelineConfig;
use crate::item::{ItemError, UploadItem};
use crate::metrics;
use crate::photos::albums::find_album_by_title;
use crate::photos::{
    Album, AlbumPosition, ApiError, BatchCreateRequest, BatchCreateResponse, NewMediaItem,
    PhotosApi,
};
use crate::retry::{RetryError, RetryPolicy, Retryable};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

mod aggregate;
pub mod batch;
mod commit;
mod worker;

pub use aggregate::{ensure_any_added, AddResult};
use aggregate::Aggregator;
use batch::Batch;

/// Errors of the upload stage for one item
#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Open(#[from] ItemError),

    #[error("upload failed: {0}")]
    Api(#[from] ApiError),

    #[error("upload failed: retry exhausted after {attempts} attempt(s): {last}")]
    RetryExhausted { attempts: u32, last: ApiError },
}

impl Retryable for UploadError {
    fn is_retryable(&self) -> bool {
        match self {
            UploadError::Api(e) => e.is_retryable(),
            UploadError::Open(_) | UploadError::RetryExhausted { .. } => false,
        }
    }
}

impl From<RetryError<UploadError>> for UploadError {
    fn from(e: RetryError<UploadError>) -> Self {
        match e {
            RetryError::Terminal(e) => e,
            RetryError::Exhausted {
                attempts,
                last: UploadError::Api(last),
            } => UploadError::RetryExhausted { attempts, last },
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Errors of a batch-create call, shared by every item of the batch
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("batch create failed: {0}")]
    Api(ApiError),

    #[error("batch create failed: retry exhausted after {attempts} attempt(s): {last}")]
    RetryExhausted { attempts: u32, last: ApiError },
}

impl From<RetryError<ApiError>> for CommitError {
    fn from(e: RetryError<ApiError>) -> Self {
        match e {
            RetryError::Terminal(e) => CommitError::Api(e),
            RetryError::Exhausted { attempts, last } => CommitError::RetryExhausted { attempts, last },
        }
    }
}

/// Why one item did not make it into the library
#[derive(Error, Debug)]
pub enum AddError {
    #[error(transparent)]
    Upload(UploadError),

    #[error(transparent)]
    Commit(Arc<CommitError>),

    #[error("{message} ({code})")]
    Rejected { code: i32, message: String },

    #[error("no result returned for the uploaded item")]
    MissingResult,

    #[error("cancelled")]
    Cancelled,
}

/// Errors that abort a whole operation
#[derive(Error, Debug)]
pub enum PhotosError {
    #[error("could not find album {title:?}: {source}")]
    FindAlbum {
        title: String,
        #[source]
        source: RetryError<ApiError>,
    },

    #[error("could not create album {title:?}: {source}")]
    CreateAlbum {
        title: String,
        #[source]
        source: RetryError<ApiError>,
    },

    #[error("none of {total} item(s) could be added")]
    NothingAdded { total: usize },

    #[error("cancelled")]
    Cancelled,
}

/// Runtime tuning of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub concurrency: usize,
    pub batch_size: usize,
    pub album_page_size: u32,
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            batch_size: config.batch_size.max(1),
            album_page_size: config.album_page_size.max(1),
            retry: config.retry.clone().into(),
        }
    }
}

/// Where committed items go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitTarget {
    pub album_id: Option<String>,
    pub position: Option<AlbumPosition>,
}

impl CommitTarget {
    /// The library itself, no album.
    pub fn library() -> Self {
        Self::default()
    }

    /// Append at the end of the given album.
    pub fn album(album_id: impl Into<String>) -> Self {
        Self {
            album_id: Some(album_id.into()),
            position: Some(AlbumPosition::last_in_album()),
        }
    }

    pub fn request(&self, items: impl IntoIterator<Item = NewMediaItem>) -> BatchCreateRequest {
        BatchCreateRequest {
            album_id: self.album_id.clone(),
            new_media_items: items.into_iter().collect(),
            album_position: self.position.clone(),
        }
    }
}

type CommitFuture<'a> = BoxFuture<'a, (Batch, Result<BatchCreateResponse, CommitError>)>;

/// Adds items to the library, optionally inside an album.
///
/// # Example
///
/// ```no_run
/// use photo_uploadr::config::ApiConfig;
/// use photo_uploadr::item::{FileItem, UploadItem};
/// use photo_uploadr::photos::PhotosClient;
/// use photo_uploadr::upload::{PipelineOptions, Uploader};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PhotosClient::new(&ApiConfig::default())?;
/// let uploader = Uploader::new(Arc::new(client), PipelineOptions::default());
///
/// let items: Vec<Box<dyn UploadItem>> = vec![Box::new(FileItem::new("cat.jpg"))];
/// for result in uploader.add_to_album("Pets", &items).await? {
///     println!("{}: {}", result.item, result.summary());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Uploader {
    api: Arc<dyn PhotosApi>,
    options: PipelineOptions,
    cancel: CancellationToken,
}

impl Uploader {
    pub fn new(api: Arc<dyn PhotosApi>, options: PipelineOptions) -> Self {
        Self {
            api,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop in-flight work when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Add items to the library without an album.
    pub async fn add_to_library(&self, items: &[Box<dyn UploadItem>]) -> Vec<AddResult> {
        self.add(items, &CommitTarget::library()).await
    }

    /// Add items to the album titled `title`, creating it if none exists.
    pub async fn add_to_album(
        &self,
        title: &str,
        items: &[Box<dyn UploadItem>],
    ) -> Result<Vec<AddResult>, PhotosError> {
        let found = self
            .unless_cancelled(find_album_by_title(
                self.api.as_ref(),
                &self.options.retry,
                self.options.album_page_size,
                title,
            ))
            .await?
            .map_err(|source| PhotosError::FindAlbum {
                title: title.to_string(),
                source,
            })?;

        let album = match found {
            Some(album) => {
                tracing::info!(album_id = %album.id, "Found album {}", album.title);
                album
            }
            None => self.new_album(title).await?,
        };
        Ok(self.add(items, &CommitTarget::album(album.id)).await)
    }

    /// Create a new album titled `title` and add items to it.
    pub async fn create_album(
        &self,
        title: &str,
        items: &[Box<dyn UploadItem>],
    ) -> Result<Vec<AddResult>, PhotosError> {
        let album = self.new_album(title).await?;
        Ok(self.add(items, &CommitTarget::album(album.id)).await)
    }

    async fn new_album(&self, title: &str) -> Result<Album, PhotosError> {
        let api = self.api.as_ref();
        let album = self
            .unless_cancelled(
                self.options
                    .retry
                    .run("create_album", |_| api.create_album(title)),
            )
            .await?
            .map_err(|source| PhotosError::CreateAlbum {
                title: title.to_string(),
                source,
            })?;
        tracing::info!(album_id = %album.id, "Created album {}", album.title);
        Ok(album)
    }

    async fn unless_cancelled<T>(&self, fut: impl Future<Output = T>) -> Result<T, PhotosError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PhotosError::Cancelled),
            value = fut => Ok(value),
        }
    }

    /// Run the pipeline over `items`, committing to `target`.
    ///
    /// Never fails as a whole: every item gets its own result, in input
    /// order. Items still in flight when the run is cancelled end up as
    /// [`AddError::Cancelled`].
    #[tracing::instrument(
        name = "pipeline.add",
        skip_all,
        fields(items = items.len(), album_id = ?target.album_id)
    )]
    pub async fn add(&self, items: &[Box<dyn UploadItem>], target: &CommitTarget) -> Vec<AddResult> {
        let api = self.api.as_ref();
        let retry = &self.options.retry;

        let groups = batch::partition(0..items.len(), self.options.batch_size);
        let mut group_of = vec![0; items.len()];
        for (group, indices) in groups.iter().enumerate() {
            for &index in indices {
                group_of[index] = group;
            }
        }
        let mut pending: Vec<usize> = groups.iter().map(Vec::len).collect();
        tracing::debug!(
            groups = groups.len(),
            concurrency = self.options.concurrency,
            "Starting upload"
        );

        let mut aggregator = Aggregator::new(items.len());
        let mut uploads = stream::iter(items.iter().enumerate())
            .map(move |(index, item)| async move {
                (index, worker::upload_item(api, retry, item.as_ref()).await)
            })
            .buffer_unordered(self.options.concurrency.max(1));
        let mut commits: FuturesUnordered<CommitFuture<'_>> = FuturesUnordered::new();
        let mut uploads_done = items.is_empty();

        while !(uploads_done && commits.is_empty()) {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::warn!("Cancelled, abandoning in-flight work");
                    break;
                }
                Some((batch, result)) = commits.next(), if !commits.is_empty() => {
                    aggregator.record_commit(&batch, result, items);
                }
                next = uploads.next(), if !uploads_done => match next {
                    Some((index, result)) => {
                        aggregator.record_upload(index, result);

                        let group = group_of[index];
                        pending[group] -= 1;
                        if pending[group] == 0 {
                            let batch = aggregator.batch(group + 1, &groups[group], items);
                            if batch.is_empty() {
                                tracing::warn!(batch = group + 1, "Nothing to add in batch");
                            } else {
                                commits.push(commit::commit_batch(api, retry, target, batch).boxed());
                            }
                        }
                    }
                    None => uploads_done = true,
                },
            }
        }
        drop(uploads);
        drop(commits);

        let results = aggregator.finish(items);
        metrics::record_add_results(&results);
        results
    }
}
