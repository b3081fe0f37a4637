//! Photo-library service interface
//!
//! [`PhotosApi`] is the seam between the upload pipeline and the remote
//! service: one method per REST call, each performing a single attempt.
//! Retrying is the caller's business; every failure is an [`ApiError`] that
//! knows whether it is worth retrying.
//!
//! | Call | Method | Path |
//! |------|--------|------|
//! | Upload bytes | `POST` | `/v1/uploads` |
//! | Batch-create media items | `POST` | `/v1/mediaItems:batchCreate` |
//! | List albums | `GET` | `/v1/albums` |
//! | Create album | `POST` | `/v1/albums` |

use crate::item::ItemBody;
use crate::retry::Retryable;
use async_trait::async_trait;
use thiserror::Error;

pub mod albums;
mod client;
pub mod types;

pub use client::PhotosClient;
pub use types::{
    Album, AlbumPage, AlbumPosition, BatchCreateRequest, BatchCreateResponse, MediaItem,
    NewMediaItem, NewMediaItemResult, Status, UploadToken,
};

/// Errors from a single API call
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("could not build client: {0}")]
    Client(String),

    #[error("could not build request: {0}")]
    Request(String),

    #[error("could not send request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("got status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Status codes worth another attempt: 429 and every 5xx.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

impl ApiError {
    /// HTTP status of the failed call, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => is_retryable_status(*status),
            ApiError::Client(_) | ApiError::Request(_) | ApiError::InvalidResponse(_) => false,
        }
    }
}

/// Photo-library REST calls, one attempt each.
#[async_trait]
pub trait PhotosApi: Send + Sync {
    /// Stage raw bytes and return the upload token.
    async fn upload(&self, file_name: &str, body: ItemBody) -> Result<UploadToken, ApiError>;

    /// Turn upload tokens into library entries, optionally inside an album.
    async fn batch_create(
        &self,
        request: &BatchCreateRequest,
    ) -> Result<BatchCreateResponse, ApiError>;

    /// Fetch one page of the caller's albums.
    async fn list_albums(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<AlbumPage, ApiError>;

    async fn create_album(&self, title: &str) -> Result<Album, ApiError>;
}
