//! Upload items
//!
//! An upload item is a read-only description of some bytes to upload: a local
//! file, a remote resource fetched over HTTP, or an in-memory buffer. Items
//! are opened afresh for every upload attempt, so a failed attempt never
//! reuses a half-consumed stream.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod discover;
mod file;
mod http;

pub use discover::{discover, DiscoverError, RequestOptions};
pub use file::FileItem;
pub use http::HttpItem;

/// Errors raised while opening an item
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not fetch {url}: got status {status}")]
    Status { url: String, status: u16 },
}

/// An opened item: the request body plus its declared length.
pub struct ItemBody {
    pub body: reqwest::Body,
    pub length: u64,
}

impl ItemBody {
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self {
            length: bytes.len() as u64,
            body: reqwest::Body::from(bytes),
        }
    }
}

impl fmt::Debug for ItemBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemBody")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Something that can be uploaded.
///
/// `Display` renders the full descriptor (path or URL) used in logs and
/// results; [`UploadItem::name`] is the short file name sent to the service.
#[async_trait]
pub trait UploadItem: fmt::Display + Send + Sync {
    /// Open a fresh stream over the item's bytes.
    async fn open(&self) -> Result<ItemBody, ItemError>;

    /// File name sent with the upload.
    fn name(&self) -> &str;
}

/// In-memory item.
#[derive(Debug, Clone)]
pub struct BytesItem {
    name: String,
    content: Bytes,
}

impl BytesItem {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

impl fmt::Display for BytesItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[async_trait]
impl UploadItem for BytesItem {
    async fn open(&self) -> Result<ItemBody, ItemError> {
        Ok(ItemBody::from_bytes(self.content.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
