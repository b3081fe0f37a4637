use super::{ItemBody, ItemError, UploadItem};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

/// Local file.
///
/// The file is stat'ed and opened on every call to [`UploadItem::open`] and
/// streamed from disk, never buffered whole.
#[derive(Debug, Clone)]
pub struct FileItem {
    path: PathBuf,
    name: String,
}

impl FileItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ItemError {
        ItemError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl fmt::Display for FileItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[async_trait]
impl UploadItem for FileItem {
    async fn open(&self) -> Result<ItemBody, ItemError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        Ok(ItemBody {
            body: reqwest::Body::wrap_stream(ReaderStream::new(file)),
            length: metadata.len(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
