//! Turn command-line arguments into upload items
//!
//! Arguments starting with `http://` or `https://` become [`HttpItem`]s;
//! anything else is walked as a file or directory tree and every regular file
//! becomes a [`FileItem`]. Directory entries are visited in lexical order so
//! the resulting list is stable between runs.

use super::{FileItem, HttpItem, UploadItem};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Discovery errors
#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("invalid URL {arg}: {reason}")]
    InvalidUrl { arg: String, reason: String },

    #[error("invalid request header '{0}': expected 'Name: value'")]
    InvalidHeader(String),

    #[error("invalid basic auth: expected 'username:password'")]
    InvalidBasicAuth,

    #[error("error while finding files in {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Options applied to every remote item.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers as `Name: value`.
    pub headers: Vec<String>,
    /// Basic auth credentials as `username:password`.
    pub basic_auth: Option<String>,
}

impl RequestOptions {
    fn header_map(&self) -> Result<HeaderMap, DiscoverError> {
        let mut map = HeaderMap::new();
        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| DiscoverError::InvalidHeader(header.clone()))?;
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| DiscoverError::InvalidHeader(header.clone()))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|_| DiscoverError::InvalidHeader(header.clone()))?;
            map.append(name, value);
        }
        Ok(map)
    }

    fn credentials(&self) -> Result<Option<(String, String)>, DiscoverError> {
        match &self.basic_auth {
            None => Ok(None),
            Some(auth) => auth
                .split_once(':')
                .map(|(user, pass)| Some((user.to_string(), pass.to_string())))
                .ok_or(DiscoverError::InvalidBasicAuth),
        }
    }
}

fn is_url(arg: &str) -> bool {
    arg.starts_with("http://") || arg.starts_with("https://")
}

/// Expand arguments into items, preserving argument order.
pub fn discover(
    args: &[String],
    client: &reqwest::Client,
    options: &RequestOptions,
) -> Result<Vec<Box<dyn UploadItem>>, DiscoverError> {
    let headers = options.header_map()?;
    let credentials = options.credentials()?;
    let mut items: Vec<Box<dyn UploadItem>> = Vec::new();

    for arg in args {
        if is_url(arg) {
            let url = Url::parse(arg).map_err(|e| DiscoverError::InvalidUrl {
                arg: arg.clone(),
                reason: e.to_string(),
            })?;
            let mut item = HttpItem::new(client.clone(), url).with_headers(headers.clone());
            if let Some((username, password)) = &credentials {
                item = item.with_basic_auth(username.clone(), password.clone());
            }
            items.push(Box::new(item));
        } else {
            let mut files = Vec::new();
            walk(Path::new(arg), &mut files).map_err(|source| DiscoverError::Walk {
                path: PathBuf::from(arg),
                source,
            })?;
            items.extend(
                files
                    .into_iter()
                    .map(|path| Box::new(FileItem::new(path)) as Box<dyn UploadItem>),
            );
        }
    }

    Ok(items)
}

fn walk(path: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.is_file() {
        files.push(path.to_path_buf());
    } else if metadata.is_dir() {
        let mut entries = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();
        for entry in entries {
            walk(&entry, files)?;
        }
    }
    Ok(())
}
