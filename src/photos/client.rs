//! HTTP implementation of [`PhotosApi`] over `reqwest`
//!
//! # Example
//!
//! ```no_run
//! use photo_uploadr::config::ApiConfig;
//! use photo_uploadr::photos::{PhotosApi, PhotosClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig {
//!     access_token: Some("ya29.token".to_string()),
//!     ..ApiConfig::default()
//! };
//! let client = PhotosClient::new(&config)?;
//! let album = client.create_album("Holidays").await?;
//! println!("Created album {}", album.id);
//! # Ok(())
//! # }
//! ```

use super::types::{CreateAlbumRequest, NewAlbum};
use super::{
    Album, AlbumPage, ApiError, BatchCreateRequest, BatchCreateResponse, PhotosApi, UploadToken,
};
use crate::config::ApiConfig;
use crate::item::ItemBody;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;

const UPLOAD_FILE_NAME_HEADER: &str = "X-Goog-Upload-File-Name";
const UPLOAD_PROTOCOL_HEADER: &str = "X-Goog-Upload-Protocol";

/// Photos REST client
///
/// Cheap to clone; the underlying connection pool is shared and safe for
/// concurrent use by every upload worker.
#[derive(Debug, Clone)]
pub struct PhotosClient {
    http: reqwest::Client,
    endpoint: String,
}

impl PhotosClient {
    /// Build a client that sends the configured bearer token on every call.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::Client(format!("invalid access token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("photo-uploadr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self::with_http_client(http, &config.endpoint))
    }

    /// Wrap an already authenticated HTTP client.
    pub fn with_http_client(http: reqwest::Client, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint, path)
    }
}

/// Classify a failed `send`. A request reqwest refuses to build never
/// reaches the network and fails the same way every time.
fn send_error(error: reqwest::Error) -> ApiError {
    if error.is_builder() {
        ApiError::Request(error.to_string())
    } else {
        ApiError::Transport(error)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    tracing::Span::current().record("http.status_code", status.as_u16());

    let body = response.text().await.map_err(ApiError::Transport)?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl PhotosApi for PhotosClient {
    #[tracing::instrument(
        name = "photos.upload",
        skip(self, body),
        fields(
            upload.file_name = %file_name,
            upload.bytes = body.length,
            http.method = "POST",
            http.status_code = tracing::field::Empty
        ),
        err(level = "debug")
    )]
    async fn upload(&self, file_name: &str, body: ItemBody) -> Result<UploadToken, ApiError> {
        let name = HeaderValue::from_bytes(file_name.as_bytes())
            .map_err(|e| ApiError::Request(format!("invalid file name {:?}: {}", file_name, e)))?;

        tracing::info!(kb = body.length / 1024, "Uploading {}", file_name);

        let response = self
            .http
            .post(self.url("uploads"))
            .header(header::CONTENT_LENGTH, body.length)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(UPLOAD_FILE_NAME_HEADER, name)
            .header(UPLOAD_PROTOCOL_HEADER, "raw")
            .body(body.body)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status().as_u16();
        tracing::Span::current().record("http.status_code", status);

        let text = response.text().await.map_err(ApiError::Transport)?;
        match status {
            200 if text.is_empty() => Err(ApiError::InvalidResponse(
                "upload succeeded without a token".into(),
            )),
            200 => Ok(UploadToken::new(text)),
            _ => Err(ApiError::Status { status, body: text }),
        }
    }

    #[tracing::instrument(
        name = "photos.batch_create",
        skip(self, request),
        fields(
            items = request.new_media_items.len(),
            album_id = ?request.album_id,
            http.method = "POST",
            http.status_code = tracing::field::Empty
        ),
        err(level = "debug")
    )]
    async fn batch_create(
        &self,
        request: &BatchCreateRequest,
    ) -> Result<BatchCreateResponse, ApiError> {
        let response = self
            .http
            .post(self.url("mediaItems:batchCreate"))
            .json(request)
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }

    #[tracing::instrument(
        name = "photos.list_albums",
        skip(self),
        fields(http.method = "GET", http.status_code = tracing::field::Empty),
        err(level = "debug")
    )]
    async fn list_albums(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<AlbumPage, ApiError> {
        let mut query = vec![("pageSize", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .http
            .get(self.url("albums"))
            .query(&query)
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }

    #[tracing::instrument(
        name = "photos.create_album",
        skip(self),
        fields(http.method = "POST", http.status_code = tracing::field::Empty),
        err(level = "debug")
    )]
    async fn create_album(&self, title: &str) -> Result<Album, ApiError> {
        let request = CreateAlbumRequest {
            album: NewAlbum {
                title: title.to_string(),
            },
        };
        let response = self
            .http
            .post(self.url("albums"))
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }
}
