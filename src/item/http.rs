use super::{ItemBody, ItemError, UploadItem};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Url;
use std::fmt;

/// Remote resource fetched with an HTTP GET.
///
/// The response body is read into memory on each open, which gives the upload
/// an exact content length even when the origin streams without one.
#[derive(Debug, Clone)]
pub struct HttpItem {
    client: reqwest::Client,
    url: Url,
    name: String,
    headers: HeaderMap,
    basic_auth: Option<(String, String)>,
}

impl HttpItem {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .or_else(|| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "download".to_string());

        Self {
            client,
            url,
            name,
            headers: HeaderMap::new(),
            basic_auth: None,
        }
    }

    /// Extra headers sent with the GET.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn fetch_error(&self, source: reqwest::Error) -> ItemError {
        ItemError::Fetch {
            url: self.url.to_string(),
            source,
        }
    }
}

impl fmt::Display for HttpItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[async_trait]
impl UploadItem for HttpItem {
    #[tracing::instrument(
        name = "item.fetch",
        skip(self),
        fields(url = %self.url),
        err(level = "debug")
    )]
    async fn open(&self) -> Result<ItemBody, ItemError> {
        let mut request = self.client.get(self.url.clone()).headers(self.headers.clone());
        if let Some((username, password)) = &self.basic_auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await.map_err(|e| self.fetch_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ItemError::Status {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.fetch_error(e))?;
        tracing::debug!(status = status.as_u16(), bytes = bytes.len(), "Fetched remote item");
        Ok(ItemBody::from_bytes(bytes))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
