//! Wire types of the photo-library REST API

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token for bytes staged by an upload but not yet in the library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadToken(String);

impl UploadToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where new items land inside the album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionType {
    #[serde(rename = "FIRST_IN_ALBUM")]
    FirstInAlbum,
    #[serde(rename = "LAST_IN_ALBUM")]
    LastInAlbum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumPosition {
    pub position: PositionType,
}

impl AlbumPosition {
    pub fn last_in_album() -> Self {
        Self {
            position: PositionType::LastInAlbum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMediaItem {
    pub upload_token: UploadToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItem {
    #[serde(default)]
    pub description: String,
    pub simple_media_item: SimpleMediaItem,
}

impl NewMediaItem {
    pub fn new(token: UploadToken, name: &str) -> Self {
        Self {
            description: name.to_string(),
            simple_media_item: SimpleMediaItem {
                upload_token: token,
                file_name: Some(name.to_string()),
            },
        }
    }

    pub fn upload_token(&self) -> &UploadToken {
        &self.simple_media_item.upload_token
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    pub new_media_items: Vec<NewMediaItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_position: Option<AlbumPosition>,
}

/// Result status of one entry. A missing code means success.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: "OK".into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Server-assigned library entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItemResult {
    pub upload_token: UploadToken,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_item: Option<MediaItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResponse {
    #[serde(default)]
    pub new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumPage {
    #[serde(default)]
    pub albums: Vec<Album>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CreateAlbumRequest {
    pub album: NewAlbum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NewAlbum {
    pub title: String,
}
