//! Album lookup
//!
//! Albums are listed page by page through a lazy stream. Consumers stop
//! fetching simply by not polling the stream any further.

use super::{Album, ApiError, PhotosApi};
use crate::retry::{RetryError, RetryPolicy};
use futures::{Stream, TryStreamExt};

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazily list every album, one page of at most `page_size` per item.
///
/// Each page fetch is retried under `retry`.
pub fn album_pages<'a>(
    api: &'a dyn PhotosApi,
    retry: &'a RetryPolicy,
    page_size: u32,
) -> impl Stream<Item = Result<Vec<Album>, RetryError<ApiError>>> + Send + 'a {
    futures::stream::try_unfold(Cursor::Start, move |cursor| async move {
        let page_token = match cursor {
            Cursor::Done => return Ok::<_, RetryError<ApiError>>(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = retry
            .run("list_albums", |_| {
                api.list_albums(page_size, page_token.as_deref())
            })
            .await?;

        let next = match page.next_page_token {
            Some(token) if !token.is_empty() => Cursor::Next(token),
            _ => Cursor::Done,
        };
        Ok::<_, RetryError<ApiError>>(Some((page.albums, next)))
    })
}

/// First album whose title equals `title` exactly (case-sensitive).
///
/// Stops listing at the page holding the match.
pub async fn find_album_by_title(
    api: &dyn PhotosApi,
    retry: &RetryPolicy,
    page_size: u32,
    title: &str,
) -> Result<Option<Album>, RetryError<ApiError>> {
    let pages = album_pages(api, retry, page_size);
    futures::pin_mut!(pages);

    while let Some(albums) = pages.try_next().await? {
        if let Some(album) = albums.into_iter().find(|album| album.title == title) {
            return Ok(Some(album));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemBody;
    use crate::photos::{AlbumPage, BatchCreateRequest, BatchCreateResponse, UploadToken};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves a fixed list of pages and records requested page tokens.
    struct PagedAlbums {
        pages: Vec<Vec<&'static str>>,
        requests: Mutex<Vec<Option<String>>>,
    }

    impl PagedAlbums {
        fn new(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Option<String>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PhotosApi for PagedAlbums {
        async fn upload(&self, _: &str, _: ItemBody) -> Result<UploadToken, ApiError> {
            unimplemented!()
        }

        async fn batch_create(
            &self,
            _: &BatchCreateRequest,
        ) -> Result<BatchCreateResponse, ApiError> {
            unimplemented!()
        }

        async fn list_albums(
            &self,
            _page_size: u32,
            page_token: Option<&str>,
        ) -> Result<AlbumPage, ApiError> {
            self.requests
                .lock()
                .unwrap()
                .push(page_token.map(str::to_string));
            let index: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let albums = self.pages[index]
                .iter()
                .map(|title| Album {
                    id: format!("id-{}", title),
                    title: title.to_string(),
                    product_url: None,
                })
                .collect();
            let next_page_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(AlbumPage {
                albums,
                next_page_token,
            })
        }

        async fn create_album(&self, _: &str) -> Result<Album, ApiError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_find_stops_at_matching_page() {
        let api = PagedAlbums::new(vec![vec!["a", "b"], vec!["target", "c"], vec!["d"]]);
        let album = find_album_by_title(&api, &RetryPolicy::no_retry(), 50, "target")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(album.id, "id-target");
        assert_eq!(api.requests(), vec![None, Some("1".to_string())]);
    }

    #[tokio::test]
    async fn test_find_walks_every_page_when_missing() {
        let api = PagedAlbums::new(vec![vec!["a"], vec!["b"], vec!["c"]]);
        let album = find_album_by_title(&api, &RetryPolicy::no_retry(), 50, "missing")
            .await
            .unwrap();

        assert!(album.is_none());
        assert_eq!(api.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_find_is_case_sensitive_and_first_match_wins() {
        let api = PagedAlbums::new(vec![vec!["Trip", "trip"], vec!["trip"]]);
        let album = find_album_by_title(&api, &RetryPolicy::no_retry(), 50, "trip")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(album.title, "trip");
        assert_eq!(api.requests().len(), 1);
    }
}
