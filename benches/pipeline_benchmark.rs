//! Pipeline benchmarks
//!
//! Runs the upload pipeline against an in-process service that answers
//! instantly, so the numbers reflect scheduling and bookkeeping overhead.

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use photo_uploadr::item::{BytesItem, ItemBody, UploadItem};
use photo_uploadr::photos::{
    Album, AlbumPage, ApiError, BatchCreateRequest, BatchCreateResponse, MediaItem, NewMediaItemResult,
    PhotosApi, Status, UploadToken,
};
use photo_uploadr::upload::batch::partition;
use photo_uploadr::upload::{PipelineOptions, Uploader};
use std::sync::Arc;

struct InstantPhotos;

#[async_trait]
impl PhotosApi for InstantPhotos {
    async fn upload(&self, file_name: &str, _: ItemBody) -> Result<UploadToken, ApiError> {
        Ok(UploadToken::new(file_name))
    }

    async fn batch_create(
        &self,
        request: &BatchCreateRequest,
    ) -> Result<BatchCreateResponse, ApiError> {
        let new_media_item_results = request
            .new_media_items
            .iter()
            .map(|item| NewMediaItemResult {
                upload_token: item.upload_token().clone(),
                status: Status::ok(),
                media_item: Some(MediaItem {
                    id: item.upload_token().to_string(),
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
        Ok(AlbumPage::default())
    }

    async fn create_album(&self, title: &str) -> Result<Album, ApiError> {
        Ok(Album {
            id: "bench".to_string(),
            title: title.to_string(),
            product_url: None,
        })
    }
}

fn benchmark_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for count in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| black_box(partition(0..count, 50)));
        });
    }

    group.finish();
}

fn benchmark_add_to_library(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("add_to_library");

    for count in [10usize, 100, 1_000].iter() {
        let items: Vec<Box<dyn UploadItem>> = (0..*count)
            .map(|i| {
                Box::new(BytesItem::new(format!("{}.jpg", i), vec![0u8; 1024])) as Box<dyn UploadItem>
            })
            .collect();
        let uploader = Uploader::new(Arc::new(InstantPhotos), PipelineOptions::default());

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &items, |b, items| {
            b.to_async(&runtime)
                .iter(|| async { black_box(uploader.add_to_library(items).await) });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_partition, benchmark_add_to_library);
criterion_main!(benches);
