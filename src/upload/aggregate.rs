//! Per-item outcome bookkeeping
//!
//! Every input position owns one slot. A slot moves from pending to
//! uploaded to done exactly once; commit results are matched back to slots
//! through their upload token.

use super::batch::{Batch, BatchEntry};
use super::{AddError, CommitError, PhotosError, UploadError};
use crate::item::UploadItem;
use crate::photos::{BatchCreateResponse, MediaItem, NewMediaItem, UploadToken};
use std::collections::HashMap;
use std::sync::Arc;

/// Final outcome of one input item.
#[derive(Debug)]
pub struct AddResult {
    /// Description of the item (path or URL).
    pub item: String,
    pub outcome: Result<MediaItem, AddError>,
}

impl AddResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn media_item(&self) -> Option<&MediaItem> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&AddError> {
        self.outcome.as_ref().err()
    }

    /// "OK" on success, otherwise the error message.
    pub fn summary(&self) -> String {
        match &self.outcome {
            Ok(_) => "OK".to_string(),
            Err(e) => e.to_string(),
        }
    }
}

/// Fail with [`PhotosError::NothingAdded`] unless at least one item made it.
///
/// Returns the number of successfully added items.
pub fn ensure_any_added(results: &[AddResult]) -> Result<usize, PhotosError> {
    match results.iter().filter(|r| r.is_ok()).count() {
        0 => Err(PhotosError::NothingAdded {
            total: results.len(),
        }),
        added => Ok(added),
    }
}

#[derive(Debug)]
enum Slot {
    Pending,
    Uploaded(UploadToken),
    Done(Result<MediaItem, AddError>),
}

/// Collects upload and commit outcomes by input position.
#[derive(Debug)]
pub(crate) struct Aggregator {
    slots: Vec<Slot>,
}

impl Aggregator {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| Slot::Pending).collect(),
        }
    }

    pub fn record_upload(&mut self, index: usize, result: Result<UploadToken, UploadError>) {
        self.slots[index] = match result {
            Ok(token) => Slot::Uploaded(token),
            Err(e) => Slot::Done(Err(AddError::Upload(e))),
        };
    }

    /// Batch of the uploaded items among `indices`, in input order.
    pub fn batch(
        &self,
        number: usize,
        indices: &[usize],
        items: &[Box<dyn UploadItem>],
    ) -> Batch {
        let entries = indices
            .iter()
            .filter_map(|&index| match &self.slots[index] {
                Slot::Uploaded(token) => Some(BatchEntry {
                    index,
                    item: NewMediaItem::new(token.clone(), items[index].name()),
                }),
                _ => None,
            })
            .collect();
        Batch { number, entries }
    }

    pub fn record_commit(
        &mut self,
        batch: &Batch,
        result: Result<BatchCreateResponse, CommitError>,
        items: &[Box<dyn UploadItem>],
    ) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let e = Arc::new(e);
                for entry in &batch.entries {
                    self.finish_slot(entry.index, Err(AddError::Commit(Arc::clone(&e))));
                }
                return;
            }
        };

        let mut by_token = HashMap::with_capacity(response.new_media_item_results.len());
        for result in response.new_media_item_results {
            let token = result.upload_token.clone();
            if let Some(replaced) = by_token.insert(token, result) {
                tracing::warn!(
                    batch = batch.number,
                    upload_token = %replaced.upload_token,
                    "Response repeats an upload token; keeping the later result"
                );
            }
        }

        for entry in &batch.entries {
            let item = &items[entry.index];
            let outcome = match by_token.remove(entry.item.upload_token()) {
                None => Err(AddError::MissingResult),
                Some(result) if !result.status.is_ok() => {
                    tracing::warn!(
                        "Skipped {}: {} ({})",
                        item,
                        result.status.message,
                        result.status.code
                    );
                    Err(AddError::Rejected {
                        code: result.status.code,
                        message: result.status.message,
                    })
                }
                Some(result) => match result.media_item {
                    Some(media_item) => {
                        tracing::debug!(media_item = %media_item.id, "Added {}", item);
                        Ok(media_item)
                    }
                    None => Err(AddError::MissingResult),
                },
            };
            self.finish_slot(entry.index, outcome);
        }
    }

    fn finish_slot(&mut self, index: usize, outcome: Result<MediaItem, AddError>) {
        if let Slot::Uploaded(_) = self.slots[index] {
            self.slots[index] = Slot::Done(outcome);
        }
    }

    /// One result per input, in input order. Unfinished slots are cancelled.
    pub fn finish(self, items: &[Box<dyn UploadItem>]) -> Vec<AddResult> {
        self.slots
            .into_iter()
            .zip(items)
            .map(|(slot, item)| AddResult {
                item: item.to_string(),
                outcome: match slot {
                    Slot::Done(outcome) => outcome,
                    Slot::Pending | Slot::Uploaded(_) => Err(AddError::Cancelled),
                },
            })
            .collect()
    }
}
