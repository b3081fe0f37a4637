//! Batch accumulation
//!
//! [`BatchBuffer`] collects items and hands back a full batch as soon as the
//! size bound is reached; [`BatchBuffer::flush`] hands back whatever is left.
//! The pipeline partitions its input with it before any upload starts, so
//! batch membership depends only on input order.

use crate::photos::NewMediaItem;
use std::mem;

/// Size-bounded accumulator.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    size: usize,
    buffer: Vec<T>,
}

impl<T> BatchBuffer<T> {
    /// A buffer releasing batches of `size` items (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            buffer: Vec::with_capacity(size),
        }
    }

    /// Append an item. Returns the full batch when this item fills it,
    /// leaving the buffer empty.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.buffer.push(item);
        if self.buffer.len() >= self.size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Release the remaining items, if any.
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn take(&mut self) -> Vec<T> {
        mem::replace(&mut self.buffer, Vec::with_capacity(self.size))
    }
}

/// Split `items` into consecutive groups of `size`; only the last group may
/// be shorter.
pub fn partition<T>(items: impl IntoIterator<Item = T>, size: usize) -> Vec<Vec<T>> {
    let mut buffer = BatchBuffer::new(size);
    let mut groups: Vec<Vec<T>> = items
        .into_iter()
        .filter_map(|item| buffer.push(item))
        .collect();
    groups.extend(buffer.flush());
    groups
}

/// One uploaded item waiting to be committed.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Position of the item in the caller's input.
    pub index: usize,
    pub item: NewMediaItem,
}

/// Uploaded items of one input group, committed with a single call.
#[derive(Debug, Clone)]
pub struct Batch {
    pub number: usize,
    pub entries: Vec<BatchEntry>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
