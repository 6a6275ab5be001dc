//! Fixed-size batching for the enrichment stage.
//!
//! [`step`] is the whole algorithm: given the current buffer and the next
//! item, it returns the next buffer and, when the buffer filled up, the batch
//! to emit. [`Batcher`] wraps it for use inside a pull loop.

use std::mem;

/// Push `item` into `buffer`; emit the buffer as a batch once it holds
/// `size` items. A `size` of zero behaves like one.
pub fn step<T>(mut buffer: Vec<T>, item: T, size: usize) -> (Vec<T>, Option<Vec<T>>) {
    let size = size.max(1);
    buffer.push(item);
    if buffer.len() >= size {
        (Vec::with_capacity(size), Some(buffer))
    } else {
        (buffer, None)
    }
}

#[derive(Debug)]
pub struct Batcher<T> {
    buffer: Vec<T>,
    size: usize,
}

impl<T> Batcher<T> {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            buffer: Vec::with_capacity(size),
            size,
        }
    }

    /// Add an item; returns a full batch when one is ready.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        let (next, batch) = step(mem::take(&mut self.buffer), item, self.size);
        self.buffer = next;
        batch
    }

    /// The trailing partial batch, if any.
    pub fn finish(self) -> Option<Vec<T>> {
        (!self.buffer.is_empty()).then_some(self.buffer)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
