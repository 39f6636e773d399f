//! Row-at-a-time view over a batch stream.

use std::iter::FusedIterator;

use crate::error::IterResult;
use crate::types::{ColumnBatch, Record};

/// Flattens a stream of batches into records: batch order, then position order.
///
/// Budgets and termination are those of the wrapped stream.
pub struct RecordIter<I> {
    batches: I,
    current: Option<ColumnBatch>,
    position: usize,
}

impl<I> RecordIter<I>
where
    I: Iterator<Item = IterResult<ColumnBatch>>,
{
    pub fn new(batches: I) -> Self {
        Self {
            batches,
            current: None,
            position: 0,
        }
    }

    /// The wrapped batch stream.
    pub fn batches(&self) -> &I {
        &self.batches
    }
}

impl<I> Iterator for RecordIter<I>
where
    I: Iterator<Item = IterResult<ColumnBatch>>,
{
    type Item = IterResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = &self.current {
                if let Some(record) = batch.record(self.position) {
                    self.position += 1;
                    return Some(Ok(record));
                }
                self.current = None;
            }
            match self.batches.next()? {
                Ok(batch) => {
                    self.current = Some(batch);
                    self.position = 0;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<I> FusedIterator for RecordIter<I> where I: FusedIterator<Item = IterResult<ColumnBatch>> {}
