//! Budgeted streaming iteration entrypoints.
//!
//! - [`iterate`]: batches from one or many files, capped at `n_max` records in total
//! - [`iterate_weighted`]: batches from several source groups, each capped at its weighted
//!   share of a total
//! - [`iterate_records`]: the same streams, one record at a time
//! - [`locate_table`]: find the first table inside a container
//! - [`count_entries`] / [`nth_record`]: small conveniences on top
//!
//! Every iterator is lazy: each call to `next` reads at most one batch, and dropping the
//! iterator closes whatever file it had open.
//!
//! ## Example: budgeted iteration
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use columnar_events::iteration::{iterate, IterOptions};
//! use columnar_events::source::{MemoryContainer, MemoryOpener, MemoryTable};
//!
//! # fn main() -> Result<(), columnar_events::IterError> {
//! let opener = MemoryOpener::new()
//!     .with_file("a", MemoryContainer::new("a").with_table("Events", MemoryTable::with_chunk_sizes("id", 0, &[4, 4, 4])))
//!     .with_file("b", MemoryContainer::new("b").with_table("Events", MemoryTable::with_chunk_sizes("id", 12, &[4])));
//!
//! let opts = IterOptions {
//!     n_max: Some(6),
//!     ..IterOptions::with_opener(Arc::new(opener))
//! };
//!
//! let mut seen = 0;
//! for batch in iterate(vec!["a", "b"], &opts)? {
//!     seen += batch?.num_entries();
//! }
//! // Batches are never split: 4 + 4 records for a budget of 6.
//! assert_eq!(seen, 8);
//! # Ok(())
//! # }
//! ```

pub mod budget;
pub mod locate;
pub mod observability;
pub mod options;
pub mod records;
pub mod weighted;

use crate::error::IterResult;
use crate::source::SourceRef;
use crate::types::Record;

pub use budget::BatchIter;
pub use locate::{locate_table, locate_table_at};
pub use observability::{
    CompositeObserver, Diagnostics, EventLevel, FileObserver, IterationEvent, IterationObserver, StdErrObserver,
    TracingObserver, Verbosity,
};
pub use options::{IterConfig, IterOptions};
pub use records::RecordIter;
pub use weighted::{sub_budgets, WeightedIter};

/// Stream column batches from `sources`, honouring `options.n_max`.
///
/// The source reference is normalized first (wildcards expanded); files are then opened one at
/// a time as the iterator is driven.
pub fn iterate(sources: impl Into<SourceRef>, options: &IterOptions) -> IterResult<BatchIter> {
    let paths = sources.into().resolve(options.lister.as_ref())?;
    Ok(BatchIter::new(paths, options))
}

/// Stream column batches from several source groups, splitting `total_n` records across them
/// in proportion to `weights`.
///
/// `options.n_max` is ignored; each group gets its own sub-budget (see [`sub_budgets`]).
pub fn iterate_weighted<S>(
    total_n: usize,
    weights: &[f64],
    groups: impl IntoIterator<Item = S>,
    options: &IterOptions,
) -> IterResult<WeightedIter>
where
    S: Into<SourceRef>,
{
    let groups: Vec<SourceRef> = groups.into_iter().map(Into::into).collect();
    WeightedIter::new(total_n, weights, groups, options)
}

/// Stream individual records from `sources`.
pub fn iterate_records(
    sources: impl Into<SourceRef>,
    options: &IterOptions,
) -> IterResult<RecordIter<BatchIter>> {
    Ok(RecordIter::new(iterate(sources, options)?))
}

/// Number of entries in the table at `table_path` of the file at `path` (the first table if
/// `None`), read from metadata.
pub fn count_entries(path: &str, table_path: Option<&str>, options: &IterOptions) -> IterResult<usize> {
    let container = options.opener.open(path)?;
    let table = match table_path {
        Some(table_path) => container.table(table_path)?,
        None => locate_table(container.as_ref(), &options.diagnostics)?.1,
    };
    table.num_entries()
}

/// The record at position `index` of the stream over `sources`, or `None` if the stream is
/// shorter. Reads every batch up to the one holding that record.
pub fn nth_record(
    sources: impl Into<SourceRef>,
    index: usize,
    options: &IterOptions,
) -> IterResult<Option<Record>> {
    let mut skipped = 0usize;
    for batch in iterate(sources, options)? {
        let batch = batch?;
        let n = batch.num_entries();
        if index < skipped + n {
            return Ok(batch.record(index - skipped));
        }
        skipped += n;
    }
    Ok(None)
}
