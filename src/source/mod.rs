//! Column-batch sources: the storage collaborators the iterators are built on.
//!
//! A source file is opened by an [`Opener`] into a [`Container`]: a hierarchy of named entries,
//! some of which are tables. A [`Table`] reports its entry count and produces a lazy
//! [`BatchStream`] of [`ColumnBatch`]es according to a [`BatchPolicy`].
//!
//! Two backends are provided:
//!
//! - [`parquet`]: Parquet files and directories of Parquet files
//! - [`memory`]: in-memory containers, useful for tests and pre-loaded data
//!
//! [`paths`] turns a [`SourceRef`] (path, path list or wildcard) into a concrete path list.

pub mod memory;
pub mod parquet;
pub mod paths;

use serde::{Deserialize, Serialize};

use crate::error::{IterError, IterResult};
use crate::types::{ColumnBatch, Key};

pub use memory::{MemoryContainer, MemoryOpener, MemoryTable};
pub use parquet::{ParquetContainer, ParquetOpener, ParquetTable};
pub use paths::{RemoteLister, SourceRef};

/// Lazy, finite sequence of column batches read from one table.
pub type BatchStream = Box<dyn Iterator<Item = IterResult<ColumnBatch>>>;

/// Chunking and range hints handed to a [`Table`] when iterating it.
///
/// `entry_stop` is a hint: a backend stops reading at (or shortly after) that entry, but may
/// return a final chunk extending past it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
    /// First entry to read.
    pub entry_start: Option<usize>,
    /// Entry at which to stop reading (exclusive).
    pub entry_stop: Option<usize>,
    /// Maximum number of entries per batch. `None` keeps the backend's native chunking.
    pub entry_steps: Option<usize>,
    /// Columns to read, in order. `None` reads all columns.
    pub columns: Option<Vec<String>>,
}

impl BatchPolicy {
    /// Reject policies no table can honour: an empty column selection or zero-entry steps.
    pub fn validate(&self) -> IterResult<()> {
        if self.columns.as_ref().is_some_and(Vec::is_empty) {
            return Err(IterError::InvalidPolicy {
                message: "column selection is empty".to_string(),
            });
        }
        if self.entry_steps == Some(0) {
            return Err(IterError::InvalidPolicy {
                message: "entry_steps must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// A copy of this policy that stops after `budget` entries past `entry_start`.
    pub fn with_stop_after(&self, budget: usize) -> Self {
        let start = self.entry_start.unwrap_or(0);
        let stop = start.saturating_add(budget);
        Self {
            entry_stop: Some(self.entry_stop.map_or(stop, |s| s.min(stop))),
            ..self.clone()
        }
    }
}

/// A columnar table inside one file.
pub trait Table {
    /// Total number of entries, from metadata where possible.
    fn num_entries(&self) -> IterResult<usize>;

    /// Start reading the table.
    fn batches(&self, policy: &BatchPolicy) -> IterResult<BatchStream>;
}

/// One entry of a [`Container`].
pub enum Entry {
    /// A table (anything with an entry count).
    Table(Box<dyn Table>),
    /// A nested container.
    Directory(Box<dyn Container>),
    /// Anything else; ignored by table discovery.
    Other,
}

/// An opened file or a directory-like object inside one.
pub trait Container {
    /// Identity used in error messages and diagnostics.
    fn identity(&self) -> String;

    /// Entries in the container's own deterministic order.
    fn entries(&self) -> IterResult<Vec<(Key, Entry)>>;

    /// Resolve a `/`-separated table path.
    ///
    /// Entry names are compared after decoding and cycle stripping.
    fn table(&self, path: &str) -> IterResult<Box<dyn Table>> {
        let not_found = || IterError::TableNotFound {
            container: self.identity(),
            path: path.to_string(),
        };
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let entry = self
            .entries()?
            .into_iter()
            .find(|(key, _)| key.entry_name() == head)
            .map(|(_, entry)| entry)
            .ok_or_else(not_found)?;
        match (entry, rest) {
            (Entry::Table(table), None) => Ok(table),
            (Entry::Directory(dir), Some(rest)) => dir.table(rest).map_err(|e| match e {
                IterError::TableNotFound { .. } => not_found(),
                other => other,
            }),
            _ => Err(not_found()),
        }
    }
}

/// Opens source files into containers.
pub trait Opener: Send + Sync {
    /// Open `path`.
    fn open(&self, path: &str) -> IterResult<Box<dyn Container>>;
}
