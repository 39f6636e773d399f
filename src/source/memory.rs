//! In-memory containers and tables.
//!
//! Useful for tests and for callers that already hold decoded batches. Containers can use text
//! or raw keys (including `;<cycle>` suffixes) to mirror byte-keyed file formats.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;

use crate::error::{IterError, IterResult};
use crate::types::{Column, ColumnBatch, Key, Value};

use super::{BatchPolicy, BatchStream, Container, Entry, Opener, Table};

/// Opens in-memory "files" by path.
///
/// Counts successful opens so callers can check how much of a source set was touched.
#[derive(Default)]
pub struct MemoryOpener {
    files: IndexMap<String, MemoryContainer>,
    opens: AtomicUsize,
}

impl MemoryOpener {
    /// An opener with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `container` under `path`.
    pub fn with_file(mut self, path: impl Into<String>, container: MemoryContainer) -> Self {
        self.files.insert(path.into(), container);
        self
    }

    /// Number of successful [`Opener::open`] calls so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Opener for MemoryOpener {
    fn open(&self, path: &str) -> IterResult<Box<dyn Container>> {
        let container = self.files.get(path).ok_or_else(|| {
            IterError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {path}"),
            ))
        })?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(container.clone()))
    }
}

#[derive(Clone)]
enum MemoryEntry {
    Table(MemoryTable),
    Directory(MemoryContainer),
    Other,
}

/// A named hierarchy of in-memory tables.
#[derive(Clone)]
pub struct MemoryContainer {
    name: String,
    entries: Vec<(Key, MemoryEntry)>,
}

impl MemoryContainer {
    /// An empty container.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add a table entry.
    pub fn with_table(mut self, key: impl Into<Key>, table: MemoryTable) -> Self {
        self.entries.push((key.into(), MemoryEntry::Table(table)));
        self
    }

    /// Add a nested container.
    pub fn with_dir(mut self, key: impl Into<Key>, dir: MemoryContainer) -> Self {
        self.entries.push((key.into(), MemoryEntry::Directory(dir)));
        self
    }

    /// Add an entry that is neither a table nor a container.
    pub fn with_other(mut self, key: impl Into<Key>) -> Self {
        self.entries.push((key.into(), MemoryEntry::Other));
        self
    }
}

impl Container for MemoryContainer {
    fn identity(&self) -> String {
        self.name.clone()
    }

    fn entries(&self) -> IterResult<Vec<(Key, Entry)>> {
        Ok(self
            .entries
            .iter()
            .map(|(key, entry)| {
                let entry = match entry {
                    MemoryEntry::Table(t) => Entry::Table(Box::new(t.clone())),
                    MemoryEntry::Directory(d) => Entry::Directory(Box::new(d.clone())),
                    MemoryEntry::Other => Entry::Other,
                };
                (key.clone(), entry)
            })
            .collect())
    }
}

/// A table made of fixed, pre-chunked batches.
///
/// Batches are replayed as stored: `entry_start` trims the batch it falls in, while
/// `entry_stop` only prevents later batches from starting, so the final batch may extend past
/// it. `entry_steps` is ignored.
#[derive(Clone)]
pub struct MemoryTable {
    batches: Arc<Vec<ColumnBatch>>,
}

impl MemoryTable {
    /// A table from stored batches.
    pub fn new(batches: Vec<ColumnBatch>) -> Self {
        Self {
            batches: Arc::new(batches),
        }
    }

    /// A table with one Int64 column `column` counting up from `first_id`, chunked by `sizes`.
    pub fn with_chunk_sizes(column: &str, first_id: i64, sizes: &[usize]) -> Self {
        let mut next = first_id;
        let batches = sizes
            .iter()
            .map(|&n| {
                let values = (next..next + n as i64).map(Value::Int64).collect();
                next += n as i64;
                ColumnBatch::from_column(column, Column::Flat(values))
            })
            .collect();
        Self::new(batches)
    }
}

impl Table for MemoryTable {
    fn num_entries(&self) -> IterResult<usize> {
        Ok(self.batches.iter().map(ColumnBatch::num_entries).sum())
    }

    fn batches(&self, policy: &BatchPolicy) -> IterResult<BatchStream> {
        policy.validate()?;
        Ok(Box::new(MemoryStream {
            batches: Arc::clone(&self.batches),
            next: 0,
            offset: 0,
            start: policy.entry_start.unwrap_or(0),
            stop: policy.entry_stop,
            columns: policy.columns.clone(),
        }))
    }
}

struct MemoryStream {
    batches: Arc<Vec<ColumnBatch>>,
    next: usize,
    offset: usize,
    start: usize,
    stop: Option<usize>,
    columns: Option<Vec<String>>,
}

impl MemoryStream {
    fn shape(&self, batch: &ColumnBatch, begin: usize) -> IterResult<ColumnBatch> {
        let batch = if self.start > begin {
            batch.slice(self.start - begin..batch.num_entries())?
        } else {
            batch.clone()
        };
        match &self.columns {
            Some(names) => batch.project(names),
            None => Ok(batch),
        }
    }
}

impl Iterator for MemoryStream {
    type Item = IterResult<ColumnBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let batch = self.batches.get(self.next)?;
            let begin = self.offset;
            let n = batch.num_entries();
            self.next += 1;
            self.offset += n;

            if self.stop.is_some_and(|stop| begin >= stop) {
                self.next = self.batches.len();
                return None;
            }
            if begin + n <= self.start {
                continue;
            }
            return Some(self.shape(batch, begin));
        }
    }
}
