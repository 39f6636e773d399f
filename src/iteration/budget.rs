//! The budgeted batch iterator.

use std::iter::FusedIterator;
use std::sync::Arc;

use crate::error::IterResult;
use crate::source::{BatchPolicy, BatchStream, Opener};
use crate::types::ColumnBatch;

use super::locate::locate_table;
use super::observability::{Diagnostics, IterationEvent};
use super::options::IterOptions;

/// Streams column batches from a list of source files, stopping once a record budget is spent.
///
/// - Files are read in order. Without a configured table path, the first table of the first
///   file is located once and the same path is used for every later file.
/// - With a budget, each forwarded batch's record count is subtracted from the remainder; when
///   it reaches zero the iterator ends, even mid-file. Batches are never split, so the total
///   may exceed the budget by less than one batch.
/// - The first error ends the iteration: it is returned once, then `None` follows.
///
/// All state (remaining budget, source position, resolved table path) lives in this value and
/// can be inspected between calls to `next`.
pub struct BatchIter {
    sources: Vec<String>,
    next_source: usize,
    current_path: Option<String>,
    stream: Option<BatchStream>,
    remaining: Option<usize>,
    table_path: Option<String>,
    decode: bool,
    policy: BatchPolicy,
    opener: Arc<dyn Opener>,
    diagnostics: Diagnostics,
    finished: bool,
}

impl BatchIter {
    /// Iterate `sources` with the budget `options.n_max`.
    pub fn new(sources: Vec<String>, options: &IterOptions) -> Self {
        Self::with_budget(sources, options.n_max, options)
    }

    /// Iterate `sources` with an explicit budget, ignoring `options.n_max`.
    pub fn with_budget(sources: Vec<String>, budget: Option<usize>, options: &IterOptions) -> Self {
        Self {
            sources,
            next_source: 0,
            current_path: None,
            stream: None,
            remaining: budget,
            table_path: options.table_path.clone(),
            decode: options.decode,
            policy: options.policy.clone(),
            opener: Arc::clone(&options.opener),
            diagnostics: options.diagnostics.clone(),
            finished: budget == Some(0),
        }
    }

    /// Records still to be produced, or `None` when unbounded.
    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    /// The table path in use: configured, or located in the first file once it is opened.
    pub fn table_path(&self) -> Option<&str> {
        self.table_path.as_deref()
    }

    /// The file currently being read.
    pub fn current_source(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    /// All source files of this iteration.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Number of files opened so far.
    pub fn sources_opened(&self) -> usize {
        self.next_source
    }

    /// Returns `true` once the iterator will yield nothing more.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn open_next(&mut self) -> IterResult<bool> {
        let Some(path) = self.sources.get(self.next_source).cloned() else {
            return Ok(false);
        };
        self.next_source += 1;
        self.current_path = Some(path.clone());

        let container = self.opener.open(&path)?;
        self.diagnostics.emit(IterationEvent::SourceOpened { path });

        let table = match &self.table_path {
            Some(table_path) => container.table(table_path)?,
            None => {
                let (found, table) = locate_table(container.as_ref(), &self.diagnostics)?;
                self.table_path = Some(found);
                table
            }
        };

        let policy = match self.remaining {
            Some(budget) => self.policy.with_stop_after(budget),
            None => self.policy.clone(),
        };
        self.stream = Some(table.batches(&policy)?);
        Ok(true)
    }

    fn advance(&mut self) -> IterResult<Option<ColumnBatch>> {
        loop {
            if self.stream.is_none() && !self.open_next()? {
                return Ok(None);
            }
            let next = match self.stream.as_mut() {
                Some(stream) => stream.next(),
                None => continue,
            };
            let Some(batch) = next else {
                self.stream = None;
                continue;
            };
            let batch = batch?;
            let batch = if self.decode { batch.decode_keys()? } else { batch };
            let rows = batch.num_entries();
            let path = self.current_path.clone().unwrap_or_default();

            if let Some(remaining) = self.remaining.as_mut() {
                *remaining = remaining.saturating_sub(rows);
                if *remaining == 0 {
                    self.finished = true;
                    self.stream = None;
                    self.diagnostics.emit(IterationEvent::BatchForwarded {
                        path: path.clone(),
                        rows,
                        remaining: Some(0),
                    });
                    self.diagnostics.emit(IterationEvent::BudgetExhausted { path });
                    return Ok(Some(batch));
                }
            }
            self.diagnostics.emit(IterationEvent::BatchForwarded {
                path,
                rows,
                remaining: self.remaining,
            });
            return Ok(Some(batch));
        }
    }
}

impl Iterator for BatchIter {
    type Item = IterResult<ColumnBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.diagnostics.emit(IterationEvent::SourceFailed {
                    path: self.current_path.clone().unwrap_or_default(),
                    error: e.to_string(),
                });
                self.finished = true;
                self.stream = None;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for BatchIter {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::IterError;
    use crate::source::{MemoryContainer, MemoryOpener, MemoryTable};
    use crate::types::{Column, Key, Value};

    fn file(name: &str, first_id: i64, sizes: &[usize]) -> MemoryContainer {
        MemoryContainer::new(name).with_table(
            Key::raw(b"Events;1".to_vec()),
            MemoryTable::with_chunk_sizes("id", first_id, sizes),
        )
    }

    fn opener() -> Arc<MemoryOpener> {
        Arc::new(
            MemoryOpener::new()
                .with_file("a", file("a", 0, &[4, 4, 4]))
                .with_file("b", file("b", 100, &[5, 5]))
                .with_file("c", file("c", 200, &[3])),
        )
    }

    fn options(opener: &Arc<MemoryOpener>, n_max: Option<usize>) -> IterOptions {
        IterOptions {
            n_max,
            diagnostics: Diagnostics::silent(),
            ..IterOptions::with_opener(opener.clone())
        }
    }

    fn paths(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sizes(iter: BatchIter) -> Vec<usize> {
        iter.map(|b| b.unwrap().num_entries()).collect()
    }

    #[test]
    fn unbounded_reads_every_batch_of_every_file() {
        let opener = opener();
        let iter = BatchIter::new(paths(&["a", "b", "c"]), &options(&opener, None));
        assert_eq!(sizes(iter), vec![4, 4, 4, 5, 5, 3]);
        assert_eq!(opener.open_count(), 3);
    }

    #[test]
    fn budget_stops_mid_file_without_opening_more_sources() {
        let opener = opener();
        let mut iter = BatchIter::new(paths(&["a", "b", "c"]), &options(&opener, Some(6)));

        assert_eq!(iter.next().unwrap().unwrap().num_entries(), 4);
        assert_eq!(iter.remaining(), Some(2));
        assert_eq!(iter.current_source(), Some("a"));

        // Overshoot: the whole batch is forwarded, never truncated.
        assert_eq!(iter.next().unwrap().unwrap().num_entries(), 4);
        assert_eq!(iter.remaining(), Some(0));
        assert!(iter.is_finished());
        assert!(iter.next().is_none());
        assert_eq!(opener.open_count(), 1);
    }

    #[test]
    fn budget_spans_file_boundaries() {
        let opener = opener();
        let iter = BatchIter::new(paths(&["a", "b", "c"]), &options(&opener, Some(14)));
        let total: usize = sizes(iter).iter().sum();
        assert!(total >= 14);
        assert!(total < 14 + 5);
        assert_eq!(opener.open_count(), 2);
    }

    #[test]
    fn exact_budget_ends_before_next_file() {
        let opener = opener();
        let iter = BatchIter::new(paths(&["a", "b"]), &options(&opener, Some(12)));
        assert_eq!(sizes(iter), vec![4, 4, 4]);
        assert_eq!(opener.open_count(), 1);
    }

    #[test]
    fn zero_budget_reads_nothing() {
        let opener = opener();
        let iter = BatchIter::new(paths(&["a"]), &options(&opener, Some(0)));
        assert!(sizes(iter).is_empty());
        assert_eq!(opener.open_count(), 0);
    }

    #[test]
    fn table_path_is_located_once_and_reused() {
        let opener = opener();
        let mut iter = BatchIter::new(paths(&["a", "b"]), &options(&opener, None));
        assert_eq!(iter.table_path(), None);
        iter.next().unwrap().unwrap();
        assert_eq!(iter.table_path(), Some("Events"));
        assert_eq!(iter.count(), 4);
    }

    #[test]
    fn file_lacking_reused_path_fails_and_fuses() {
        let opener = Arc::new(
            MemoryOpener::new()
                .with_file("a", file("a", 0, &[2]))
                .with_file(
                    "odd",
                    MemoryContainer::new("odd")
                        .with_table("Other", MemoryTable::with_chunk_sizes("id", 0, &[2])),
                ),
        );
        let mut iter = BatchIter::new(paths(&["a", "odd"]), &options(&opener, None));
        assert!(iter.next().unwrap().is_ok());
        let err = iter.next().unwrap().unwrap_err();
        assert!(matches!(err, IterError::TableNotFound { ref path, .. } if path == "Events"));
        assert!(iter.next().is_none());
    }

    #[test]
    fn missing_file_error_passes_through() {
        let opener = opener();
        let mut iter = BatchIter::new(paths(&["nope"]), &options(&opener, None));
        assert!(matches!(iter.next(), Some(Err(IterError::Io(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn decode_turns_raw_keys_into_text() {
        let raw = MemoryTable::new(vec![
            ColumnBatch::try_new([(
                Key::raw(b"pt".to_vec()),
                Column::Flat(vec![Value::Float64(1.5)]),
            )])
            .unwrap(),
        ]);
        let opener = Arc::new(
            MemoryOpener::new().with_file("r", MemoryContainer::new("r").with_table("t", raw)),
        );

        let plain = BatchIter::new(paths(&["r"]), &options(&opener, None))
            .next()
            .unwrap()
            .unwrap();
        assert!(!plain.has_text_keys());

        let decoded = BatchIter::new(
            paths(&["r"]),
            &IterOptions {
                decode: true,
                ..options(&opener, None)
            },
        )
        .next()
        .unwrap()
        .unwrap();
        assert!(decoded.has_text_keys());
        assert!(decoded.get("pt").is_some());
        assert!(decoded.get_raw(b"pt").is_none());
    }

    #[test]
    fn decode_collision_fails_instead_of_dropping_a_column() {
        let twins = MemoryTable::new(vec![
            ColumnBatch::try_new([
                (Key::raw(b"pt".to_vec()), Column::Flat(vec![Value::Int64(1)])),
                (Key::text("pt"), Column::Flat(vec![Value::Int64(2)])),
            ])
            .unwrap(),
        ]);
        let opener = Arc::new(
            MemoryOpener::new().with_file("t", MemoryContainer::new("t").with_table("t", twins)),
        );
        let mut iter = BatchIter::new(
            paths(&["t"]),
            &IterOptions {
                decode: true,
                ..options(&opener, None)
            },
        );
        assert!(matches!(
            iter.next(),
            Some(Err(IterError::DuplicateColumn { .. }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn empty_column_selection_never_yields_zero_width_batches() {
        let opener = opener();
        let opts = IterOptions {
            policy: BatchPolicy {
                columns: Some(Vec::new()),
                ..Default::default()
            },
            ..options(&opener, Some(4))
        };
        let mut iter = BatchIter::new(paths(&["a", "b"]), &opts);
        assert!(matches!(
            iter.next(),
            Some(Err(IterError::InvalidPolicy { .. }))
        ));
        assert!(iter.next().is_none());
    }
}
