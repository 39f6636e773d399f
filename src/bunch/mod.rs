//! Named column bundles with whole-bundle selection.
//!
//! A [`Bunch`] holds a handful of columns pulled out of a batch under text names, so that a
//! selection (boolean mask, index list or range) can be applied to all of them at once.

pub mod vectors;

use std::ops::Range;

use indexmap::IndexMap;

use crate::error::{IterError, IterResult};
use crate::types::{Column, ColumnBatch, Key};

pub use vectors::{FourVector, Vectors};

/// Which records of a bunch to keep.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Keep positions where the mask is `true`; the mask must cover every record.
    Mask(Vec<bool>),
    /// Keep these positions, in this order (repeats allowed).
    Indices(Vec<usize>),
    /// Keep a contiguous range of positions.
    Range(Range<usize>),
}

/// A text-keyed collection of columns.
///
/// Names are normalized to text when the bunch is built, whatever key form the source batch
/// used. Columns are not required to share a length: after [`Bunch::flatten`] a per-record
/// column and a jagged one generally differ.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bunch {
    columns: IndexMap<String, Column>,
}

impl Bunch {
    /// A bunch with the given columns, all empty (jagged, no records).
    pub fn empty<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            columns: names
                .iter()
                .map(|n| (n.as_ref().to_string(), Column::Jagged(Vec::new())))
                .collect(),
        }
    }

    /// Take the named columns out of `batch`, keyed by the same names.
    pub fn from_columns<S: AsRef<str>>(batch: &ColumnBatch, names: &[S]) -> IterResult<Self> {
        let mut columns = IndexMap::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            columns.insert(name.to_string(), lookup(batch, name)?.clone());
        }
        Ok(Self { columns })
    }

    /// Take columns out of `batch` under new names: each pair is `(alias, source column)`.
    pub fn from_aliases<A, C>(batch: &ColumnBatch, aliases: &[(A, C)]) -> IterResult<Self>
    where
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let mut columns = IndexMap::with_capacity(aliases.len());
        for (alias, column) in aliases {
            columns.insert(
                alias.as_ref().to_string(),
                lookup(batch, column.as_ref())?.clone(),
            );
        }
        Ok(Self { columns })
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> IterResult<&Column> {
        self.columns.get(name).ok_or_else(|| IterError::ColumnNotFound {
            column: name.to_string(),
        })
    }

    /// Add or replace a column.
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) {
        self.columns.insert(name.into(), column);
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// `(name, column)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Length of the first column (zero when there are no columns).
    pub fn len(&self) -> usize {
        self.columns.values().next().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `selection` to every column.
    pub fn select(&self, selection: &Selection) -> IterResult<Self> {
        let mut columns = IndexMap::with_capacity(self.columns.len());
        for (name, column) in &self.columns {
            let selected = match selection {
                Selection::Mask(mask) => {
                    if mask.len() != column.len() {
                        return Err(IterError::ColumnLength {
                            column: name.clone(),
                            expected: mask.len(),
                            actual: column.len(),
                        });
                    }
                    let indices: Vec<usize> = mask
                        .iter()
                        .enumerate()
                        .filter_map(|(i, keep)| keep.then_some(i))
                        .collect();
                    column.take(&indices)?
                }
                Selection::Indices(indices) => column.take(indices)?,
                Selection::Range(range) => column.slice(range.clone())?,
            };
            columns.insert(name.clone(), selected);
        }
        Ok(Self { columns })
    }

    /// Append the records of `batch` to every column, looking columns up by this bunch's names.
    pub fn concatenate(&mut self, batch: &ColumnBatch) -> IterResult<()> {
        // Look everything up first so a failure leaves the bunch untouched.
        let mut additions = Vec::with_capacity(self.columns.len());
        for (name, column) in &self.columns {
            let addition = lookup(batch, name)?;
            if column.is_jagged() != addition.is_jagged() && !column.is_empty() {
                return Err(IterError::ColumnKind {
                    column: name.clone(),
                });
            }
            additions.push(addition);
        }
        for (column, addition) in self.columns.values_mut().zip(additions) {
            column.extend_from(addition);
        }
        Ok(())
    }

    /// Flatten every jagged column; flat columns are kept as they are.
    pub fn flatten(&self) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v.flatten()))
                .collect(),
        }
    }

    /// Regroup every column by per-record `counts`.
    pub fn unflatten(&self, counts: &[usize]) -> IterResult<Self> {
        let mut columns = IndexMap::with_capacity(self.columns.len());
        for (name, column) in &self.columns {
            let regrouped = column.unflatten(counts).map_err(|e| match e {
                IterError::ColumnLength {
                    expected, actual, ..
                } => IterError::ColumnLength {
                    column: name.clone(),
                    expected,
                    actual,
                },
                other => other,
            })?;
            columns.insert(name.clone(), regrouped);
        }
        Ok(Self { columns })
    }
}

/// Column of `batch` whose decoded name is `name`; text keys win over raw ones.
fn lookup<'a>(batch: &'a ColumnBatch, name: &str) -> IterResult<&'a Column> {
    if let Some(column) = batch.get(name) {
        return Ok(column);
    }
    batch
        .iter()
        .find(|(key, _)| matches!(key, Key::Raw(_)) && key.decoded() == name)
        .map(|(_, column)| column)
        .ok_or_else(|| IterError::ColumnNotFound {
            column: name.to_string(),
        })
}
