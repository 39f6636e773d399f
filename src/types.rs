//! Core data model: keys, values, columns, column batches and records.
//!
//! A [`ColumnBatch`] is one chunk of rows for all columns of a table. Every column in a batch
//! has the same top-level length, which is the batch's record count (see [`record_count`]).
//! A [`Record`] is the row-at-a-time view obtained by indexing every column at one position.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use indexmap::IndexMap;

use crate::error::{IterError, IterResult};

/// A column or entry name as reported by a source: text, or raw bytes.
///
/// Sources that store names as byte strings report [`Key::Raw`]. Lookups by `&str` only match
/// [`Key::Text`] keys; call [`ColumnBatch::decode_keys`] (or set `decode` on the iteration
/// options) to convert once, up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// UTF-8 name.
    Text(String),
    /// Undecoded byte name.
    Raw(Vec<u8>),
}

impl Key {
    /// Create a text key.
    pub fn text(name: impl Into<String>) -> Self {
        Self::Text(name.into())
    }

    /// Create a raw (byte) key.
    pub fn raw(name: impl Into<Vec<u8>>) -> Self {
        Self::Raw(name.into())
    }

    /// Returns `true` for [`Key::Text`].
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns the name if this is a text key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Raw(_) => None,
        }
    }

    /// The name as text. Raw keys are decoded as UTF-8, replacing invalid sequences.
    pub fn decoded(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Raw(b) => String::from_utf8_lossy(b),
        }
    }

    /// Convert into a text key.
    pub fn into_text(self) -> Self {
        match self {
            Self::Text(_) => self,
            Self::Raw(b) => Self::Text(match String::from_utf8(b) {
                Ok(s) => s,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            }),
        }
    }

    /// Decoded name with a trailing `;<cycle>` version suffix removed.
    ///
    /// Container entries may carry a numeric cycle (`Events;1`); two cycles of the same
    /// object share one logical name.
    pub fn entry_name(&self) -> String {
        strip_cycle(&self.decoded()).to_string()
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&[u8]> for Key {
    fn from(b: &[u8]) -> Self {
        Self::Raw(b.to_vec())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Raw(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
        }
    }
}

/// Remove a trailing `;<digits>` suffix, if present.
pub fn strip_cycle(name: &str) -> &str {
    match name.rsplit_once(';') {
        Some((base, cycle)) if !cycle.is_empty() && cycle.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => name,
    }
}

/// A single value of a column at one position.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Variable-length sub-sequence (one entry of a jagged column).
    List(Vec<Value>),
}

impl Value {
    /// Numeric view of the value; integers and booleans are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Returns the elements if this is a [`Value::List`].
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

/// One column of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// One value per record.
    Flat(Vec<Value>),
    /// A variable-length sequence of values per record.
    Jagged(Vec<Vec<Value>>),
}

impl Column {
    /// Top-level length (number of records).
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(v) => v.len(),
            Self::Jagged(v) => v.len(),
        }
    }

    /// Returns `true` if the column has no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for [`Column::Jagged`].
    pub fn is_jagged(&self) -> bool {
        matches!(self, Self::Jagged(_))
    }

    /// Value at position `i`; jagged entries are returned as [`Value::List`].
    pub fn get(&self, i: usize) -> Option<Value> {
        match self {
            Self::Flat(v) => v.get(i).cloned(),
            Self::Jagged(v) => v.get(i).map(|items| Value::List(items.clone())),
        }
    }

    /// Per-record sub-sequence lengths of a jagged column.
    pub fn counts(&self) -> Option<Vec<usize>> {
        match self {
            Self::Flat(_) => None,
            Self::Jagged(v) => Some(v.iter().map(Vec::len).collect()),
        }
    }

    /// Rows `range` of this column.
    pub fn slice(&self, range: Range<usize>) -> IterResult<Column> {
        let len = self.len();
        if range.start > range.end || range.end > len {
            return Err(IterError::IndexOutOfRange {
                index: range.end,
                len,
            });
        }
        Ok(match self {
            Self::Flat(v) => Self::Flat(v[range].to_vec()),
            Self::Jagged(v) => Self::Jagged(v[range].to_vec()),
        })
    }

    /// Rows at `indices`, in the given order.
    pub fn take(&self, indices: &[usize]) -> IterResult<Column> {
        let len = self.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(IterError::IndexOutOfRange { index: bad, len });
        }
        Ok(match self {
            Self::Flat(v) => Self::Flat(indices.iter().map(|&i| v[i].clone()).collect()),
            Self::Jagged(v) => Self::Jagged(indices.iter().map(|&i| v[i].clone()).collect()),
        })
    }

    /// Concatenate the sub-sequences of a jagged column into a flat one.
    ///
    /// Flat columns are returned unchanged.
    pub fn flatten(&self) -> Column {
        match self {
            Self::Flat(v) => Self::Flat(v.clone()),
            Self::Jagged(v) => Self::Flat(v.iter().flatten().cloned().collect()),
        }
    }

    /// Regroup a flat column into a jagged one using per-record `counts`.
    ///
    /// The counts must sum to the column length. A jagged column is flattened first.
    pub fn unflatten(&self, counts: &[usize]) -> IterResult<Column> {
        let flat: Vec<Value> = match self {
            Self::Flat(v) => v.clone(),
            Self::Jagged(v) => v.iter().flatten().cloned().collect(),
        };
        let total: usize = counts.iter().sum();
        if total != flat.len() {
            return Err(IterError::ColumnLength {
                column: "<unflatten>".to_string(),
                expected: total,
                actual: flat.len(),
            });
        }
        let mut out = Vec::with_capacity(counts.len());
        let mut values = flat.into_iter();
        for &n in counts {
            out.push(values.by_ref().take(n).collect());
        }
        Ok(Self::Jagged(out))
    }

    /// Append `other` to this column.
    ///
    /// An empty column adopts the shape of `other`; otherwise both must be of the same kind.
    pub fn extend_from(&mut self, other: &Column) -> bool {
        if self.is_empty() && self.is_jagged() != other.is_jagged() {
            *self = other.clone();
            return true;
        }
        match (self, other) {
            (Self::Flat(a), Self::Flat(b)) => a.extend(b.iter().cloned()),
            (Self::Jagged(a), Self::Jagged(b)) => a.extend(b.iter().cloned()),
            _ => return false,
        }
        true
    }
}

/// One chunk of rows for all columns of a table.
///
/// Columns keep their insertion order. All columns share one top-level length, enforced on
/// insertion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnBatch {
    columns: IndexMap<Key, Column>,
}

impl ColumnBatch {
    /// An empty batch (no columns).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch, checking that all columns have the same length.
    pub fn try_new<K, I>(columns: I) -> IterResult<Self>
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Column)>,
    {
        let mut batch = Self::new();
        for (key, column) in columns {
            batch.insert(key, column)?;
        }
        Ok(batch)
    }

    /// A batch holding a single column.
    pub fn from_column(key: impl Into<Key>, column: Column) -> Self {
        let mut columns = IndexMap::with_capacity(1);
        columns.insert(key.into(), column);
        Self { columns }
    }

    /// Insert (or replace) a column.
    ///
    /// Fails if the column's length differs from the batch's record count. Replacing the only
    /// column of a batch may change its length.
    pub fn insert(&mut self, key: impl Into<Key>, column: Column) -> IterResult<()> {
        let key = key.into();
        let replacing_sole = self.columns.len() == 1 && self.columns.contains_key(&key);
        if !self.columns.is_empty() && !replacing_sole {
            let expected = self.num_entries();
            if column.len() != expected {
                return Err(IterError::ColumnLength {
                    column: key.to_string(),
                    expected,
                    actual: column.len(),
                });
            }
        }
        self.columns.insert(key, column);
        Ok(())
    }

    /// Number of records (length of an arbitrary column). An empty batch has zero records.
    pub fn num_entries(&self) -> usize {
        self.columns.values().next().map(Column::len).unwrap_or(0)
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the batch has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column by text name.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(&Key::Text(name.to_string()))
    }

    /// Column by raw (byte) name.
    pub fn get_raw(&self, name: &[u8]) -> Option<&Column> {
        self.columns.get(&Key::Raw(name.to_vec()))
    }

    /// Column by key.
    pub fn get_key(&self, key: &Key) -> Option<&Column> {
        self.columns.get(key)
    }

    /// Column keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.columns.keys()
    }

    /// `(key, column)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Column)> {
        self.columns.iter()
    }

    /// Returns `true` if every key is text.
    pub fn has_text_keys(&self) -> bool {
        self.columns.keys().all(Key::is_text)
    }

    /// Convert every raw key to text.
    ///
    /// Fails if a decoded key collides with another column's name.
    pub fn decode_keys(self) -> IterResult<Self> {
        let mut columns = IndexMap::with_capacity(self.columns.len());
        for (key, column) in self.columns {
            let key = key.into_text();
            if columns.contains_key(&key) {
                return Err(IterError::DuplicateColumn {
                    column: key.to_string(),
                });
            }
            columns.insert(key, column);
        }
        Ok(Self { columns })
    }

    /// Keep only the named columns, in the given order. Names match keys after decoding.
    ///
    /// An empty selection is rejected: a batch without columns has no record count.
    pub fn project(self, names: &[String]) -> IterResult<Self> {
        if names.is_empty() {
            return Err(IterError::InvalidPolicy {
                message: "column selection is empty".to_string(),
            });
        }
        let mut columns = self.columns;
        let mut out = IndexMap::with_capacity(names.len());
        for name in names {
            let key = columns
                .keys()
                .find(|k| k.decoded() == name.as_str())
                .cloned()
                .ok_or_else(|| IterError::ColumnNotFound {
                    column: name.clone(),
                })?;
            if let Some(column) = columns.shift_remove(&key) {
                out.insert(key, column);
            }
        }
        Ok(Self { columns: out })
    }

    /// Rows `range` of every column.
    pub fn slice(&self, range: Range<usize>) -> IterResult<Self> {
        let mut columns = IndexMap::with_capacity(self.columns.len());
        for (k, v) in &self.columns {
            columns.insert(k.clone(), v.slice(range.clone())?);
        }
        Ok(Self { columns })
    }

    /// The record at position `i`.
    pub fn record(&self, i: usize) -> Option<Record> {
        if i >= self.num_entries() {
            return None;
        }
        let mut values = IndexMap::with_capacity(self.columns.len());
        for (k, v) in &self.columns {
            values.insert(k.clone(), v.get(i)?);
        }
        Some(Record { values })
    }

    /// Rebuild a batch from records (the inverse of taking every [`ColumnBatch::record`]).
    ///
    /// Column order and kinds follow the first record: list values make a jagged column.
    pub fn from_records(records: &[Record]) -> IterResult<Self> {
        let Some(first) = records.first() else {
            return Ok(Self::new());
        };
        let mut batch = Self::new();
        for (key, sample) in first.iter() {
            let missing = || IterError::ColumnNotFound {
                column: key.to_string(),
            };
            let column = if sample.as_list().is_some() {
                let mut rows = Vec::with_capacity(records.len());
                for r in records {
                    match r.get_key(key) {
                        Some(Value::List(items)) => rows.push(items.clone()),
                        Some(other) => rows.push(vec![other.clone()]),
                        None => return Err(missing()),
                    }
                }
                Column::Jagged(rows)
            } else {
                let mut rows = Vec::with_capacity(records.len());
                for r in records {
                    rows.push(r.get_key(key).cloned().ok_or_else(missing)?);
                }
                Column::Flat(rows)
            };
            batch.insert(key.clone(), column)?;
        }
        Ok(batch)
    }
}

/// Number of records in a batch: the length of an arbitrary column (zero for an empty batch).
pub fn record_count(batch: &ColumnBatch) -> usize {
    batch.num_entries()
}

/// One logical event: every column of a batch indexed at the same position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: IndexMap<Key, Value>,
}

impl Record {
    /// Value by text column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(&Key::Text(name.to_string()))
    }

    /// Value by key.
    pub fn get_key(&self, key: &Key) -> Option<&Value> {
        self.values.get(key)
    }

    /// Column keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.values.keys()
    }

    /// `(key, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.values.iter()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
