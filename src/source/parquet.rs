//! Parquet backend.
//!
//! - A `.parquet`/`.pq` file opens as a container holding one table, keyed by the Parquet
//!   schema's root message name (so files written with the same schema share a table path).
//! - A directory opens as a container whose entries are its subdirectories (nested containers)
//!   and its Parquet files (tables keyed by file stem), sorted by name.
//!
//! Tables are read with the Parquet record API, row by row, and cut into batches at row-group
//! boundaries (or every `entry_steps` rows). Rows are only decoded when a batch is requested,
//! only the selected columns are read, and row groups outside the entry window are skipped.

use std::fs::File;
use std::path::{Path, PathBuf};

use parquet::basic::{ConvertedType, Repetition};
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::{ReadOptionsBuilder, SerializedFileReader};
use parquet::record::reader::RowIter;
use parquet::record::{Field, Row};
use parquet::schema::types::{Type, TypePtr};
use walkdir::WalkDir;

use crate::error::{IterError, IterResult};
use crate::types::{Column, ColumnBatch, Key, Value};

use super::{BatchPolicy, BatchStream, Container, Entry, Opener, Table};

/// Opens Parquet files and directories of Parquet files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetOpener;

impl Opener for ParquetOpener {
    fn open(&self, path: &str) -> IterResult<Box<dyn Container>> {
        let path = Path::new(path);
        if path.is_dir() {
            return Ok(Box::new(ParquetContainer::Directory {
                root: path.to_path_buf(),
            }));
        }
        let reader = open_reader(path)?;
        let table = reader
            .metadata()
            .file_metadata()
            .schema_descr()
            .root_schema()
            .name()
            .to_string();
        Ok(Box::new(ParquetContainer::File {
            path: path.to_path_buf(),
            table,
        }))
    }
}

fn open_reader(path: &Path) -> IterResult<SerializedFileReader<File>> {
    let file = File::open(path)?;
    Ok(SerializedFileReader::new(file)?)
}

fn is_parquet_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "parquet" | "pq"))
}

/// An opened Parquet file or directory.
#[derive(Debug, Clone)]
pub enum ParquetContainer {
    /// A single file holding one table named `table`.
    File { path: PathBuf, table: String },
    /// A directory of files and subdirectories.
    Directory { root: PathBuf },
}

impl Container for ParquetContainer {
    fn identity(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Directory { root } => root.display().to_string(),
        }
    }

    fn entries(&self) -> IterResult<Vec<(Key, Entry)>> {
        match self {
            Self::File { path, table } => Ok(vec![(
                Key::text(table.clone()),
                Entry::Table(Box::new(ParquetTable::new(path))),
            )]),
            Self::Directory { root } => {
                let mut out = Vec::new();
                let walker = WalkDir::new(root)
                    .min_depth(1)
                    .max_depth(1)
                    .sort_by_file_name();
                for dent in walker {
                    let dent = dent.map_err(std::io::Error::from)?;
                    let path = dent.path();
                    if dent.file_type().is_dir() {
                        let key = Key::text(dent.file_name().to_string_lossy());
                        out.push((
                            key,
                            Entry::Directory(Box::new(Self::Directory {
                                root: path.to_path_buf(),
                            })),
                        ));
                    } else if is_parquet_file(path) {
                        let stem = path
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        out.push((Key::text(stem), Entry::Table(Box::new(ParquetTable::new(path)))));
                    } else {
                        out.push((Key::text(dent.file_name().to_string_lossy()), Entry::Other));
                    }
                }
                Ok(out)
            }
        }
    }
}

/// One Parquet file read as a table.
#[derive(Debug, Clone)]
pub struct ParquetTable {
    path: PathBuf,
}

impl ParquetTable {
    /// A table backed by the file at `path`. The file is opened lazily.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Table for ParquetTable {
    fn num_entries(&self) -> IterResult<usize> {
        let reader = open_reader(&self.path)?;
        Ok(reader.metadata().file_metadata().num_rows().max(0) as usize)
    }

    fn batches(&self, policy: &BatchPolicy) -> IterResult<BatchStream> {
        policy.validate()?;

        let reader = open_reader(&self.path)?;
        let metadata = reader.metadata();
        let root = metadata.file_metadata().schema_descr().root_schema();

        let fields = select_fields(root, policy.columns.as_deref())?;
        let projection = match policy.columns {
            Some(_) => Some(
                Type::group_type_builder(root.name())
                    .with_fields(fields.clone())
                    .build()?,
            ),
            None => None,
        };
        let layout: Vec<ColumnLayout> = fields
            .iter()
            .map(|f| ColumnLayout {
                name: f.name().to_string(),
                jagged: is_list(f),
            })
            .collect();

        let mut bounds = Vec::with_capacity(metadata.num_row_groups());
        let mut total = 0usize;
        for rg in metadata.row_groups() {
            let begin = total;
            total += rg.num_rows().max(0) as usize;
            bounds.push((begin, total));
        }
        let start = policy.entry_start.unwrap_or(0);
        let stop = policy.entry_stop.map_or(total, |s| s.min(total));

        // Row groups entirely outside [start, stop) are never decoded.
        let keep: Vec<bool> = bounds
            .iter()
            .map(|&(begin, end)| end > start && begin < stop)
            .collect();
        let first_begin = bounds
            .iter()
            .zip(&keep)
            .find(|(_, kept)| **kept)
            .map_or(total, |(&(begin, _), _)| begin);
        let row_group_ends: Vec<usize> = bounds
            .iter()
            .zip(&keep)
            .filter(|(_, kept)| **kept)
            .map(|(&(_, end), _)| end)
            .collect();

        let options = ReadOptionsBuilder::new()
            .with_predicate(Box::new(move |_: &RowGroupMetaData, i: usize| {
                keep.get(i).copied().unwrap_or(false)
            }))
            .build();
        let reader = SerializedFileReader::new_with_options(File::open(&self.path)?, options)?;
        let rows = RowIter::from_file_into(Box::new(reader)).project(projection)?;

        Ok(Box::new(ParquetStream {
            rows,
            layout,
            row_group_ends,
            position: first_begin,
            start,
            stop,
            steps: policy.entry_steps,
            done: false,
        }))
    }
}

/// Top-level fields to read, in the requested order. Unknown names are an error.
fn select_fields(root: &Type, columns: Option<&[String]>) -> IterResult<Vec<TypePtr>> {
    let fields = root.get_fields();
    let Some(names) = columns else {
        return Ok(fields.to_vec());
    };
    names
        .iter()
        .map(|name| {
            fields
                .iter()
                .find(|f| f.name() == name.as_str())
                .cloned()
                .ok_or_else(|| IterError::ColumnNotFound {
                    column: name.clone(),
                })
        })
        .collect()
}

fn is_list(t: &Type) -> bool {
    let info = t.get_basic_info();
    info.converted_type() == ConvertedType::LIST
        || (info.has_repetition() && info.repetition() == Repetition::REPEATED)
}

struct ColumnLayout {
    name: String,
    jagged: bool,
}

struct ParquetStream {
    rows: RowIter<'static>,
    layout: Vec<ColumnLayout>,
    row_group_ends: Vec<usize>,
    position: usize,
    start: usize,
    stop: usize,
    steps: Option<usize>,
    done: bool,
}

impl ParquetStream {
    fn chunk_end(&self) -> usize {
        let end = match self.steps {
            Some(steps) => self.position + steps,
            None => {
                let idx = self.row_group_ends.partition_point(|&e| e <= self.position);
                self.row_group_ends.get(idx).copied().unwrap_or(self.stop)
            }
        };
        end.min(self.stop)
    }

    fn next_row(&mut self) -> IterResult<Option<Row>> {
        match self.rows.next() {
            Some(row) => {
                self.position += 1;
                Ok(Some(row?))
            }
            None => Ok(None),
        }
    }

    fn read_chunk(&mut self) -> IterResult<Option<ColumnBatch>> {
        while self.position < self.start {
            if self.next_row()?.is_none() {
                return Ok(None);
            }
        }
        if self.position >= self.stop {
            return Ok(None);
        }

        let end = self.chunk_end();
        let mut builders: Vec<Column> = self
            .layout
            .iter()
            .map(|c| {
                if c.jagged {
                    Column::Jagged(Vec::with_capacity(end - self.position))
                } else {
                    Column::Flat(Vec::with_capacity(end - self.position))
                }
            })
            .collect();

        while self.position < end {
            let Some(row) = self.next_row()? else {
                break;
            };
            for ((_, field), builder) in row.get_column_iter().zip(builders.iter_mut()) {
                match builder {
                    Column::Flat(values) => values.push(convert_field(field)),
                    Column::Jagged(values) => values.push(convert_list(field)),
                }
            }
        }

        let batch = ColumnBatch::try_new(
            self.layout
                .iter()
                .map(|c| Key::text(c.name.clone()))
                .zip(builders),
        )?;
        if batch.num_entries() == 0 {
            return Ok(None);
        }
        Ok(Some(batch))
    }
}

impl Iterator for ParquetStream {
    type Item = IterResult<ColumnBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn convert_list(field: &Field) -> Vec<Value> {
    match field {
        Field::ListInternal(list) => list.elements().iter().map(convert_field).collect(),
        Field::Null => Vec::new(),
        other => vec![convert_field(other)],
    }
}

fn convert_field(field: &Field) -> Value {
    match field {
        Field::Null => Value::Null,
        Field::Bool(b) => Value::Bool(*b),
        Field::Byte(v) => Value::Int64(i64::from(*v)),
        Field::Short(v) => Value::Int64(i64::from(*v)),
        Field::Int(v) => Value::Int64(i64::from(*v)),
        Field::Long(v) => Value::Int64(*v),
        Field::UByte(v) => Value::Int64(i64::from(*v)),
        Field::UShort(v) => Value::Int64(i64::from(*v)),
        Field::UInt(v) => Value::Int64(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v)
            .map(Value::Int64)
            .unwrap_or(Value::Float64(*v as f64)),
        Field::Float(v) => Value::Float64(f64::from(*v)),
        Field::Double(v) => Value::Float64(*v),
        Field::Str(s) => Value::Utf8(s.clone()),
        Field::Bytes(b) => Value::Bytes(b.data().to_vec()),
        Field::Date(d) => Value::Int64(i64::from(*d)),
        Field::TimestampMillis(t) | Field::TimestampMicros(t) => Value::Int64(*t),
        Field::ListInternal(list) => Value::List(list.elements().iter().map(convert_field).collect()),
        other => Value::Utf8(other.to_string()),
    }
}
