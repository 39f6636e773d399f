use thiserror::Error;

/// Convenience result type for iteration operations.
pub type IterResult<T> = Result<T, IterError>;

/// Error type returned by sources, iterators and column containers.
///
/// Failures coming from the storage layer (I/O, Parquet decoding, path expansion) are passed
/// through unchanged; the remaining variants describe discovery, precondition and data-shape
/// failures raised by this crate.
#[derive(Debug, Error)]
pub enum IterError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Parquet decoding error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// A local wildcard pattern could not be parsed.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A path matched by a local wildcard could not be read.
    #[error("glob error: {0}")]
    Glob(#[from] glob::GlobError),

    /// A configuration document could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// No table-like entry exists anywhere in the container hierarchy.
    #[error("could not find any tree-like object in {container}")]
    NoTableFound { container: String },

    /// A table path was given (or reused from an earlier file) but the container lacks it.
    #[error("table '{path}' not found in {container}")]
    TableNotFound { container: String, path: String },

    /// Weight vector and source-group vector differ in length.
    #[error("length mismatch: {weights} weights for {groups} source groups")]
    LengthMismatch { weights: usize, groups: usize },

    /// Weights are negative, not finite, or sum to zero.
    #[error("invalid weights: {message}")]
    InvalidWeights { message: String },

    /// A remote wildcard was requested but no listing service is configured.
    #[error("cannot expand remote pattern '{pattern}': no remote lister configured")]
    MissingLister { pattern: String },

    /// The remote listing service failed.
    #[error("listing '{pattern}' failed: {message}")]
    Listing { pattern: String, message: String },

    /// A requested column does not exist.
    #[error("column '{column}' not found")]
    ColumnNotFound { column: String },

    /// Two columns end up with the same name (e.g. a raw and a text key after decoding).
    #[error("duplicate column '{column}'")]
    DuplicateColumn { column: String },

    /// A batch policy cannot be honoured (e.g. an empty column selection).
    #[error("invalid batch policy: {message}")]
    InvalidPolicy { message: String },

    /// A column's length disagrees with the other columns of its batch or bunch.
    #[error("column '{column}' has length {actual}, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Columns of different kinds (flat vs. jagged) cannot be combined.
    #[error("column '{column}' cannot combine flat and jagged data")]
    ColumnKind { column: String },

    /// A selection or count vector refers to positions outside a column.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
