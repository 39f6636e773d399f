//! `columnar-events` streams fixed-size batches of event records out of columnar files, with a
//! record budget that can span many files and be split across weighted groups of sources.
//!
//! The primary entrypoint is [`iteration::iterate`]. It takes one path, a wildcard or a list of
//! paths, finds the first table in the first file (unless a table path is configured), and
//! streams [`types::ColumnBatch`]es until either the sources or the budget run out.
//!
//! ## What you can read
//!
//! - **Parquet** (default backend): a `.parquet` file is a container with one table; a
//!   directory is a container whose subdirectories are nested containers and whose Parquet
//!   files are tables. `LIST` columns come back as jagged columns.
//! - **In memory**: [`source::MemoryOpener`] serves hand-built containers, which is what most
//!   tests use.
//! - **Anything else**: implement [`source::Opener`], [`source::Container`] and
//!   [`source::Table`].
//!
//! ## Quick example: budgeted iteration
//!
//! ```no_run
//! use columnar_events::iteration::{iterate, IterOptions};
//! use columnar_events::record_count;
//!
//! # fn main() -> Result<(), columnar_events::IterError> {
//! let opts = IterOptions {
//!     n_max: Some(10_000),
//!     ..Default::default()
//! };
//! let mut total = 0;
//! for batch in iterate("data/ntuple_*.parquet", &opts)? {
//!     total += record_count(&batch?);
//! }
//! // At least 10_000 unless the files hold fewer; at most one batch more.
//! println!("read {total} records");
//! # Ok(())
//! # }
//! ```
//!
//! ## Weighted sampling
//!
//! ```no_run
//! use columnar_events::iteration::{iterate_weighted, IterOptions};
//!
//! # fn main() -> Result<(), columnar_events::IterError> {
//! let groups = vec!["signal/*.parquet", "background/*.parquet"];
//! // Logs "Requested 1000, doing 1000: [250, 750]".
//! for batch in iterate_weighted(1000, &[1.0, 3.0], groups, &IterOptions::default())? {
//!     let _batch = batch?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`iteration`]: iterators, table discovery, options and diagnostics
//! - [`source`]: the container/table abstraction, source normalization and backends
//! - [`types`]: keys, values, columns, batches and records
//! - [`bunch`]: named column bundles with whole-bundle selection and kinematics
//! - [`error`]: error types used across the crate

pub mod bunch;
pub mod error;
pub mod iteration;
pub mod source;
pub mod types;

pub use error::{IterError, IterResult};
pub use iteration::{count_entries, iterate, iterate_records, iterate_weighted, nth_record};
pub use types::record_count;
