//! Iteration options and their file-loadable configuration form.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::IterResult;
use crate::source::{BatchPolicy, Opener, ParquetOpener, RemoteLister};

use super::observability::{Diagnostics, Verbosity};

/// Options controlling an iteration call.
///
/// Use [`Default`] for common cases: no budget, automatic table discovery, Parquet sources,
/// diagnostics routed to `tracing` at info level.
#[derive(Clone)]
pub struct IterOptions {
    /// Maximum total number of records. `None` reads everything.
    ///
    /// Batches are never split, so the last batch may overshoot.
    pub n_max: Option<usize>,
    /// Table path inside each file. If `None`, the first table of the first file is used for
    /// all files.
    pub table_path: Option<String>,
    /// Convert raw (byte) column keys to text in every yielded batch.
    pub decode: bool,
    /// Chunking/range hints for the underlying tables.
    pub policy: BatchPolicy,
    /// Where diagnostics go.
    pub diagnostics: Diagnostics,
    /// Opens source paths.
    pub opener: Arc<dyn Opener>,
    /// Expands remote wildcard patterns. Required only when one is used.
    pub lister: Option<Arc<dyn RemoteLister>>,
}

impl IterOptions {
    /// Options reading through `opener`, otherwise default.
    pub fn with_opener(opener: Arc<dyn Opener>) -> Self {
        Self {
            opener,
            ..Default::default()
        }
    }
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            n_max: None,
            table_path: None,
            decode: false,
            policy: BatchPolicy::default(),
            diagnostics: Diagnostics::default(),
            opener: Arc::new(ParquetOpener),
            lister: None,
        }
    }
}

impl fmt::Debug for IterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterOptions")
            .field("n_max", &self.n_max)
            .field("table_path", &self.table_path)
            .field("decode", &self.decode)
            .field("policy", &self.policy)
            .field("diagnostics", &self.diagnostics)
            .field("lister_set", &self.lister.is_some())
            .finish()
    }
}

/// Serializable subset of [`IterOptions`], e.g. loaded from a JSON job file.
///
/// ```
/// use columnar_events::iteration::IterConfig;
///
/// let cfg = IterConfig::from_json_str(
///     r#"{ "n_max": 500, "decode": true, "verbosity": "debug", "policy": { "entry_steps": 100 } }"#,
/// ).unwrap();
/// let opts = cfg.into_options();
/// assert_eq!(opts.n_max, Some(500));
/// assert_eq!(opts.policy.entry_steps, Some(100));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IterConfig {
    pub n_max: Option<usize>,
    pub table_path: Option<String>,
    pub decode: bool,
    pub verbosity: Verbosity,
    pub policy: BatchPolicy,
}

impl IterConfig {
    pub fn from_json_str(content: &str) -> IterResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> IterResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Default options overridden by this configuration.
    pub fn into_options(self) -> IterOptions {
        let defaults = IterOptions::default();
        IterOptions {
            n_max: self.n_max,
            table_path: self.table_path,
            decode: self.decode,
            policy: self.policy,
            diagnostics: defaults.diagnostics.clone().with_verbosity(self.verbosity),
            ..defaults
        }
    }
}
