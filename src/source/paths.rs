//! Source references and their normalization into concrete path lists.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IterError, IterResult};

/// Lists remote objects matching a wildcard pattern (e.g. `root://host//store/*.parquet`).
///
/// No implementation ships with this crate; callers plug in their storage service's client.
pub trait RemoteLister: Send + Sync {
    /// Concrete paths matching `pattern`, in a deterministic order.
    fn list_wildcard(&self, pattern: &str) -> IterResult<Vec<String>>;
}

/// What to iterate over: one path or pattern, or an explicit list of paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// A single path, or a local/remote wildcard pattern.
    One(String),
    /// Concrete paths, used as given.
    Many(Vec<String>),
}

impl SourceRef {
    /// Normalize into a concrete, ordered list of paths.
    ///
    /// - lists pass through unchanged
    /// - a path without wildcard characters becomes a one-element list
    /// - a remote pattern (`scheme://...`) is expanded by `lister`
    /// - a local pattern is expanded with filesystem glob semantics, sorted
    pub fn resolve(&self, lister: Option<&Arc<dyn RemoteLister>>) -> IterResult<Vec<String>> {
        match self {
            Self::Many(paths) => Ok(paths.clone()),
            Self::One(path) if !is_wildcard(path) => Ok(vec![path.clone()]),
            Self::One(pattern) if has_protocol(pattern) => match lister {
                Some(lister) => lister.list_wildcard(pattern),
                None => Err(IterError::MissingLister {
                    pattern: pattern.clone(),
                }),
            },
            Self::One(pattern) => expand_local(pattern),
        }
    }
}

fn expand_local(pattern: &str) -> IterResult<Vec<String>> {
    let mut matches = Vec::new();
    for entry in glob::glob(pattern)? {
        matches.push(entry?.to_string_lossy().into_owned());
    }
    matches.sort();
    Ok(matches)
}

/// Returns `true` if `path` contains glob metacharacters.
pub fn is_wildcard(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

/// Returns `true` if `path` starts with a URL-style scheme (`root://`, `s3://`, ...).
pub fn has_protocol(path: &str) -> bool {
    match path.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl From<&str> for SourceRef {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<String> for SourceRef {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<&Path> for SourceRef {
    fn from(p: &Path) -> Self {
        Self::One(p.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for SourceRef {
    fn from(p: PathBuf) -> Self {
        Self::from(p.as_path())
    }
}

impl From<&PathBuf> for SourceRef {
    fn from(p: &PathBuf) -> Self {
        Self::from(p.as_path())
    }
}

impl From<Vec<String>> for SourceRef {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v)
    }
}

impl From<Vec<&str>> for SourceRef {
    fn from(v: Vec<&str>) -> Self {
        Self::Many(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<PathBuf>> for SourceRef {
    fn from(v: Vec<PathBuf>) -> Self {
        Self::Many(
            v.iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        )
    }
}
