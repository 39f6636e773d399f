use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Importance of an [`IterationEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    /// Per-file / per-batch bookkeeping.
    Debug,
    /// Table discovery and sampling plans.
    Info,
    /// A source failed; the iteration is aborting.
    Error,
}

/// How much of the event stream reaches the observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and errors.
    #[default]
    Info,
    /// Everything.
    Debug,
}

impl Verbosity {
    /// Returns `true` if events at `level` are delivered.
    pub fn allows(self, level: EventLevel) -> bool {
        match self {
            Self::Quiet => level >= EventLevel::Error,
            Self::Info => level >= EventLevel::Info,
            Self::Debug => true,
        }
    }
}

/// Events emitted while iterating.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationEvent {
    /// A table was discovered by searching a container.
    TableLocated { container: String, path: String },
    /// Sub-budgets computed by a weighted sampling call.
    WeightedPlan {
        requested: usize,
        doing: usize,
        budgets: Vec<usize>,
    },
    /// A weighted group was skipped because its sub-budget rounded to zero.
    GroupSkipped { group: usize },
    /// A source file was opened.
    SourceOpened { path: String },
    /// A batch was handed to the caller.
    BatchForwarded {
        path: String,
        rows: usize,
        remaining: Option<usize>,
    },
    /// The budget ran out; no more sources are opened.
    BudgetExhausted { path: String },
    /// A source failed and the iteration stopped.
    SourceFailed { path: String, error: String },
}

impl IterationEvent {
    /// The level this event is reported at.
    pub fn level(&self) -> EventLevel {
        match self {
            Self::TableLocated { .. } | Self::WeightedPlan { .. } => EventLevel::Info,
            Self::SourceFailed { .. } => EventLevel::Error,
            _ => EventLevel::Debug,
        }
    }
}

impl fmt::Display for IterationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableLocated { path, .. } => write!(f, "Using tree {path}"),
            Self::WeightedPlan {
                requested,
                doing,
                budgets,
            } => write!(f, "Requested {requested}, doing {doing}: {budgets:?}"),
            Self::GroupSkipped { group } => write!(f, "Skipping group {group}: zero budget"),
            Self::SourceOpened { path } => write!(f, "Opened {path}"),
            Self::BatchForwarded {
                path,
                rows,
                remaining,
            } => match remaining {
                Some(r) => write!(f, "Forwarded {rows} rows from {path} ({r} to go)"),
                None => write!(f, "Forwarded {rows} rows from {path}"),
            },
            Self::BudgetExhausted { path } => write!(f, "Budget exhausted in {path}"),
            Self::SourceFailed { path, error } => write!(f, "Failed reading {path}: {error}"),
        }
    }
}

/// Observer interface for iteration events.
///
/// Implementors can log, record metrics or collect events for inspection.
pub trait IterationObserver: Send + Sync {
    fn on_event(&self, event: &IterationEvent);
}

/// An observer that fans out events to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IterationObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IterationObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IterationObserver for CompositeObserver {
    fn on_event(&self, event: &IterationEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

/// Logs events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl IterationObserver for StdErrObserver {
    fn on_event(&self, event: &IterationEvent) {
        eprintln!("[iter][{:?}] {event}", event.level());
    }
}

/// Forwards events to `tracing` at the matching level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IterationObserver for TracingObserver {
    fn on_event(&self, event: &IterationEvent) {
        match event.level() {
            EventLevel::Debug => tracing::debug!("{event}"),
            EventLevel::Info => tracing::info!("{event}"),
            EventLevel::Error => tracing::error!("{event}"),
        }
    }
}

/// Appends events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }
}

impl IterationObserver for FileObserver {
    fn on_event(&self, event: &IterationEvent) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {:?} {event}", unix_ts(), event.level());
        }
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The diagnostics context handed to every entry point: where events go and how many of them.
#[derive(Clone)]
pub struct Diagnostics {
    observer: Option<Arc<dyn IterationObserver>>,
    verbosity: Verbosity,
}

impl Diagnostics {
    /// Deliver events allowed by `verbosity` to `observer`.
    pub fn new(observer: Arc<dyn IterationObserver>, verbosity: Verbosity) -> Self {
        Self {
            observer: Some(observer),
            verbosity,
        }
    }

    /// Drop every event.
    pub fn silent() -> Self {
        Self {
            observer: None,
            verbosity: Verbosity::Quiet,
        }
    }

    /// Same observer, different verbosity.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// The configured verbosity.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub(crate) fn emit(&self, event: IterationEvent) {
        if let Some(obs) = &self.observer {
            if self.verbosity.allows(event.level()) {
                obs.on_event(&event);
            }
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Arc::new(TracingObserver), Verbosity::Info)
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("observer_set", &self.observer.is_some())
            .field("verbosity", &self.verbosity)
            .finish()
    }
}
