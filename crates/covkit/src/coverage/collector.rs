//! Coverage Collector
//!
//! The collector is the per-session store instrumented code writes hit
//! counts into. It is owned by a [`crate::CoverageSession`] and reached
//! through a [`CoverageHandle`], a typed handle carrying the session id,
//! rather than through any process-global name.

use super::{BranchId, CoverageMap, FileCoverageRecord, FunctionId, StatementId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Unique identifier of one collector instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file that was left out of coverage, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Source path
    pub path: String,
    /// Reason
    pub message: String,
}

/// Running hit counts for every instrumented file touched in a session
#[derive(Debug, Default)]
pub struct CoverageCollector {
    files: BTreeMap<String, FileCoverageRecord>,
    diagnostics: Vec<Diagnostic>,
    sealed: bool,
}

impl CoverageCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly instrumented file. An already registered path
    /// keeps its running counts.
    pub fn register(&mut self, record: FileCoverageRecord) -> bool {
        if self.sealed || self.files.contains_key(&record.path) {
            return false;
        }
        let _ = self.files.insert(record.path.clone(), record);
        true
    }

    /// Record a hit on a statement
    pub fn hit_statement(&mut self, path: &str, id: StatementId) {
        if let Some(record) = self.live_record(path) {
            record.hit_statement(id);
        }
    }

    /// Record a hit on a function
    pub fn hit_function(&mut self, path: &str, id: FunctionId) {
        if let Some(record) = self.live_record(path) {
            record.hit_function(id);
        }
    }

    /// Record a hit on one arm of a branch
    pub fn hit_branch(&mut self, path: &str, id: BranchId, arm: usize) {
        if let Some(record) = self.live_record(path) {
            record.hit_branch(id, arm);
        }
    }

    /// Note that a file was excluded from coverage
    pub fn record_diagnostic(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Stop accepting hits and registrations
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether the collector has been sealed
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Whether a path has been registered
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Copy of the current counts as a coverage map
    #[must_use]
    pub fn snapshot(&self) -> CoverageMap {
        self.files.values().cloned().collect()
    }

    /// Diagnostics recorded so far
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn live_record(&mut self, path: &str) -> Option<&mut FileCoverageRecord> {
        if self.sealed {
            return None;
        }
        self.files.get_mut(path)
    }
}

/// Typed, cloneable handle to one session's collector
#[derive(Debug, Clone)]
pub struct CoverageHandle {
    id: SessionId,
    inner: Arc<Mutex<CoverageCollector>>,
}

impl CoverageHandle {
    /// Create a handle to a new, empty collector
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            inner: Arc::new(Mutex::new(CoverageCollector::new())),
        }
    }

    /// The session this handle belongs to
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Run `f` with exclusive access to the collector
    pub fn with<R>(&self, f: impl FnOnce(&mut CoverageCollector) -> R) -> R {
        f(&mut self.lock())
    }

    /// Register an instrumented file and get a probe for it
    pub fn register(&self, record: FileCoverageRecord) -> FileProbe {
        let path: Arc<str> = Arc::from(record.path.as_str());
        let _ = self.lock().register(record);
        FileProbe {
            handle: self.clone(),
            path,
        }
    }

    /// Snapshot the current counts
    #[must_use]
    pub fn snapshot(&self) -> CoverageMap {
        self.lock().snapshot()
    }

    /// Diagnostics recorded so far
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().diagnostics().to_vec()
    }

    /// Whether two handles address the same collector
    #[must_use]
    pub fn same_session(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, CoverageCollector> {
        // Counters stay consistent even if a holder panicked mid-increment.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for CoverageHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter entry points for one instrumented file.
///
/// This is what instrumented code calls as it executes.
#[derive(Debug, Clone)]
pub struct FileProbe {
    handle: CoverageHandle,
    path: Arc<str>,
}

impl FileProbe {
    /// Path of the instrumented file
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Session this probe writes into
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.handle.session_id()
    }

    /// Count one execution of a statement
    pub fn statement(&self, id: StatementId) {
        self.handle.with(|c| c.hit_statement(&self.path, id));
    }

    /// Count one call of a function
    pub fn function(&self, id: FunctionId) {
        self.handle.with(|c| c.hit_function(&self.path, id));
    }

    /// Count one traversal of a branch arm
    pub fn branch(&self, id: BranchId, arm: usize) {
        self.handle.with(|c| c.hit_branch(&self.path, id, arm));
    }
}
