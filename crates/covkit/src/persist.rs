//! Raw artifact persistence
//!
//! Each session dumps its collector snapshot to
//! `<report-dir>/raw/<run-id>.json`. Run ids are expected to be unique per
//! process; when two sessions share one, the last writer wins.

use crate::coverage::CoverageMap;
use crate::result::{CoverageError, CoverageResult};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the raw artifact directory under the report dir
pub const RAW_DIR_NAME: &str = "raw";

/// Names a raw artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunIdentifier {
    /// Caller-supplied name
    Named(String),
    /// Owning process id
    Pid(u32),
}

impl RunIdentifier {
    /// Use `name` when present and non-empty, else the current process id
    #[must_use]
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some(name) if !name.is_empty() => Self::Named(name.to_string()),
            _ => Self::Pid(std::process::id()),
        }
    }

    /// Fails unless the identifier names a single file in the raw directory
    pub fn validate(&self) -> CoverageResult<()> {
        match self {
            Self::Named(name) => validate_segment(name),
            Self::Pid(_) => Ok(()),
        }
    }
}

/// Fails unless `name` is usable as one file or directory name
pub fn validate_segment(name: &str) -> CoverageResult<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name == "." || name == ".." {
        "must not name a relative directory"
    } else if name.contains(['/', '\\']) {
        "must be a single path segment"
    } else {
        return Ok(());
    };
    Err(CoverageError::invalid_name(name, reason))
}

impl fmt::Display for RunIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Pid(pid) => write!(f, "pid_{pid}"),
        }
    }
}

/// Writes collector snapshots as raw artifacts
#[derive(Debug, Clone)]
pub struct RawPersister {
    raw_dir: PathBuf,
}

impl RawPersister {
    /// Persister writing under `<report_dir>/raw`
    #[must_use]
    pub fn new(report_dir: &Path) -> Self {
        Self {
            raw_dir: report_dir.join(RAW_DIR_NAME),
        }
    }

    /// Directory artifacts are written to
    #[must_use]
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Where the artifact for `run` lives
    #[must_use]
    pub fn artifact_path(&self, run: &RunIdentifier) -> PathBuf {
        self.raw_dir.join(format!("{run}.json"))
    }

    /// Serialize `snapshot` to the artifact for `run`, replacing any previous
    /// artifact with that name.
    ///
    /// The JSON is written to a temporary sibling and renamed into place, so
    /// a concurrent merge sees either the old file or the new one.
    pub fn persist(&self, snapshot: &CoverageMap, run: &RunIdentifier) -> CoverageResult<PathBuf> {
        run.validate()?;
        ensure_dir(&self.raw_dir)?;
        let target = self.artifact_path(run);
        let staging = self
            .raw_dir
            .join(format!(".{run}.json.{}.tmp", std::process::id()));

        let json = snapshot.to_json()?;
        if let Err(e) = fs::write(&staging, json) {
            let _ = fs::remove_file(&staging);
            return Err(CoverageError::io(&staging, e));
        }
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(CoverageError::io(&target, e));
        }

        tracing::info!(path = %target.display(), files = snapshot.len(), "raw coverage written");
        Ok(target)
    }
}

/// Create `dir` and its parents; a sibling process creating it first is fine
pub fn ensure_dir(dir: &Path) -> CoverageResult<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(CoverageError::io(dir, e)),
    }
}
