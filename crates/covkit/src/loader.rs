//! Coverage-aware source loading
//!
//! Instead of patching a global module loader, the harness asks a
//! [`SourceProvider`] for each file it is about to execute. The
//! [`CoverageLoader`] consults the [`FileMatcher`], instruments matched files,
//! registers them with the session's collector and hands back the text to run
//! together with a [`FileProbe`] the executing code reports hits through.

use crate::coverage::{CoverageHandle, FileProbe};
use crate::instrument::Instrumenter;
use crate::matcher::{absolutize, FileMatcher};
use crate::result::{CoverageError, CoverageResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A source file ready to execute
#[derive(Debug, Clone)]
pub struct LoadedSource {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Text to execute (instrumented or original)
    pub code: String,
    /// Counter entry points, present only when the text is instrumented
    pub probe: Option<FileProbe>,
}

impl LoadedSource {
    /// Whether this source carries counters
    #[must_use]
    pub fn is_instrumented(&self) -> bool {
        self.probe.is_some()
    }
}

/// Supplies the text a harness executes for a given file
pub trait SourceProvider {
    /// Load the file at `path`
    fn load(&self, path: &Path) -> CoverageResult<LoadedSource>;
}

/// Plain provider: reads files from disk, no coverage
#[derive(Debug, Clone, Default)]
pub struct FsSourceProvider;

impl SourceProvider for FsSourceProvider {
    fn load(&self, path: &Path) -> CoverageResult<LoadedSource> {
        let code = std::fs::read_to_string(path).map_err(|e| CoverageError::io(path, e))?;
        Ok(LoadedSource {
            path: path.to_path_buf(),
            code,
            probe: None,
        })
    }
}

/// Source provider that instruments matched files into a session collector
pub struct CoverageLoader {
    matcher: FileMatcher,
    instrumenter: Arc<dyn Instrumenter>,
    handle: CoverageHandle,
    loaded: Mutex<HashMap<PathBuf, LoadedSource>>,
}

impl std::fmt::Debug for CoverageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageLoader")
            .field("matcher", &self.matcher)
            .field("session", &self.handle.session_id())
            .finish_non_exhaustive()
    }
}

impl CoverageLoader {
    /// Create a loader writing into `handle`'s collector
    #[must_use]
    pub fn new(matcher: FileMatcher, instrumenter: Arc<dyn Instrumenter>, handle: CoverageHandle) -> Self {
        Self {
            matcher,
            instrumenter,
            handle,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// The matcher deciding which files are instrumented
    #[must_use]
    pub fn matcher(&self) -> &FileMatcher {
        &self.matcher
    }

    /// The collector handle hits are written to
    #[must_use]
    pub fn handle(&self) -> &CoverageHandle {
        &self.handle
    }

    /// Transform already-read source text for `path`.
    ///
    /// Never fails: an instrumentation error falls back to the original text
    /// and records a diagnostic. The first load of a path in a session is
    /// cached, so loading it again neither re-instruments nor resets counts.
    pub fn transform(&self, path: &Path, source: &str) -> LoadedSource {
        let path = absolutize(&self.matcher.config().cwd, path);
        let mut loaded = self
            .loaded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(cached) = loaded.get(&path) {
            return cached.clone();
        }

        let result = self.instrument_one(&path, source);
        let _ = loaded.insert(path, result.clone());
        result
    }

    /// Register every matched file under `cwd` that was never loaded, with
    /// zero counts. Returns how many files were added.
    pub fn instrument_untouched(&self) -> CoverageResult<usize> {
        let cwd = &self.matcher.config().cwd;
        let pattern = format!("{}/**/*", glob::Pattern::escape(&cwd.to_string_lossy()));
        let entries = glob::glob(&pattern).map_err(|e| CoverageError::Pattern {
            pattern: pattern.clone(),
            message: e.msg.to_string(),
        })?;

        let mut added = 0;
        for path in entries.filter_map(Result::ok) {
            if !path.is_file() || !self.matcher.should_instrument(&path) {
                continue;
            }
            let key = path.to_string_lossy().into_owned();
            if self.handle.with(|c| c.contains(&key)) {
                continue;
            }
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            match self.instrumenter.instrument(&source, &path) {
                Ok(out) => {
                    let mut record = out.record;
                    record.reset_hits();
                    record.instrumented_at = now_millis();
                    let _ = self.handle.register(record);
                    added += 1;
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping untouched file");
                }
            }
        }
        tracing::debug!(added, "registered untouched files");
        Ok(added)
    }

    fn instrument_one(&self, path: &Path, source: &str) -> LoadedSource {
        let passthrough = || LoadedSource {
            path: path.to_path_buf(),
            code: source.to_string(),
            probe: None,
        };

        if !self.matcher.should_instrument(path) || self.instrumenter.is_instrumented(source) {
            return passthrough();
        }

        match self.instrumenter.instrument(source, path) {
            Ok(out) => {
                tracing::debug!(path = %path.display(), "instrumented");
                let mut record = out.record;
                record.path = path.to_string_lossy().into_owned();
                record.instrumented_at = now_millis();
                let probe = self.handle.register(record);
                LoadedSource {
                    path: path.to_path_buf(),
                    code: out.code,
                    probe: Some(probe),
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "instrumentation failed; file excluded from coverage for this session"
                );
                self.handle.with(|c| {
                    c.record_diagnostic(path.to_string_lossy(), e.to_string());
                });
                passthrough()
            }
        }
    }
}

impl SourceProvider for CoverageLoader {
    fn load(&self, path: &Path) -> CoverageResult<LoadedSource> {
        let absolute = absolutize(&self.matcher.config().cwd, path);
        let source =
            std::fs::read_to_string(&absolute).map_err(|e| CoverageError::io(&absolute, e))?;
        Ok(self.transform(&absolute, &source))
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
