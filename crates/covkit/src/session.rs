//! Coverage sessions
//!
//! A session ties together one collector, the loader feeding it and the
//! finalizer that dumps and reports it. The finalizer runs exactly once,
//! whichever of these gets there first:
//!
//! - [`CoverageSession::finish`], which returns errors to the caller
//! - dropping the session (normal scope exit or panic unwinding), which logs
//!   errors
//! - [`SessionFinalizer::fire`], for hosts that wire it into their own
//!   signal handling
//! - SIGINT or SIGTERM, when [`SetupOptions::finalize_on_signal`] is set;
//!   the process then exits with [`crate::SIGNAL_EXIT_CODE`]
//!
//! `std::process::exit` and `panic = "abort"` skip finalization entirely.
//!
//! ```text
//! Init ──setup──► Running ──finalize──► Finalizing ──► Finished
//! ```
//!
//! Hits arriving after finalization starts are ignored.

use crate::config::Config;
use crate::coverage::{CoverageHandle, Diagnostic, SessionId};
use crate::instrument::Instrumenter;
use crate::loader::CoverageLoader;
use crate::matcher::FileMatcher;
use crate::persist::{RawPersister, RunIdentifier};
use crate::report::{validate_session_name, ReportGenerator};
use crate::result::{CoverageError, CoverageResult};
use crate::termination;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// What the finalizer does
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOptions {
    /// Render reports into `<report-dir>/<session-name>/`
    pub save_report: bool,
    /// Dump the raw artifact into `<report-dir>/raw/`
    pub save_raw_data: bool,
    /// Raw artifact name; defaults to the session name
    pub run_id: Option<String>,
    /// Finalize on SIGINT/SIGTERM, then exit the process
    pub finalize_on_signal: bool,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            save_report: true,
            save_raw_data: true,
            run_id: None,
            finalize_on_signal: false,
        }
    }
}

impl SetupOptions {
    /// Override the raw artifact name
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Finalize on SIGINT/SIGTERM
    #[must_use]
    pub fn with_finalize_on_signal(mut self) -> Self {
        self.finalize_on_signal = true;
        self
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, loader not yet available
    Init,
    /// Collecting hits
    Running,
    /// Finalizer in progress
    Finalizing,
    /// Finalizer done
    Finished,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// What finalization produced
#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    /// Raw artifact written, if raw data was saved
    pub raw_artifact: Option<PathBuf>,
    /// Report files written
    pub reports: Vec<PathBuf>,
    /// Files excluded because instrumentation failed
    pub diagnostics: Vec<Diagnostic>,
    /// Never-loaded files added with zero counts
    pub untouched_added: usize,
}

struct SessionInner {
    name: String,
    /// Raw artifact name
    run: RunIdentifier,
    /// Report directory name under the report dir
    label: String,
    options: SetupOptions,
    all: bool,
    loader: CoverageLoader,
    persister: RawPersister,
    reports: ReportGenerator,
    state: Mutex<SessionState>,
}

impl SessionInner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` when another caller already finalized
    fn finalize_once(&self) -> CoverageResult<Option<SessionOutcome>> {
        {
            let mut state = self.state();
            if *state != SessionState::Running {
                return Ok(None);
            }
            *state = SessionState::Finalizing;
        }
        let result = self.finalize();
        *self.state() = SessionState::Finished;
        result.map(Some)
    }

    fn finalize(&self) -> CoverageResult<SessionOutcome> {
        let mut outcome = SessionOutcome::default();
        if self.all {
            outcome.untouched_added = self.loader.instrument_untouched()?;
        }

        let (map, diagnostics) = self.loader.handle().with(|collector| {
            collector.seal();
            (collector.snapshot(), collector.diagnostics().to_vec())
        });
        for diagnostic in &diagnostics {
            tracing::warn!(path = %diagnostic.path, message = %diagnostic.message, "file excluded from coverage");
        }
        outcome.diagnostics = diagnostics;

        if self.options.save_raw_data {
            outcome.raw_artifact = Some(self.persister.persist(&map, &self.run)?);
        }
        if self.options.save_report {
            outcome.reports = self.reports.render(&map, &self.label)?;
        }

        tracing::info!(
            session = %self.name,
            files = map.len(),
            diagnostics = outcome.diagnostics.len(),
            "coverage session finalized"
        );
        Ok(outcome)
    }
}

/// A running coverage session
pub struct CoverageSession {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for CoverageSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageSession")
            .field("name", &self.inner.name)
            .field("id", &self.session_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CoverageSession {
    /// Build the matcher, collector and loader for `config` and start
    /// collecting.
    ///
    /// The raw artifact is named after `options.run_id`, else `name`, else
    /// the process id; reports go under `name`, else that same run id. Names
    /// that could not be written as one entry of the report directory are
    /// rejected here rather than at finalization.
    pub fn start(
        name: impl Into<String>,
        config: &Config,
        options: SetupOptions,
        instrumenter: Arc<dyn Instrumenter>,
    ) -> CoverageResult<Self> {
        let name = name.into();
        let run = RunIdentifier::from_name(options.run_id.as_deref().or(Some(name.as_str())));
        let label = if name.is_empty() {
            run.to_string()
        } else {
            name.clone()
        };
        if options.save_raw_data {
            run.validate()?;
        }
        if options.save_report {
            validate_session_name(&label)?;
        }

        let matcher = FileMatcher::new(config.match_config())?;
        let report_dir = config.report_dir();
        let finalize_on_signal = options.finalize_on_signal;
        let inner = Arc::new(SessionInner {
            run,
            label,
            loader: CoverageLoader::new(matcher, instrumenter, CoverageHandle::new()),
            persister: RawPersister::new(&report_dir),
            reports: ReportGenerator::new(config.report_config()),
            all: config.all,
            options,
            name,
            state: Mutex::new(SessionState::Init),
        });
        if finalize_on_signal {
            termination::register(WeakFinalizer(Arc::downgrade(&inner)))?;
        }
        *inner.state() = SessionState::Running;

        tracing::info!(
            session = %inner.name,
            id = %inner.loader.handle().session_id(),
            cwd = %inner.loader.matcher().config().cwd.display(),
            report_dir = %report_dir.display(),
            "coverage session started"
        );
        Ok(Self { inner })
    }

    /// Session name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Unique session id
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.loader.handle().session_id()
    }

    /// Source provider instrumenting matched files into this session
    #[must_use]
    pub fn loader(&self) -> &CoverageLoader {
        &self.inner.loader
    }

    /// Collector handle
    #[must_use]
    pub fn handle(&self) -> &CoverageHandle {
        self.inner.loader.handle()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state()
    }

    /// A detached trigger for the finalizer
    #[must_use]
    pub fn finalizer(&self) -> SessionFinalizer {
        SessionFinalizer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Finalize now and return what was written.
    ///
    /// Fails with [`CoverageError::InvalidState`] if a [`SessionFinalizer`]
    /// already ran the finalizer.
    pub fn finish(self) -> CoverageResult<SessionOutcome> {
        self.inner.finalize_once()?.ok_or_else(|| {
            CoverageError::invalid_state(format!("session {:?} already finalized", self.inner.name))
        })
    }
}

impl Drop for CoverageSession {
    fn drop(&mut self) {
        if let Err(e) = self.inner.finalize_once() {
            tracing::error!(session = %self.inner.name, error = %e, "coverage finalization failed");
        }
    }
}

/// Cloneable trigger for a session's finalizer
#[derive(Clone)]
pub struct SessionFinalizer {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for SessionFinalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFinalizer")
            .field("session", &self.inner.name)
            .finish()
    }
}

impl SessionFinalizer {
    /// Run the finalizer unless it already ran. Returns `None` when another
    /// trigger got there first.
    pub fn fire(&self) -> CoverageResult<Option<SessionOutcome>> {
        self.inner.finalize_once()
    }

    /// Whether the finalizer has completed
    #[must_use]
    pub fn is_finished(&self) -> bool {
        *self.inner.state() == SessionState::Finished
    }
}

/// Finalizer reference that does not keep its session alive
pub(crate) struct WeakFinalizer(Weak<SessionInner>);

impl WeakFinalizer {
    /// `Ok(None)` when the session is gone or already finalized
    pub(crate) fn fire(&self) -> CoverageResult<Option<SessionOutcome>> {
        match self.0.upgrade() {
            Some(inner) => inner.finalize_once(),
            None => Ok(None),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coverage::StatementId;
    use crate::instrument::LineInstrumenter;
    use crate::loader::SourceProvider;
    use crate::merge::Merger;
    use crate::persist::RAW_DIR_NAME;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/used.js"), "let a = 1;\nlet b = 2;\n").unwrap();
        fs::write(dir.path().join("src/unused.js"), "idle();\n").unwrap();
        dir
    }

    fn start(name: &str, config: &Config, options: SetupOptions) -> CoverageSession {
        CoverageSession::start(name, config, options, Arc::new(LineInstrumenter::new())).unwrap()
    }

    #[test]
    fn test_finish_writes_raw_and_report() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let session = start("unit", &config, SetupOptions::default());
        assert_eq!(session.state(), SessionState::Running);

        let loaded = session.loader().load(Path::new("src/used.js")).unwrap();
        loaded.probe.unwrap().statement(StatementId::new(0));

        let outcome = session.finish().unwrap();
        let raw = outcome.raw_artifact.unwrap();
        assert_eq!(raw, dir.path().join("coverage/raw/unit.json"));
        assert_eq!(
            outcome.reports,
            vec![dir.path().join("coverage/unit/text-summary.txt")]
        );

        let merged = Merger::new(dir.path().join("coverage/raw")).merge_all().unwrap();
        let key = dir.path().join("src/used.js").to_string_lossy().into_owned();
        assert_eq!(merged.map.get(&key).unwrap().s[&StatementId::new(0)], 1);
    }

    #[test]
    fn test_drop_finalizes() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        {
            let session = start("dropped", &config, SetupOptions::default());
            let _ = session.loader().load(Path::new("src/used.js")).unwrap();
        }
        assert!(dir.path().join("coverage/raw/dropped.json").exists());
    }

    #[test]
    fn test_finalizer_runs_exactly_once() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let session = start("once", &config, SetupOptions::default());
        let finalizer = session.finalizer();

        assert!(finalizer.fire().unwrap().is_some());
        assert!(finalizer.is_finished());
        assert!(finalizer.fire().unwrap().is_none());
        assert!(matches!(
            session.finish().unwrap_err(),
            CoverageError::InvalidState { .. }
        ));
    }

    #[test]
    fn test_finalizer_from_other_threads() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let session = start("threads", &config, SetupOptions::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let finalizer = session.finalizer();
                std::thread::spawn(move || finalizer.fire().unwrap().is_some())
            })
            .collect();
        let fired: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(fired, 1);
        assert_eq!(session.state(), SessionState::Finished);
    }

    #[test]
    fn test_hits_after_finalization_are_ignored() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let session = start(
            "late",
            &config,
            SetupOptions {
                save_report: false,
                ..SetupOptions::default()
            },
        );
        let probe = session
            .loader()
            .load(Path::new("src/used.js"))
            .unwrap()
            .probe
            .unwrap();
        let _ = session.finalizer().fire().unwrap();
        probe.statement(StatementId::new(0));

        let key = dir.path().join("src/used.js").to_string_lossy().into_owned();
        assert_eq!(session.handle().snapshot().get(&key).unwrap().s[&StatementId::new(0)], 0);
    }

    #[test]
    fn test_run_id_and_options() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let options = SetupOptions {
            save_report: false,
            ..SetupOptions::default()
        }
        .with_run_id("worker-3");
        let outcome = start("unit", &config, options).finish().unwrap();
        assert_eq!(
            outcome.raw_artifact.unwrap(),
            dir.path().join("coverage/raw/worker-3.json")
        );
        assert!(outcome.reports.is_empty());
        assert!(!dir.path().join("coverage/unit").exists());
    }

    #[test]
    fn test_empty_name_falls_back_to_pid() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let outcome = start("", &config, SetupOptions::default())
            .finish()
            .unwrap();
        let expected = format!("pid_{}.json", std::process::id());
        assert!(outcome.raw_artifact.unwrap().ends_with(expected));
    }

    #[test]
    fn test_nothing_saved() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let options = SetupOptions {
            save_report: false,
            save_raw_data: false,
            ..SetupOptions::default()
        };
        let outcome = start("quiet", &config, options).finish().unwrap();
        assert!(outcome.raw_artifact.is_none());
        assert!(!dir.path().join("coverage").exists());
    }

    #[test]
    fn test_all_adds_untouched_files() {
        let dir = project();
        let config = Config {
            all: true,
            ..Config::with_cwd(dir.path())
        };
        let session = start("all", &config, SetupOptions::default());
        let _ = session.loader().load(Path::new("src/used.js")).unwrap();
        let outcome = session.finish().unwrap();
        assert_eq!(outcome.untouched_added, 1);

        let merged = Merger::new(dir.path().join("coverage/raw")).merge_all().unwrap();
        let unused = dir.path().join("src/unused.js").to_string_lossy().into_owned();
        let record = merged.map.get(&unused).unwrap();
        assert!(record.s.values().all(|c| *c == 0));
    }

    #[test]
    fn test_unknown_reporter_fails_finish() {
        let dir = project();
        let config = Config {
            reporter: Some(vec!["clover".to_string()]),
            ..Config::with_cwd(dir.path())
        };
        let err = start("bad", &config, SetupOptions::default())
            .finish()
            .unwrap_err();
        assert!(matches!(err, CoverageError::UnknownReporter { .. }));
        assert!(dir.path().join("coverage/raw/bad.json").exists());
    }

    #[test]
    fn test_names_are_checked_at_start() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let start_err = |name: &str, options: SetupOptions| {
            CoverageSession::start(name, &config, options, Arc::new(LineInstrumenter::new()))
                .unwrap_err()
        };

        let err = start_err(RAW_DIR_NAME, SetupOptions::default());
        assert!(matches!(err, CoverageError::InvalidName { .. }));
        let err = start_err("../escape", SetupOptions::default());
        assert!(matches!(err, CoverageError::InvalidName { .. }));
        let err = start_err("unit", SetupOptions::default().with_run_id("a/b"));
        assert!(matches!(err, CoverageError::InvalidName { .. }));

        // `raw` only clashes with the report directory
        let options = SetupOptions {
            save_report: false,
            ..SetupOptions::default()
        };
        let outcome = start(RAW_DIR_NAME, &config, options).finish().unwrap();
        assert_eq!(
            outcome.raw_artifact.unwrap(),
            dir.path().join("coverage/raw/raw.json")
        );
    }

    #[test]
    fn test_all_respects_extension_allowlist() {
        let dir = project();
        fs::write(dir.path().join("src/notes.md"), "# notes\n").unwrap();
        fs::write(dir.path().join("src/data.json"), "{}\n").unwrap();
        let config = Config {
            all: true,
            include: Some(vec!["src/**".to_string()]),
            extension: Some(vec![".js".to_string()]),
            ..Config::with_cwd(dir.path())
        };
        let session = start("ext", &config, SetupOptions::default());
        let _ = session.loader().load(Path::new("src/used.js")).unwrap();
        let outcome = session.finish().unwrap();
        assert_eq!(outcome.untouched_added, 1);

        let merged = Merger::new(dir.path().join("coverage/raw")).merge_all().unwrap();
        assert_eq!(merged.map.len(), 2);
        let notes = dir.path().join("src/notes.md").to_string_lossy().into_owned();
        assert!(!merged.map.contains(&notes));
    }

    #[test]
    fn test_signal_finalizes_registered_sessions() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let session = start(
            "signalled",
            &config,
            SetupOptions::default().with_finalize_on_signal(),
        );
        let probe = session
            .loader()
            .load(Path::new("src/used.js"))
            .unwrap()
            .probe
            .unwrap();
        probe.statement(StatementId::new(1));

        assert_eq!(termination::fire_registered(), 1);
        assert_eq!(session.state(), SessionState::Finished);
        let merged = Merger::new(dir.path().join("coverage/raw")).merge_all().unwrap();
        let key = dir.path().join("src/used.js").to_string_lossy().into_owned();
        assert_eq!(merged.map.get(&key).unwrap().s[&StatementId::new(1)], 1);

        // already finalized; dropping writes nothing new
        assert_eq!(termination::fire_registered(), 0);
        drop(session);
    }

    #[test]
    fn test_dropped_session_is_skipped_by_signal() {
        let dir = project();
        let config = Config::with_cwd(dir.path());
        let weak = {
            let session = start(
                "gone",
                &config,
                SetupOptions {
                    save_report: false,
                    ..SetupOptions::default()
                },
            );
            WeakFinalizer(Arc::downgrade(&session.inner))
        };
        assert!(!weak.is_alive());
        assert!(weak.fire().unwrap().is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Finalizing.to_string(), "finalizing");
    }
}
