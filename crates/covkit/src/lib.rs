//! Covkit: per-process source coverage that merges
//!
//! Each test process runs a [`CoverageSession`]: a [`CoverageLoader`] hands
//! the harness instrumented source for every file the [`FileMatcher`]
//! accepts, the instrumented code counts hits into the session's collector,
//! and the finalizer dumps a raw artifact and renders reports. Any number of
//! raw artifacts, from any number of processes, merge into one map.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────────┐
//! │ FileMatcher  │──►│ CoverageLoader│──►│ CoverageCollector│
//! └──────────────┘   │ + Instrumenter│   └────────┬────────┘
//!                    └───────────────┘            │ finalize
//!                                                 ▼
//! ┌─────────────────┐   ┌────────┐   ┌──────────────────────┐
//! │ ReportGenerator │◄──│ Merger │◄──│ <report-dir>/raw/*.json│
//! └─────────────────┘   └────────┘   └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use covkit::{read_config, setup_coverage, SetupOptions, SourceProvider};
//! use std::path::Path;
//!
//! # fn main() -> covkit::CoverageResult<()> {
//! let config = read_config(Path::new("."), None)?;
//! let session = setup_coverage("unit", &config, SetupOptions::default())?;
//! let source = session.loader().load(Path::new("src/app.js"))?;
//! // ... execute `source.code`, reporting hits through `source.probe` ...
//! let outcome = session.finish()?;
//! println!("raw artifact: {:?}", outcome.raw_artifact);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::cast_possible_truncation))]

#[allow(clippy::cast_precision_loss, clippy::missing_errors_doc)]
mod config;
#[allow(clippy::cast_precision_loss, clippy::missing_errors_doc)]
pub mod coverage;
mod instrument;
#[allow(clippy::missing_errors_doc)]
mod loader;
#[allow(clippy::missing_errors_doc)]
mod matcher;
#[allow(clippy::missing_errors_doc)]
mod merge;
#[allow(clippy::missing_errors_doc)]
mod persist;
#[allow(clippy::cast_precision_loss, clippy::missing_errors_doc)]
pub mod report;
mod result;
#[allow(clippy::missing_errors_doc)]
mod session;
mod termination;

pub use config::{read_config, Config, DEFAULT_CONFIG_FILE, REPORT_DIR_NAME};
pub use coverage::{
    CoverageCollector, CoverageHandle, CoverageMap, CoverageSummary, Diagnostic,
    FileCoverageRecord, FileProbe, Level, MapSummary, Metric, SessionId, Totals, Watermarks,
};
pub use instrument::{
    InstrumentError, Instrumented, Instrumenter, LineInstrumenter, INSTRUMENTED_HEADER,
};
pub use loader::{CoverageLoader, FsSourceProvider, LoadedSource, SourceProvider};
pub use matcher::{absolutize, FileMatcher, MatchConfig, DEFAULT_EXCLUDES, DEFAULT_EXTENSIONS};
pub use merge::{read_artifact, MergeOutcome, Merger, SkippedArtifact};
pub use persist::{validate_segment, RawPersister, RunIdentifier, RAW_DIR_NAME};
pub use report::{
    validate_session_name, ReportConfig, ReportGenerator, Reporter, DEFAULT_REPORTER,
    REPORTER_NAMES,
};
pub use result::{CoverageError, CoverageResult};
pub use session::{CoverageSession, SessionFinalizer, SessionOutcome, SessionState, SetupOptions};
pub use termination::SIGNAL_EXIT_CODE;

use std::sync::Arc;

/// Start a coverage session using the built-in [`LineInstrumenter`].
///
/// The returned session must be kept alive while tests run; its finalizer
/// fires on [`CoverageSession::finish`], on drop, or through
/// [`CoverageSession::finalizer`].
///
/// # Errors
///
/// Returns an error if an include or exclude pattern does not compile.
pub fn setup_coverage(
    session_name: &str,
    config: &Config,
    options: SetupOptions,
) -> CoverageResult<CoverageSession> {
    setup_coverage_with(session_name, config, options, Arc::new(LineInstrumenter::new()))
}

/// [`setup_coverage`] with a caller-supplied instrumenter
///
/// # Errors
///
/// Returns an error if an include or exclude pattern does not compile.
pub fn setup_coverage_with(
    session_name: &str,
    config: &Config,
    options: SetupOptions,
    instrumenter: Arc<dyn Instrumenter>,
) -> CoverageResult<CoverageSession> {
    CoverageSession::start(session_name, config, options, instrumenter)
}

/// Merge every raw artifact under `<report-dir>/raw/` and render the result
/// into `<report-dir>/<session_name>/`.
///
/// # Errors
///
/// Returns an error for a session name that is not a single path segment or
/// names the raw directory, an unknown reporter name or a failed report
/// write. Malformed artifacts are skipped, not errors.
pub fn merge_coverage_from_raw(session_name: &str, config: &Config) -> CoverageResult<MergeOutcome> {
    validate_session_name(session_name)?;
    let report_dir = config.report_dir();
    let merger = Merger::new(report_dir.join(RAW_DIR_NAME));
    let mut outcome = merger.merge_all()?;
    outcome.reports = ReportGenerator::new(config.report_config()).render(&outcome.map, session_name)?;
    Ok(outcome)
}
