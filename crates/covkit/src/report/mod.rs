//! Report generation
//!
//! Renders a [`CoverageMap`] into one or more formats under
//! `<report-dir>/<session-name>/`. Every reporter receives the same
//! read-only [`ReportContext`]; the map itself is never modified.
//!
//! | name           | output file               |
//! |----------------|---------------------------|
//! | `text-summary` | `text-summary.txt` (+ stdout) |
//! | `text`         | `text.txt` (+ stdout)     |
//! | `json`         | `coverage-final.json`     |
//! | `json-summary` | `coverage-summary.json`   |
//! | `lcov`         | `lcov.info`               |
//! | `cobertura`    | `cobertura-coverage.xml`  |

mod cobertura;
mod json;
mod lcov;
mod text;

pub use cobertura::CoberturaReporter;
pub use json::{JsonReporter, JsonSummaryReporter};
pub use lcov::LcovReporter;
pub use text::{TextReporter, TextSummaryReporter};

use crate::coverage::{CoverageMap, Level, MapSummary, Metric, Totals, Watermarks};
use crate::persist::{ensure_dir, validate_segment, RAW_DIR_NAME};
use crate::result::{CoverageError, CoverageResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Reporter used when none is configured
pub const DEFAULT_REPORTER: &str = "text-summary";

/// Reporter names this crate can render
pub const REPORTER_NAMES: &[&str] = &["text-summary", "text", "json", "json-summary", "lcov", "cobertura"];

/// Report settings, fixed for the life of a session
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Root report directory
    pub report_dir: PathBuf,
    /// Reporter names to run, in order
    pub reporters: Vec<String>,
    /// Watermark bands
    pub watermarks: Watermarks,
}

impl ReportConfig {
    /// Default reporters and watermarks under `report_dir`
    #[must_use]
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            reporters: vec![DEFAULT_REPORTER.to_string()],
            watermarks: Watermarks::default(),
        }
    }

    /// Replace the reporter list; an empty list keeps the default
    #[must_use]
    pub fn with_reporters<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if !names.is_empty() {
            self.reporters = names;
        }
        self
    }

    /// Replace the watermarks
    #[must_use]
    pub fn with_watermarks(mut self, watermarks: Watermarks) -> Self {
        self.watermarks = watermarks;
        self
    }
}

/// Shared read-only input to every reporter
#[derive(Debug)]
pub struct ReportContext<'a> {
    /// Coverage being reported
    pub map: &'a CoverageMap,
    /// Per-file and total summaries
    pub summary: MapSummary,
    /// Watermark bands
    pub watermarks: Watermarks,
    /// Session the report is for
    pub session_name: &'a str,
}

impl<'a> ReportContext<'a> {
    /// Build a context, computing summaries once
    #[must_use]
    pub fn new(map: &'a CoverageMap, watermarks: Watermarks, session_name: &'a str) -> Self {
        Self {
            map,
            summary: MapSummary::of_map(map),
            watermarks,
            session_name,
        }
    }

    /// Watermark level of one metric's totals
    #[must_use]
    pub fn level(&self, metric: Metric, totals: Totals) -> Level {
        self.watermarks.classify(metric, totals.pct)
    }
}

/// One output format
pub trait Reporter {
    /// Registered name
    fn name(&self) -> &'static str;

    /// File written under the session report directory
    fn file_name(&self) -> &'static str;

    /// Render the report body
    fn render(&self, ctx: &ReportContext<'_>) -> CoverageResult<String>;

    /// Whether the body is also printed to stdout
    fn echo(&self) -> bool {
        false
    }
}

/// Fails unless `name` can label a report directory: one path segment,
/// and not the raw artifact directory, whose `*.json` every merge reads
pub fn validate_session_name(name: &str) -> CoverageResult<()> {
    validate_segment(name)?;
    if name == RAW_DIR_NAME {
        return Err(CoverageError::invalid_name(
            name,
            "is reserved for raw coverage artifacts",
        ));
    }
    Ok(())
}

/// Look up a reporter by name
#[must_use]
pub fn reporter(name: &str) -> Option<Box<dyn Reporter>> {
    let reporter: Box<dyn Reporter> = match name {
        "text-summary" => Box::new(TextSummaryReporter),
        "text" => Box::new(TextReporter),
        "json" => Box::new(JsonReporter),
        "json-summary" => Box::new(JsonSummaryReporter),
        "lcov" => Box::new(LcovReporter),
        "cobertura" => Box::new(CoberturaReporter),
        _ => return None,
    };
    Some(reporter)
}

/// Renders coverage maps with the configured reporters
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    config: ReportConfig,
}

impl ReportGenerator {
    /// Create a generator
    #[must_use]
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// The generator's configuration
    #[must_use]
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Directory reports for `session_name` are written to
    #[must_use]
    pub fn output_dir(&self, session_name: &str) -> PathBuf {
        self.config.report_dir.join(session_name)
    }

    /// Render `map` with every configured reporter and return the files
    /// written. An invalid session name or an unknown reporter fails before
    /// anything is written.
    pub fn render(&self, map: &CoverageMap, session_name: &str) -> CoverageResult<Vec<PathBuf>> {
        validate_session_name(session_name)?;
        let reporters = self
            .config
            .reporters
            .iter()
            .map(|name| {
                reporter(name).ok_or_else(|| CoverageError::UnknownReporter { name: name.clone() })
            })
            .collect::<CoverageResult<Vec<_>>>()?;

        let dir = self.output_dir(session_name);
        ensure_dir(&dir)?;
        let ctx = ReportContext::new(map, self.config.watermarks, session_name);

        let mut written = Vec::with_capacity(reporters.len());
        for reporter in reporters {
            let body = reporter.render(&ctx)?;
            let path = dir.join(reporter.file_name());
            write_report(&path, &body)?;
            if reporter.echo() {
                println!("{body}");
            }
            tracing::info!(reporter = reporter.name(), path = %path.display(), "report written");
            written.push(path);
        }
        Ok(written)
    }
}

fn write_report(path: &Path, body: &str) -> CoverageResult<()> {
    fs::write(path, body).map_err(|e| CoverageError::io(path, e))
}

/// Format a percentage the way summaries print it: `75`, `33.33`
pub(crate) fn format_pct(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("{pct:.0}")
    } else {
        format!("{pct:.2}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coverage::{FileCoverageRecord, Range};
    use tempfile::TempDir;

    pub(crate) fn sample_map() -> CoverageMap {
        let mut full = FileCoverageRecord::new("/proj/src/full.js");
        let f = full.add_function("main", Range::on_line(1, 0, 4), Range::on_line(1, 0, 40));
        full.hit_function(f);
        for line in 1..=10 {
            let id = full.add_statement(Range::on_line(line, 0, 8));
            full.hit_statement(id);
        }
        let b = full.add_branch("if", Range::on_line(2, 0, 20), vec![Range::on_line(2, 0, 10); 2]);
        full.hit_branch(b, 0);

        let mut none = FileCoverageRecord::new("/proj/src/none.js");
        for line in 1..=10 {
            let _ = none.add_statement(Range::on_line(line, 0, 8));
        }
        [full, none].into_iter().collect()
    }

    #[test]
    fn test_render_default_reporter() {
        let dir = TempDir::new().unwrap();
        let generator = ReportGenerator::new(ReportConfig::new(dir.path()));
        let written = generator.render(&sample_map(), "unit").unwrap();
        assert_eq!(written, vec![dir.path().join("unit/text-summary.txt")]);
        let body = fs::read_to_string(&written[0]).unwrap();
        assert!(body.contains("Statements   : 50% ( 10/20 )"));
    }

    #[test]
    fn test_render_every_reporter() {
        let dir = TempDir::new().unwrap();
        let config = ReportConfig::new(dir.path()).with_reporters(REPORTER_NAMES.iter().copied());
        let written = ReportGenerator::new(config)
            .render(&sample_map(), "merged")
            .unwrap();
        assert_eq!(written.len(), REPORTER_NAMES.len());
        for path in &written {
            assert!(path.starts_with(dir.path().join("merged")));
            assert!(path.exists());
        }
    }

    #[test]
    fn test_unknown_reporter_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = ReportConfig::new(dir.path()).with_reporters(["lcov", "clover"]);
        let err = ReportGenerator::new(config)
            .render(&sample_map(), "unit")
            .unwrap_err();
        assert!(matches!(err, CoverageError::UnknownReporter { ref name } if name == "clover"));
        assert!(!dir.path().join("unit").exists());
    }

    #[test]
    fn test_session_name_must_stay_inside_report_dir() {
        let dir = TempDir::new().unwrap();
        let report_dir = dir.path().join("coverage");
        let generator = ReportGenerator::new(ReportConfig::new(&report_dir).with_reporters(["json"]));
        for name in [RAW_DIR_NAME, "../escaped", "a/b", ""] {
            let err = generator.render(&sample_map(), name).unwrap_err();
            assert!(matches!(err, CoverageError::InvalidName { .. }), "{name:?}");
        }
        assert!(!report_dir.exists());
        assert!(!dir.path().join("escaped").exists());
    }

    #[test]
    fn test_render_does_not_mutate_map() {
        let dir = TempDir::new().unwrap();
        let map = sample_map();
        let before = map.clone();
        let _ = ReportGenerator::new(ReportConfig::new(dir.path()).with_reporters(["json"]))
            .render(&map, "unit")
            .unwrap();
        assert_eq!(map, before);
    }

    #[test]
    fn test_empty_reporter_list_keeps_default() {
        let config = ReportConfig::new("/r").with_reporters(Vec::<String>::new());
        assert_eq!(config.reporters, vec![DEFAULT_REPORTER.to_string()]);
    }

    #[test]
    fn test_format_pct() {
        assert_eq!(format_pct(100.0), "100");
        assert_eq!(format_pct(33.33), "33.33");
        assert_eq!(format_pct(50.5), "50.50");
    }
}
