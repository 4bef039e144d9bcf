//! Coverage configuration
//!
//! Read from `coverage.config.json` at the project root. Every field is
//! optional:
//!
//! ```json
//! {
//!   "cwd": "packages/app",
//!   "extension": [".js"],
//!   "include": ["src/**"],
//!   "exclude": ["src/**/*.test.js"],
//!   "report-dir": "coverage",
//!   "reporter": ["text-summary", "lcov"],
//!   "watermarks": { "statements": [50, 80] },
//!   "all": true
//! }
//! ```
//!
//! A missing file is not an error: defaults apply with `cwd` set to the
//! project root.

use crate::coverage::Watermarks;
use crate::matcher::{absolutize, MatchConfig};
use crate::report::ReportConfig;
use crate::result::{CoverageError, CoverageResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Config file looked up when the caller names none
pub const DEFAULT_CONFIG_FILE: &str = "coverage.config.json";

/// Report directory name under `cwd` when none is configured
pub const REPORT_DIR_NAME: &str = "coverage";

/// Project coverage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Root for matching and relative paths; absolute after [`read_config`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Extension allowlist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<Vec<String>>,
    /// Include globs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    /// Exclude globs; replace the defaults when given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    /// Always exclude `node_modules`
    pub exclude_node_modules: bool,
    /// Report never-loaded matching files with zero counts
    pub all: bool,
    /// Report directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
    /// Reporter names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<Vec<String>>,
    /// Watermark bands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermarks: Option<Watermarks>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: None,
            extension: None,
            include: None,
            exclude: None,
            exclude_node_modules: true,
            all: false,
            report_dir: None,
            reporter: None,
            watermarks: None,
        }
    }
}

impl Config {
    /// Config rooted at `cwd` with every other field defaulted
    #[must_use]
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }

    /// Effective `cwd`
    #[must_use]
    pub fn cwd(&self) -> PathBuf {
        self.cwd.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Effective report directory: absolute `report-dir` as-is, relative
    /// resolved against `cwd`, absent means `<cwd>/coverage`
    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        let cwd = self.cwd();
        match &self.report_dir {
            Some(dir) => absolutize(&cwd, dir),
            None => cwd.join(REPORT_DIR_NAME),
        }
    }

    /// Matcher inputs. The report directory is always excluded when it lies
    /// under `cwd`, so prior output is never instrumented.
    #[must_use]
    pub fn match_config(&self) -> MatchConfig {
        let cwd = self.cwd();
        let mut config = MatchConfig::new(&cwd);
        if let Some(extensions) = &self.extension {
            config = config.with_extensions(extensions.iter().cloned());
        }
        if let Some(include) = &self.include {
            config = config.with_include(include.iter().cloned());
        }
        if let Some(exclude) = &self.exclude {
            config = config.with_exclude(exclude.iter().cloned());
        }
        config.exclude_node_modules = self.exclude_node_modules;

        if let Ok(relative) = self.report_dir().strip_prefix(absolutize(&cwd, Path::new("."))) {
            if !relative.as_os_str().is_empty() {
                let pattern = format!("{}/**", relative.to_string_lossy().replace('\\', "/"));
                if !config.exclude.contains(&pattern) {
                    config.exclude.push(pattern);
                }
            }
        }
        config
    }

    /// Report settings
    #[must_use]
    pub fn report_config(&self) -> ReportConfig {
        let config = ReportConfig::new(self.report_dir())
            .with_reporters(self.reporter.iter().flatten().cloned());
        match self.watermarks {
            Some(watermarks) => config.with_watermarks(watermarks),
            None => config,
        }
    }
}

/// Load and normalize `<project_root>/<config_file_name>`.
///
/// A missing file yields defaults. A relative `cwd` is resolved against
/// `project_root`; an absent one becomes `project_root`.
pub fn read_config(project_root: &Path, config_file_name: Option<&str>) -> CoverageResult<Config> {
    let path = project_root.join(config_file_name.unwrap_or(DEFAULT_CONFIG_FILE));
    let mut config = match fs::read_to_string(&path) {
        Ok(text) => {
            tracing::debug!(path = %path.display(), "reading coverage config");
            serde_json::from_str::<Config>(&text)
                .map_err(|source| CoverageError::ConfigParse { path, source })?
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no coverage config, using defaults");
            Config::default()
        }
        Err(e) => return Err(CoverageError::io(&path, e)),
    };

    let root = absolutize(project_root, Path::new("."));
    config.cwd = Some(match config.cwd.take() {
        Some(cwd) => absolutize(&root, &cwd),
        None => root,
    });
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::matcher::FileMatcher;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) {
        fs::write(dir.join(DEFAULT_CONFIG_FILE), body).unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = read_config(dir.path(), None).unwrap();
        assert_eq!(config.cwd.as_deref(), Some(dir.path()));
        assert!(config.exclude_node_modules);
        assert!(!config.all);
        assert_eq!(config.report_dir(), dir.path().join("coverage"));
        assert_eq!(config.report_config().reporters, vec!["text-summary".to_string()]);
    }

    #[test]
    fn test_relative_cwd_resolved_against_root() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), r#"{"cwd": "packages/app", "report-dir": "out"}"#);
        let config = read_config(dir.path(), None).unwrap();
        let cwd = dir.path().join("packages/app");
        assert_eq!(config.cwd.as_deref(), Some(cwd.as_path()));
        assert_eq!(config.report_dir(), cwd.join("out"));
    }

    #[test]
    fn test_absolute_report_dir_used_as_is() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("elsewhere");
        write_config(
            dir.path(),
            &serde_json::json!({ "report-dir": out }).to_string(),
        );
        let config = read_config(dir.path(), None).unwrap();
        assert_eq!(config.report_dir(), out);
    }

    #[test]
    fn test_custom_file_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cov.json"), r#"{"reporter": ["lcov", "json"]}"#).unwrap();
        let config = read_config(dir.path(), Some("cov.json")).unwrap();
        assert_eq!(config.report_config().reporters, vec!["lcov", "json"]);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "{ not json");
        let err = read_config(dir.path(), None).unwrap_err();
        assert!(matches!(err, CoverageError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), r#"{"all": true, "check-coverage": true}"#);
        assert!(read_config(dir.path(), None).unwrap().all);
    }

    #[test]
    fn test_partial_watermarks() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), r#"{"watermarks": {"lines": [10, 20]}}"#);
        let report = read_config(dir.path(), None).unwrap().report_config();
        assert_eq!(report.watermarks.lines, [10.0, 20.0]);
        assert_eq!(report.watermarks.statements, Watermarks::default().statements);
    }

    #[test]
    fn test_match_config_projection() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{"include": ["src/**/*.js"], "exclude": ["src/**/*.test.js"], "extension": [".js"]}"#,
        );
        let config = read_config(dir.path(), None).unwrap();
        let matcher = FileMatcher::new(config.match_config()).unwrap();
        assert!(matcher.should_instrument(&dir.path().join("src/a.js")));
        assert!(!matcher.should_instrument(&dir.path().join("src/a.test.js")));
    }

    #[test]
    fn test_report_dir_always_excluded() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), r#"{"exclude": [], "report-dir": "out/cov"}"#);
        let config = read_config(dir.path(), None).unwrap();
        let match_config = config.match_config();
        assert_eq!(match_config.exclude, vec!["out/cov/**".to_string()]);
        let matcher = FileMatcher::new(match_config).unwrap();
        assert!(!matcher.should_instrument(&dir.path().join("out/cov/unit/x.js")));
        assert!(matcher.should_instrument(&dir.path().join("lib/x.js")));
    }

    #[test]
    fn test_serialized_config_uses_kebab_case() {
        let config = Config {
            report_dir: Some(PathBuf::from("out")),
            ..Config::with_cwd("/proj")
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"report-dir\":\"out\""));
        assert!(json.contains("\"exclude-node-modules\":true"));
    }
}
