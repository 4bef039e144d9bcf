//! File matching: decides which source files get instrumented
//!
//! Resolution order for a path:
//!
//! 1. normalize it relative to `cwd` (paths outside `cwd` never match)
//! 2. any exclude pattern matches → not instrumented
//! 3. extension not allowlisted → not instrumented
//! 4. include patterns given → instrumented iff one matches
//!
//! Exclude always wins over include.

use crate::result::{CoverageError, CoverageResult};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Extensions instrumented when the config names none
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".cjs", ".mjs", ".ts", ".tsx", ".jsx"];

/// Excludes applied when the config names none: tests, prior reports, type
/// declarations.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "coverage/**",
    "packages/*/test/**",
    "packages/*/tests/**",
    "**/*.d.ts",
    "test/**",
    "tests/**",
    "test.*",
    "test-*.*",
    "**/*.test.*",
    "**/*.spec.*",
    "**/*-test.*",
    "**/*-spec.*",
    "**/__tests__/**",
];

const NODE_MODULES: &str = "**/node_modules/**";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Inputs to the matcher, fixed for the life of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Directory patterns are relative to
    pub cwd: PathBuf,
    /// Extension allowlist, with leading dots
    pub extensions: Vec<String>,
    /// Include globs; empty means "every allowlisted extension"
    pub include: Vec<String>,
    /// Exclude globs
    pub exclude: Vec<String>,
    /// Always exclude `node_modules`
    pub exclude_node_modules: bool,
}

impl MatchConfig {
    /// Matcher inputs rooted at `cwd` with default extensions and excludes
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            include: Vec::new(),
            exclude: DEFAULT_EXCLUDES.iter().map(|e| (*e).to_string()).collect(),
            exclude_node_modules: true,
        }
    }

    /// Replace the include patterns
    #[must_use]
    pub fn with_include<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the exclude patterns
    #[must_use]
    pub fn with_exclude<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the extension allowlist
    #[must_use]
    pub fn with_extensions<S: Into<String>>(mut self, exts: impl IntoIterator<Item = S>) -> Self {
        self.extensions = exts.into_iter().map(Into::into).collect();
        self
    }
}

/// Compiled matcher
#[derive(Debug, Clone)]
pub struct FileMatcher {
    config: MatchConfig,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FileMatcher {
    /// Compile the include/exclude globs of `config`
    pub fn new(config: MatchConfig) -> CoverageResult<Self> {
        let include = compile(&config.include)?;
        let mut exclude = compile(&config.exclude)?;
        if config.exclude_node_modules {
            exclude.extend(compile(&[NODE_MODULES.to_string()])?);
        }
        Ok(Self {
            config,
            include,
            exclude,
        })
    }

    /// The configuration this matcher was built from
    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Whether `path` should be instrumented
    #[must_use]
    pub fn should_instrument(&self, path: &Path) -> bool {
        let Some(relative) = self.relative(path) else {
            return false;
        };
        if self
            .exclude
            .iter()
            .any(|p| p.matches_with(&relative, MATCH_OPTIONS))
        {
            return false;
        }
        if !self.has_allowed_extension(&relative) {
            return false;
        }
        self.include.is_empty()
            || self
                .include
                .iter()
                .any(|p| p.matches_with(&relative, MATCH_OPTIONS))
    }

    /// An empty allowlist accepts every extension
    fn has_allowed_extension(&self, relative: &str) -> bool {
        self.config.extensions.is_empty()
            || self
                .config
                .extensions
                .iter()
                .any(|ext| relative.ends_with(ext.as_str()))
    }

    /// `path` relative to `cwd` with `/` separators, or `None` if outside
    fn relative(&self, path: &Path) -> Option<String> {
        let absolute = absolutize(&self.config.cwd, path);
        let cwd = normalize(&self.config.cwd);
        let relative = absolute.strip_prefix(&cwd).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }
}

/// Resolve `path` against `base` and normalize `.`/`..` lexically
#[must_use]
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let _ = out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn compile(patterns: &[String]) -> CoverageResult<Vec<Pattern>> {
    let mut compiled = Vec::with_capacity(patterns.len() * 2);
    for raw in patterns {
        let pattern = raw.trim_start_matches("./");
        compiled.push(parse(pattern)?);
        // A bare directory pattern also covers everything below it.
        if !pattern.ends_with("**") {
            compiled.push(parse(&format!("{}/**", pattern.trim_end_matches('/')))?);
        }
    }
    Ok(compiled)
}

fn parse(pattern: &str) -> CoverageResult<Pattern> {
    Pattern::new(pattern).map_err(|e| CoverageError::Pattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })
}
