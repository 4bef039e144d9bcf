//! Coverage summaries and watermark classification
//!
//! Summaries are computed per file and in aggregate for four metrics:
//! lines, statements, functions and branches.

use super::{CoverageMap, FileCoverageRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A coverage metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Source lines holding at least one statement
    Lines,
    /// Statements
    Statements,
    /// Functions
    Functions,
    /// Branch arms
    Branches,
}

impl Metric {
    /// All metrics in report order
    pub const ALL: [Self; 4] = [Self::Statements, Self::Branches, Self::Functions, Self::Lines];

    /// Lowercase metric name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lines => "lines",
            Self::Statements => "statements",
            Self::Functions => "functions",
            Self::Branches => "branches",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Watermark band a percentage falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Below the low watermark
    Low,
    /// Between the watermarks
    Medium,
    /// At or above the high watermark
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

const DEFAULT_BAND: [f64; 2] = [50.0, 80.0];

/// `[low, high]` thresholds per metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Watermarks {
    /// Statement thresholds
    pub statements: [f64; 2],
    /// Function thresholds
    pub functions: [f64; 2],
    /// Branch thresholds
    pub branches: [f64; 2],
    /// Line thresholds
    pub lines: [f64; 2],
}

impl Default for Watermarks {
    fn default() -> Self {
        Self {
            statements: DEFAULT_BAND,
            functions: DEFAULT_BAND,
            branches: DEFAULT_BAND,
            lines: DEFAULT_BAND,
        }
    }
}

impl Watermarks {
    /// Thresholds for one metric
    #[must_use]
    pub const fn band(&self, metric: Metric) -> [f64; 2] {
        match metric {
            Metric::Lines => self.lines,
            Metric::Statements => self.statements,
            Metric::Functions => self.functions,
            Metric::Branches => self.branches,
        }
    }

    /// Classify a percentage for a metric
    #[must_use]
    pub fn classify(&self, metric: Metric, pct: f64) -> Level {
        let [low, high] = self.band(metric);
        if pct < low {
            Level::Low
        } else if pct < high {
            Level::Medium
        } else {
            Level::High
        }
    }
}

/// Covered-vs-total counts for one metric
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    /// Number of constructs
    pub total: u64,
    /// Constructs with a nonzero count
    pub covered: u64,
    /// Percentage covered, floored to two decimals (100 when total is 0)
    pub pct: f64,
}

impl Totals {
    /// Build totals from counts
    #[must_use]
    pub fn new(total: u64, covered: u64) -> Self {
        let pct = if total == 0 {
            100.0
        } else {
            ((covered as f64 * 10_000.0) / total as f64).floor() / 100.0
        };
        Self {
            total,
            covered,
            pct,
        }
    }

    fn from_counts<'a>(counts: impl IntoIterator<Item = &'a u64>) -> Self {
        let (total, covered) = counts
            .into_iter()
            .fold((0, 0), |(t, c), n| (t + 1, c + u64::from(*n > 0)));
        Self::new(total, covered)
    }

    fn add(self, other: Self) -> Self {
        Self::new(self.total + other.total, self.covered + other.covered)
    }
}

/// Per-metric totals for a file or an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Line totals
    pub lines: Totals,
    /// Statement totals
    pub statements: Totals,
    /// Function totals
    pub functions: Totals,
    /// Branch totals (one per arm)
    pub branches: Totals,
}

impl CoverageSummary {
    /// Summary with every metric empty (0/0, i.e. 100%)
    #[must_use]
    pub fn empty() -> Self {
        let zero = Totals::new(0, 0);
        Self {
            lines: zero,
            statements: zero,
            functions: zero,
            branches: zero,
        }
    }

    /// Summarize one record
    #[must_use]
    pub fn of_record(record: &FileCoverageRecord) -> Self {
        Self {
            lines: Totals::from_counts(record.line_hits().values()),
            statements: Totals::from_counts(record.s.values()),
            functions: Totals::from_counts(record.f.values()),
            branches: Totals::from_counts(record.b.values().flatten()),
        }
    }

    /// Totals for one metric
    #[must_use]
    pub const fn metric(&self, metric: Metric) -> Totals {
        match metric {
            Metric::Lines => self.lines,
            Metric::Statements => self.statements,
            Metric::Functions => self.functions,
            Metric::Branches => self.branches,
        }
    }

    /// Combine two summaries
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            lines: self.lines.add(other.lines),
            statements: self.statements.add(other.statements),
            functions: self.functions.add(other.functions),
            branches: self.branches.add(other.branches),
        }
    }
}

/// Summary of a whole coverage map
#[derive(Debug, Clone, PartialEq)]
pub struct MapSummary {
    /// Per-file summaries in path order
    pub files: Vec<(String, CoverageSummary)>,
    /// Aggregate over all files
    pub total: CoverageSummary,
}

impl MapSummary {
    /// Summarize every record of a map
    #[must_use]
    pub fn of_map(map: &CoverageMap) -> Self {
        let files: Vec<_> = map
            .records()
            .map(|r| (r.path.clone(), CoverageSummary::of_record(r)))
            .collect();
        let total = files
            .iter()
            .fold(CoverageSummary::empty(), |acc, (_, s)| acc.add(s));
        Self { files, total }
    }
}
