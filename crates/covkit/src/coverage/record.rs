//! Per-file coverage record
//!
//! A record pairs location maps (construct id → source range) with parallel
//! hit-count maps. Its JSON form follows the widely used istanbul layout:
//!
//! ```text
//! {
//!   "path": "/abs/src/a.js",
//!   "statementMap": { "0": { "start": {..}, "end": {..} } },
//!   "fnMap":        { "0": { "name": "f", "decl": {..}, "loc": {..}, "line": 1 } },
//!   "branchMap":    { "0": { "type": "if", "loc": {..}, "locations": [..], "line": 3 } },
//!   "s": { "0": 3 }, "f": { "0": 1 }, "b": { "0": [1, 0] },
//!   "hash": "…", "instrumentedAt": 1700000000000
//! }
//! ```

use super::{BranchId, FunctionId, StatementId};
use crate::result::{CoverageError, CoverageResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A line/column position in a source file (1-based line, 0-based column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Line number
    pub line: u32,
    /// Column number
    pub column: u32,
}

/// A source range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    /// Start position (inclusive)
    pub start: Position,
    /// End position
    pub end: Position,
}

impl Range {
    /// Range covering `start_col..end_col` on a single line
    #[must_use]
    pub const fn on_line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start: Position {
                line,
                column: start_col,
            },
            end: Position {
                line,
                column: end_col,
            },
        }
    }
}

/// Location metadata for an instrumented function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMeta {
    /// Function name (`(anonymous_N)` when the source has none)
    pub name: String,
    /// Range of the declaration header
    pub decl: Range,
    /// Range of the whole function
    pub loc: Range,
    /// Declaration line
    pub line: u32,
}

/// Location metadata for an instrumented branch point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMeta {
    /// Branch kind, e.g. `if`, `switch`, `cond-expr`
    #[serde(rename = "type")]
    pub kind: String,
    /// Range of the whole branching construct
    pub loc: Range,
    /// One range per arm
    pub locations: Vec<Range>,
    /// Line of the construct
    pub line: u32,
}

/// Result of merging two records for the same path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMerge {
    /// The merged record
    pub record: FileCoverageRecord,
    /// True when the inputs were structurally incompatible and one side's
    /// counts were discarded
    pub conflict: bool,
}

/// Coverage record for one source file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverageRecord {
    /// Absolute path of the source file
    #[serde(default)]
    pub path: String,
    /// Statement locations
    #[serde(default)]
    pub statement_map: BTreeMap<StatementId, Range>,
    /// Function locations
    #[serde(default)]
    pub fn_map: BTreeMap<FunctionId, FunctionMeta>,
    /// Branch locations
    #[serde(default)]
    pub branch_map: BTreeMap<BranchId, BranchMeta>,
    /// Statement hit counts
    #[serde(default)]
    pub s: BTreeMap<StatementId, u64>,
    /// Function hit counts
    #[serde(default)]
    pub f: BTreeMap<FunctionId, u64>,
    /// Branch hit counts, one per arm
    #[serde(default)]
    pub b: BTreeMap<BranchId, Vec<u64>>,
    /// SHA-256 of the instrumented source text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Instrumentation time in milliseconds since the Unix epoch
    #[serde(default)]
    pub instrumented_at: i64,
}

impl FileCoverageRecord {
    /// Create an empty record for `path`
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Record the hash of the source this record was instrumented from
    #[must_use]
    pub fn with_source_hash(mut self, source: &str) -> Self {
        self.hash = Some(hex_digest(source.as_bytes()));
        self
    }

    /// Set the instrumentation timestamp
    #[must_use]
    pub fn with_instrumented_at(mut self, millis: i64) -> Self {
        self.instrumented_at = millis;
        self
    }

    /// Register a statement and return its id
    pub fn add_statement(&mut self, range: Range) -> StatementId {
        let id = StatementId::new(next_id(&self.statement_map));
        let _ = self.statement_map.insert(id, range);
        let _ = self.s.insert(id, 0);
        id
    }

    /// Register a function and return its id
    pub fn add_function(&mut self, name: impl Into<String>, decl: Range, loc: Range) -> FunctionId {
        let id = FunctionId::new(next_id(&self.fn_map));
        let meta = FunctionMeta {
            name: name.into(),
            decl,
            loc,
            line: decl.start.line,
        };
        let _ = self.fn_map.insert(id, meta);
        let _ = self.f.insert(id, 0);
        id
    }

    /// Register a branch point with one range per arm and return its id
    pub fn add_branch(&mut self, kind: impl Into<String>, loc: Range, locations: Vec<Range>) -> BranchId {
        let id = BranchId::new(next_id(&self.branch_map));
        let arms = locations.len();
        let meta = BranchMeta {
            kind: kind.into(),
            loc,
            locations,
            line: loc.start.line,
        };
        let _ = self.branch_map.insert(id, meta);
        let _ = self.b.insert(id, vec![0; arms]);
        id
    }

    /// Increment a statement counter. Unknown ids are ignored.
    pub fn hit_statement(&mut self, id: StatementId) {
        if let Some(count) = self.s.get_mut(&id) {
            *count = count.saturating_add(1);
        }
    }

    /// Increment a function counter. Unknown ids are ignored.
    pub fn hit_function(&mut self, id: FunctionId) {
        if let Some(count) = self.f.get_mut(&id) {
            *count = count.saturating_add(1);
        }
    }

    /// Increment one arm of a branch counter. Unknown ids/arms are ignored.
    pub fn hit_branch(&mut self, id: BranchId, arm: usize) {
        if let Some(count) = self.b.get_mut(&id).and_then(|arms| arms.get_mut(arm)) {
            *count = count.saturating_add(1);
        }
    }

    /// Zero every counter, keeping the structure
    pub fn reset_hits(&mut self) {
        self.s.values_mut().for_each(|c| *c = 0);
        self.f.values_mut().for_each(|c| *c = 0);
        self.b
            .values_mut()
            .for_each(|arms| arms.iter_mut().for_each(|c| *c = 0));
    }

    /// Check that every count map has exactly the ids of its location map
    pub fn validate(&self) -> CoverageResult<()> {
        if !self.s.keys().eq(self.statement_map.keys()) {
            return Err(CoverageError::invalid_record(
                &self.path,
                "statement counts do not match statementMap ids",
            ));
        }
        if !self.f.keys().eq(self.fn_map.keys()) {
            return Err(CoverageError::invalid_record(
                &self.path,
                "function counts do not match fnMap ids",
            ));
        }
        if !self.b.keys().eq(self.branch_map.keys()) {
            return Err(CoverageError::invalid_record(
                &self.path,
                "branch counts do not match branchMap ids",
            ));
        }
        for (id, meta) in &self.branch_map {
            let arms = self.b.get(id).map_or(0, Vec::len);
            if arms != meta.locations.len() {
                return Err(CoverageError::invalid_record(
                    &self.path,
                    format!(
                        "branch {id} has {arms} counts for {} locations",
                        meta.locations.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Whether two records describe the same instrumentation of the same source
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        let same_source = match (&self.hash, &other.hash) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        same_source
            && self.statement_map == other.statement_map
            && self.fn_map == other.fn_map
            && self.branch_map == other.branch_map
    }

    /// SHA-256 over the record's structure (location maps and source hash)
    #[must_use]
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Structure<'a> {
            statement_map: &'a BTreeMap<StatementId, Range>,
            fn_map: &'a BTreeMap<FunctionId, FunctionMeta>,
            branch_map: &'a BTreeMap<BranchId, BranchMeta>,
            hash: &'a Option<String>,
        }

        let bytes = serde_json::to_vec(&Structure {
            statement_map: &self.statement_map,
            fn_map: &self.fn_map,
            branch_map: &self.branch_map,
            hash: &self.hash,
        })
        .unwrap_or_default();
        hex_digest(&bytes)
    }

    /// Merge two records for the same path without mutating either.
    ///
    /// Compatible records sum their counts. Incompatible records resolve to
    /// the one with the larger `(instrumented_at, fingerprint)` key, and the
    /// other side's counts are dropped.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> RecordMerge {
        if self.is_compatible(other) {
            let mut record = self.clone();
            add_counts(&mut record.s, &other.s);
            add_counts(&mut record.f, &other.f);
            for (id, arms) in &mut record.b {
                if let Some(theirs) = other.b.get(id) {
                    for (mine, theirs) in arms.iter_mut().zip(theirs) {
                        *mine = mine.saturating_add(*theirs);
                    }
                }
            }
            record.hash = self.hash.clone().or_else(|| other.hash.clone());
            record.instrumented_at = self.instrumented_at.max(other.instrumented_at);
            return RecordMerge {
                record,
                conflict: false,
            };
        }

        let winner = match self
            .instrumented_at
            .cmp(&other.instrumented_at)
            .then_with(|| self.fingerprint().cmp(&other.fingerprint()))
        {
            Ordering::Less => other,
            Ordering::Equal | Ordering::Greater => self,
        };
        RecordMerge {
            record: winner.clone(),
            conflict: true,
        }
    }

    /// Per-line hit counts derived from statement start lines.
    ///
    /// A line's count is the largest count among statements starting on it.
    #[must_use]
    pub fn line_hits(&self) -> BTreeMap<u32, u64> {
        let mut lines = BTreeMap::new();
        for (id, range) in &self.statement_map {
            let count = self.s.get(id).copied().unwrap_or(0);
            let entry = lines.entry(range.start.line).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
        lines
    }
}

fn next_id<K: Copy + Into<u32>, V>(map: &BTreeMap<K, V>) -> u32 {
    map.keys().next_back().map_or(0, |k| Into::<u32>::into(*k) + 1)
}

fn add_counts<K: Ord + Copy>(mine: &mut BTreeMap<K, u64>, theirs: &BTreeMap<K, u64>) {
    for (id, count) in mine.iter_mut() {
        if let Some(other) = theirs.get(id) {
            *count = count.saturating_add(*other);
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}
