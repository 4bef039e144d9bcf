//! Coverage map: absolute file path → [`FileCoverageRecord`]

use super::FileCoverageRecord;
use crate::result::{CoverageError, CoverageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from absolute file path to that file's coverage record.
///
/// Holds at most one record per path. Merging never mutates an input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageMap {
    files: BTreeMap<String, FileCoverageRecord>,
}

/// Result of a map merge that also reports structural conflicts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapMerge {
    /// Merged map
    pub map: CoverageMap,
    /// Paths whose records were structurally incompatible
    pub conflicts: Vec<String>,
}

impl CoverageMap {
    /// Create an empty map (the merge identity)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw artifact and validate every record
    pub fn from_json(json: &str) -> CoverageResult<Self> {
        let mut map: Self = serde_json::from_str(json)?;
        for (key, record) in &mut map.files {
            if record.path.is_empty() {
                record.path.clone_from(key);
            } else if record.path != *key {
                return Err(CoverageError::invalid_record(
                    key,
                    format!("record path {:?} does not match its key", record.path),
                ));
            }
            record.validate()?;
        }
        Ok(map)
    }

    /// Serialize to the raw artifact JSON form
    pub fn to_json(&self) -> CoverageResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Add a record, merging with any record already present for its path
    pub fn add_record(&mut self, record: FileCoverageRecord) -> bool {
        match self.files.get(&record.path) {
            Some(existing) => {
                let merged = existing.merged_with(&record);
                let _ = self.files.insert(record.path.clone(), merged.record);
                merged.conflict
            }
            None => {
                let _ = self.files.insert(record.path.clone(), record);
                false
            }
        }
    }

    /// Merge two maps into a new one
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        self.merge_reporting(other).map
    }

    /// Merge two maps into a new one, listing conflicting paths
    #[must_use]
    pub fn merge_reporting(&self, other: &Self) -> MapMerge {
        let mut result = self.clone();
        let mut conflicts = Vec::new();
        for record in other.files.values() {
            if result.add_record(record.clone()) {
                tracing::warn!(
                    path = %record.path,
                    "source changed between runs; keeping the most recent instrumentation and discarding older counts"
                );
                conflicts.push(record.path.clone());
            }
        }
        MapMerge {
            map: result,
            conflicts,
        }
    }

    /// Get the record for a path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileCoverageRecord> {
        self.files.get(path)
    }

    /// Iterate over records in path order
    pub fn records(&self) -> impl Iterator<Item = &FileCoverageRecord> {
        self.files.values()
    }

    /// File paths in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Whether a record exists for `path`
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the map has no files
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<FileCoverageRecord> for CoverageMap {
    fn from_iter<I: IntoIterator<Item = FileCoverageRecord>>(iter: I) -> Self {
        let mut map = Self::new();
        for record in iter {
            let _ = map.add_record(record);
        }
        map
    }
}
