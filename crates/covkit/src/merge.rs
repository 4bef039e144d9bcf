//! Merging raw artifacts
//!
//! The merger takes a best-effort snapshot of `raw/*.json` at call time and
//! folds every readable artifact into one map, starting from the empty map.
//! Artifacts are folded in path order so the result does not depend on how
//! the filesystem enumerates them. Unreadable or malformed artifacts are
//! skipped with a warning; the rest still merge.

use crate::coverage::CoverageMap;
use crate::result::{CoverageError, CoverageResult};
use std::fs;
use std::path::{Path, PathBuf};

/// An artifact that could not be merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArtifact {
    /// Artifact path
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Everything a merge produced
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Merged coverage
    pub map: CoverageMap,
    /// Artifacts that were merged, in fold order
    pub artifacts: Vec<PathBuf>,
    /// Artifacts that were skipped
    pub skipped: Vec<SkippedArtifact>,
    /// Files whose structure conflicted between artifacts
    pub conflicts: Vec<String>,
    /// Reports rendered from the merged map
    pub reports: Vec<PathBuf>,
}

/// Folds raw artifacts into one coverage map
#[derive(Debug, Clone)]
pub struct Merger {
    raw_dir: PathBuf,
}

impl Merger {
    /// Merger over `raw_dir`
    #[must_use]
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    /// Raw directory being read
    #[must_use]
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Artifact paths currently present, sorted
    pub fn artifacts(&self) -> CoverageResult<Vec<PathBuf>> {
        let pattern = format!(
            "{}/*.json",
            glob::Pattern::escape(&self.raw_dir.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| CoverageError::Pattern {
            pattern: pattern.clone(),
            message: e.msg.to_string(),
        })?;
        let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
        paths.sort();
        Ok(paths)
    }

    /// Read and fold every artifact under the raw directory.
    ///
    /// A missing raw directory merges to the empty map.
    pub fn merge_all(&self) -> CoverageResult<MergeOutcome> {
        let mut outcome = MergeOutcome::default();
        for path in self.artifacts()? {
            tracing::debug!(path = %path.display(), "merging raw coverage");
            match read_artifact(&path) {
                Ok(map) => {
                    let merged = outcome.map.merge_reporting(&map);
                    outcome.map = merged.map;
                    outcome.conflicts.extend(merged.conflicts);
                    outcome.artifacts.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping raw coverage artifact");
                    outcome.skipped.push(SkippedArtifact {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcome.conflicts.sort();
        outcome.conflicts.dedup();
        tracing::info!(
            merged = outcome.artifacts.len(),
            skipped = outcome.skipped.len(),
            files = outcome.map.len(),
            "raw coverage merged"
        );
        Ok(outcome)
    }
}

/// Read one raw artifact
pub fn read_artifact(path: &Path) -> CoverageResult<CoverageMap> {
    let json = fs::read_to_string(path).map_err(|e| CoverageError::io(path, e))?;
    CoverageMap::from_json(&json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coverage::{FileCoverageRecord, Range, StatementId};
    use crate::persist::{RawPersister, RunIdentifier};
    use tempfile::TempDir;

    fn map(path: &str, counts: &[u64]) -> CoverageMap {
        let mut record = FileCoverageRecord::new(path);
        for (i, count) in counts.iter().enumerate() {
            let id = record.add_statement(Range::on_line(i as u32 + 1, 0, 5));
            let _ = record.s.insert(id, *count);
        }
        [record].into_iter().collect()
    }

    #[test]
    fn test_missing_raw_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let outcome = Merger::new(dir.path().join("nope")).merge_all().unwrap();
        assert!(outcome.map.is_empty());
        assert!(outcome.artifacts.is_empty());
    }

    #[test]
    fn test_two_sessions_merge_exactly_two_artifacts() {
        let dir = TempDir::new().unwrap();
        let persister = RawPersister::new(dir.path());
        let _ = persister
            .persist(&map("/f.js", &[3, 0]), &RunIdentifier::Named("b".into()))
            .unwrap();
        let _ = persister
            .persist(&map("/f.js", &[2, 1]), &RunIdentifier::Named("a".into()))
            .unwrap();

        let outcome = Merger::new(persister.raw_dir()).merge_all().unwrap();
        assert_eq!(outcome.artifacts.len(), 2);
        assert!(outcome.artifacts[0].ends_with("a.json"));
        let f = outcome.map.get("/f.js").unwrap();
        assert_eq!(f.s[&StatementId::new(0)], 5);
        assert_eq!(f.s[&StatementId::new(1)], 1);
    }

    #[test]
    fn test_write_order_does_not_matter() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let dumps = [("a", map("/f.js", &[1])), ("b", map("/g.js", &[4]))];

        for (name, dump) in &dumps {
            let _ = RawPersister::new(first.path())
                .persist(dump, &RunIdentifier::Named((*name).into()))
                .unwrap();
        }
        for (name, dump) in dumps.iter().rev() {
            let _ = RawPersister::new(second.path())
                .persist(dump, &RunIdentifier::Named((*name).into()))
                .unwrap();
        }

        let a = Merger::new(first.path().join("raw")).merge_all().unwrap();
        let b = Merger::new(second.path().join("raw")).merge_all().unwrap();
        assert_eq!(a.map, b.map);
    }

    #[test]
    fn test_malformed_artifact_is_skipped() {
        let dir = TempDir::new().unwrap();
        let persister = RawPersister::new(dir.path());
        let _ = persister
            .persist(&map("/f.js", &[1]), &RunIdentifier::Named("good".into()))
            .unwrap();
        fs::write(persister.raw_dir().join("bad.json"), "{\"truncated\": ").unwrap();
        fs::write(persister.raw_dir().join("notes.txt"), "ignored").unwrap();

        let outcome = Merger::new(persister.raw_dir()).merge_all().unwrap();
        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("bad.json"));
        assert!(outcome.map.contains("/f.js"));
    }

    #[test]
    fn test_invalid_record_artifact_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("odd.json"),
            r#"{"/f.js":{"statementMap":{},"s":{"0":4}}}"#,
        )
        .unwrap();
        let outcome = Merger::new(dir.path()).merge_all().unwrap();
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.map.is_empty());
    }

    #[test]
    fn test_conflicts_are_reported() {
        let dir = TempDir::new().unwrap();
        let persister = RawPersister::new(dir.path());
        let mut newer = map("/f.js", &[1]);
        newer = newer
            .records()
            .cloned()
            .map(|r| r.with_instrumented_at(10))
            .collect();
        let _ = persister
            .persist(&map("/f.js", &[1, 1]), &RunIdentifier::Named("old".into()))
            .unwrap();
        let _ = persister
            .persist(&newer, &RunIdentifier::Named("new".into()))
            .unwrap();

        let outcome = Merger::new(persister.raw_dir()).merge_all().unwrap();
        assert_eq!(outcome.conflicts, vec!["/f.js".to_string()]);
        assert_eq!(outcome.map.get("/f.js").unwrap().s.len(), 1);
    }
}
