//! Coverage data model
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Instrumenter → FileCoverageRecord → CoverageCollector (session) │
//! │                                          ↓ snapshot              │
//! │               raw/*.json ← CoverageMap → merge → MapSummary      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `CoverageMap::merge` is commutative with the empty map as identity. Without
//! conflicting records it is also associative, so raw dumps from any number
//! of processes can be folded in any order.

mod collector;
mod ids;
mod map;
mod record;
mod summary;

pub use collector::{CoverageCollector, CoverageHandle, Diagnostic, FileProbe, SessionId};
pub use ids::{BranchId, FunctionId, StatementId};
pub use map::{CoverageMap, MapMerge};
pub use record::{BranchMeta, FileCoverageRecord, FunctionMeta, Position, Range, RecordMerge};
pub use summary::{CoverageSummary, Level, MapSummary, Metric, Totals, Watermarks};
