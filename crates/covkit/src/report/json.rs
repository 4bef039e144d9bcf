//! JSON reporters

use super::{ReportContext, Reporter};
use crate::coverage::{CoverageSummary, Level, Metric, Totals};
use crate::result::CoverageResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// The full coverage map, in raw artifact form
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn file_name(&self) -> &'static str {
        "coverage-final.json"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> CoverageResult<String> {
        ctx.map.to_json()
    }
}

/// Per-file and total summaries with watermark levels
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSummaryReporter;

#[derive(Serialize)]
struct MetricEntry {
    total: u64,
    covered: u64,
    pct: f64,
    level: Level,
}

type SummaryEntry = BTreeMap<&'static str, MetricEntry>;

fn entry(ctx: &ReportContext<'_>, summary: &CoverageSummary) -> SummaryEntry {
    Metric::ALL
        .into_iter()
        .map(|metric| {
            let Totals {
                total,
                covered,
                pct,
            } = summary.metric(metric);
            let level = ctx.watermarks.classify(metric, pct);
            (
                metric.name(),
                MetricEntry {
                    total,
                    covered,
                    pct,
                    level,
                },
            )
        })
        .collect()
}

impl Reporter for JsonSummaryReporter {
    fn name(&self) -> &'static str {
        "json-summary"
    }

    fn file_name(&self) -> &'static str {
        "coverage-summary.json"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> CoverageResult<String> {
        let mut out: BTreeMap<&str, SummaryEntry> = BTreeMap::new();
        let _ = out.insert("total", entry(ctx, &ctx.summary.total));
        for (path, summary) in &ctx.summary.files {
            let _ = out.insert(path.as_str(), entry(ctx, summary));
        }
        Ok(serde_json::to_string_pretty(&out)?)
    }
}
