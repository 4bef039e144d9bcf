//! Plain-text reporters

use super::{format_pct, ReportContext, Reporter};
use crate::coverage::{CoverageSummary, Metric};
use crate::result::CoverageResult;
use std::fmt::Write;

const RULE_WIDTH: usize = 80;

/// Aggregate totals per metric
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSummaryReporter;

impl Reporter for TextSummaryReporter {
    fn name(&self) -> &'static str {
        "text-summary"
    }

    fn file_name(&self) -> &'static str {
        "text-summary.txt"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> CoverageResult<String> {
        let mut out = String::new();
        let title = " Coverage summary ";
        let pad = RULE_WIDTH.saturating_sub(title.len());
        let _ = writeln!(
            out,
            "{}{title}{}",
            "=".repeat(pad / 2),
            "=".repeat(pad - pad / 2)
        );
        for metric in Metric::ALL {
            let totals = ctx.summary.total.metric(metric);
            let label = capitalize(metric.name());
            let _ = writeln!(
                out,
                "{label:<13}: {}% ( {}/{} ) [{}]",
                format_pct(totals.pct),
                totals.covered,
                totals.total,
                ctx.level(metric, totals)
            );
        }
        out.push_str(&"=".repeat(RULE_WIDTH));
        out.push('\n');
        Ok(out)
    }

    fn echo(&self) -> bool {
        true
    }
}

/// Per-file table with uncovered lines
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReporter;

impl Reporter for TextReporter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn file_name(&self) -> &'static str {
        "text.txt"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> CoverageResult<String> {
        let root = common_root(ctx.summary.files.iter().map(|(p, _)| p.as_str()));
        let names: Vec<String> = ctx
            .summary
            .files
            .iter()
            .map(|(path, _)| path.strip_prefix(root.as_str()).unwrap_or(path).to_string())
            .collect();
        let width = names
            .iter()
            .map(String::len)
            .chain(std::iter::once("All files".len()))
            .max()
            .unwrap_or_default();

        let mut out = String::new();
        let header = format!(
            "{:<width$} | % Stmts | % Branch | % Funcs | % Lines | Uncovered Line #s",
            "File"
        );
        let rule = "-".repeat(header.len());
        let _ = writeln!(out, "{rule}\n{header}\n{rule}");
        row(&mut out, "All files", &ctx.summary.total, "", width);
        for ((path, summary), name) in ctx.summary.files.iter().zip(&names) {
            let uncovered = ctx
                .map
                .get(path)
                .map(|record| {
                    let lines: Vec<u32> = record
                        .line_hits()
                        .into_iter()
                        .filter(|(_, count)| *count == 0)
                        .map(|(line, _)| line)
                        .collect();
                    compress_lines(&lines)
                })
                .unwrap_or_default();
            row(&mut out, name, summary, &uncovered, width);
        }
        let _ = writeln!(out, "{rule}");
        Ok(out)
    }

    fn echo(&self) -> bool {
        true
    }
}

fn row(out: &mut String, name: &str, summary: &CoverageSummary, uncovered: &str, width: usize) {
    let _ = writeln!(
        out,
        "{name:<width$} | {:>7} | {:>8} | {:>7} | {:>7} | {uncovered}",
        format_pct(summary.statements.pct),
        format_pct(summary.branches.pct),
        format_pct(summary.functions.pct),
        format_pct(summary.lines.pct),
    );
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Longest directory prefix (ending in `/`) shared by every path
fn common_root<'a>(paths: impl Iterator<Item = &'a str>) -> String {
    let mut root: Option<&str> = None;
    for path in paths {
        let dir = path.rfind('/').map_or("", |i| &path[..=i]);
        root = Some(match root {
            None => dir,
            Some(current) => {
                let mut end = 0;
                for ((i, a), b) in current.char_indices().zip(dir.chars()) {
                    if a != b {
                        break;
                    }
                    if a == '/' {
                        end = i + 1;
                    }
                }
                &current[..end]
            }
        });
    }
    root.unwrap_or_default().to_string()
}

/// `[1, 2, 3, 7, 9, 10]` → `"1-3,7,9-10"`
fn compress_lines(lines: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut iter = lines.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            let _ = iter.next();
        }
        parts.push(if start == end {
            start.to_string()
        } else {
            format!("{start}-{end}")
        });
    }
    parts.join(",")
}
