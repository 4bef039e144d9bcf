//! LCOV Reporter
//!
//! ```text
//! TN:<test name>
//! SF:<source file>
//! FN:<line>,<function name>
//! FNDA:<execution count>,<function name>
//! FNF:<functions found>
//! FNH:<functions hit>
//! DA:<line>,<execution count>
//! LF:<lines found>
//! LH:<lines hit>
//! BRDA:<line>,<block>,<branch>,<taken>
//! BRF:<branches found>
//! BRH:<branches hit>
//! end_of_record
//! ```

use super::{ReportContext, Reporter};
use crate::coverage::FileCoverageRecord;
use crate::result::CoverageResult;
use std::fmt::Write;

/// LCOV tracefile reporter
#[derive(Debug, Clone, Copy, Default)]
pub struct LcovReporter;

impl Reporter for LcovReporter {
    fn name(&self) -> &'static str {
        "lcov"
    }

    fn file_name(&self) -> &'static str {
        "lcov.info"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> CoverageResult<String> {
        let mut output = String::new();
        for record in ctx.map.records() {
            let _ = writeln!(output, "TN:{}", ctx.session_name);
            write_record(&mut output, record);
        }
        Ok(output)
    }
}

fn write_record(output: &mut String, record: &FileCoverageRecord) {
    let _ = writeln!(output, "SF:{}", record.path);

    let mut functions_hit = 0;
    for meta in record.fn_map.values() {
        let _ = writeln!(output, "FN:{},{}", meta.line, meta.name);
    }
    for (id, meta) in &record.fn_map {
        let count = record.f.get(id).copied().unwrap_or(0);
        let _ = writeln!(output, "FNDA:{count},{}", meta.name);
        if count > 0 {
            functions_hit += 1;
        }
    }
    let _ = writeln!(output, "FNF:{}", record.fn_map.len());
    let _ = writeln!(output, "FNH:{functions_hit}");

    let lines = record.line_hits();
    for (line, count) in &lines {
        let _ = writeln!(output, "DA:{line},{count}");
    }
    let _ = writeln!(output, "LF:{}", lines.len());
    let _ = writeln!(output, "LH:{}", lines.values().filter(|c| **c > 0).count());

    let (mut found, mut hit) = (0, 0);
    for (id, meta) in &record.branch_map {
        let arms = record.b.get(id).map(Vec::as_slice).unwrap_or_default();
        for (arm, count) in arms.iter().enumerate() {
            let taken = if *count == 0 {
                "-".to_string()
            } else {
                count.to_string()
            };
            let _ = writeln!(output, "BRDA:{},{id},{arm},{taken}", meta.line);
            found += 1;
            if *count > 0 {
                hit += 1;
            }
        }
    }
    let _ = writeln!(output, "BRF:{found}");
    let _ = writeln!(output, "BRH:{hit}");

    output.push_str("end_of_record\n");
}
