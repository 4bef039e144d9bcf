//! Cobertura XML Reporter
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
//! <coverage line-rate="0.8" branch-rate="0.5" lines-covered="8" lines-valid="10" ...>
//!   <packages>
//!     <package name="/proj/src" line-rate="0.8" branch-rate="0.5" complexity="0">
//!       <classes>
//!         <class name="app.js" filename="/proj/src/app.js" line-rate="0.8" ...>
//!           <lines>
//!             <line number="10" hits="5"/>
//!           </lines>
//!         </class>
//!       </classes>
//!     </package>
//!   </packages>
//! </coverage>
//! ```

use super::{ReportContext, Reporter};
use crate::coverage::{CoverageSummary, FileCoverageRecord, Totals};
use crate::result::CoverageResult;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Files grouped by directory
type PackageMap<'a> = BTreeMap<String, Vec<(&'a FileCoverageRecord, CoverageSummary)>>;

/// Cobertura XML reporter
#[derive(Debug, Clone, Copy, Default)]
pub struct CoberturaReporter;

impl Reporter for CoberturaReporter {
    fn name(&self) -> &'static str {
        "cobertura"
    }

    fn file_name(&self) -> &'static str {
        "cobertura-coverage.xml"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> CoverageResult<String> {
        let total = ctx.summary.total;
        let packages = group_by_package(ctx);

        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">"#,
        );
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<coverage line-rate="{:.4}" branch-rate="{:.4}" lines-covered="{}" lines-valid="{}" branches-covered="{}" branches-valid="{}" complexity="0" version="{}">"#,
            rate(total.lines),
            rate(total.branches),
            total.lines.covered,
            total.lines.total,
            total.branches.covered,
            total.branches.total,
            env!("CARGO_PKG_VERSION"),
        );
        xml.push_str("  <packages>\n");

        for (package, files) in &packages {
            let summary = files
                .iter()
                .fold(CoverageSummary::empty(), |acc, (_, s)| acc.add(s));
            let _ = writeln!(
                xml,
                r#"    <package name="{}" line-rate="{:.4}" branch-rate="{:.4}" complexity="0">"#,
                escape(package),
                rate(summary.lines),
                rate(summary.branches),
            );
            xml.push_str("      <classes>\n");
            for (record, summary) in files {
                write_class(&mut xml, record, summary);
            }
            xml.push_str("      </classes>\n");
            xml.push_str("    </package>\n");
        }

        xml.push_str("  </packages>\n");
        xml.push_str("</coverage>\n");
        Ok(xml)
    }
}

fn write_class(xml: &mut String, record: &FileCoverageRecord, summary: &CoverageSummary) {
    let class_name = record
        .path
        .rsplit_once('/')
        .map_or(record.path.as_str(), |(_, file)| file);
    let _ = writeln!(
        xml,
        r#"        <class name="{}" filename="{}" line-rate="{:.4}" branch-rate="{:.4}" complexity="0">"#,
        escape(class_name),
        escape(&record.path),
        rate(summary.lines),
        rate(summary.branches),
    );

    xml.push_str("          <methods>\n");
    for (id, meta) in &record.fn_map {
        let hits = record.f.get(id).copied().unwrap_or(0);
        let _ = writeln!(
            xml,
            r#"            <method name="{}" hits="{hits}" signature="()V">"#,
            escape(&meta.name)
        );
        let _ = writeln!(
            xml,
            r#"              <lines><line number="{}" hits="{hits}"/></lines>"#,
            meta.line
        );
        xml.push_str("            </method>\n");
    }
    xml.push_str("          </methods>\n");

    let mut branches: BTreeMap<u32, (usize, usize)> = BTreeMap::new();
    for (id, meta) in &record.branch_map {
        let arms = record.b.get(id).map(Vec::as_slice).unwrap_or_default();
        let entry = branches.entry(meta.line).or_default();
        entry.0 += arms.iter().filter(|c| **c > 0).count();
        entry.1 += arms.len();
    }

    xml.push_str("          <lines>\n");
    for (line, hits) in record.line_hits() {
        match branches.get(&line) {
            Some(&(taken, arms)) if arms > 0 => {
                let _ = writeln!(
                    xml,
                    r#"            <line number="{line}" hits="{hits}" branch="true" condition-coverage="{}% ({taken}/{arms})"/>"#,
                    taken * 100 / arms
                );
            }
            _ => {
                let _ = writeln!(
                    xml,
                    r#"            <line number="{line}" hits="{hits}" branch="false"/>"#
                );
            }
        }
    }
    xml.push_str("          </lines>\n");
    xml.push_str("        </class>\n");
}

fn group_by_package<'a>(ctx: &ReportContext<'a>) -> PackageMap<'a> {
    let mut packages: PackageMap<'a> = BTreeMap::new();
    for (path, summary) in &ctx.summary.files {
        let Some(record) = ctx.map.get(path) else {
            continue;
        };
        let package = path
            .rsplit_once('/')
            .map_or_else(|| "default".to_string(), |(dir, _)| dir.to_string());
        packages.entry(package).or_default().push((record, *summary));
    }
    packages
}

fn rate(totals: Totals) -> f64 {
    if totals.total == 0 {
        1.0
    } else {
        totals.covered as f64 / totals.total as f64
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
