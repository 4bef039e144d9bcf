//! Instrumentation seam
//!
//! Rewriting source so it reports counters is a pluggable capability. The
//! loader only needs the rewritten text plus the zero-count record that
//! describes the constructs the rewrite assigned ids to.
//!
//! [`LineInstrumenter`] is a small language-agnostic reference
//! implementation: one statement per code line, functions detected by their
//! declaration keyword, `if` lines as two-armed branches. It marks each
//! construct with a comment, so the output runs exactly like the input.

use crate::coverage::{FileCoverageRecord, Range};
use std::path::Path;
use thiserror::Error;

/// Header prepended to every source [`LineInstrumenter`] produces
pub const INSTRUMENTED_HEADER: &str = "/* covkit:instrumented */";

/// Why a source could not be instrumented
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstrumentError {
    /// The source did not parse
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: u32,
        /// What went wrong
        message: String,
    },

    /// The instrumenter does not handle this kind of file
    #[error("unsupported source: {message}")]
    Unsupported {
        /// Why
        message: String,
    },
}

/// Output of a successful instrumentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrumented {
    /// Rewritten source text
    pub code: String,
    /// Constructs with their locations and zeroed counts
    pub record: FileCoverageRecord,
}

/// Rewrites source text into a counter-reporting equivalent
pub trait Instrumenter: Send + Sync {
    /// Instrument `source`, identified by `path`
    fn instrument(&self, source: &str, path: &Path) -> Result<Instrumented, InstrumentError>;

    /// Whether `source` is already the output of this instrumenter
    fn is_instrumented(&self, _source: &str) -> bool {
        false
    }
}

/// Line-oriented reference instrumenter
#[derive(Debug, Clone, Default)]
pub struct LineInstrumenter;

impl LineInstrumenter {
    /// Create a new instrumenter
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Instrumenter for LineInstrumenter {
    fn instrument(&self, source: &str, path: &Path) -> Result<Instrumented, InstrumentError> {
        let mut record = FileCoverageRecord::new(path.to_string_lossy()).with_source_hash(source);
        let mut code = String::with_capacity(source.len() + source.len() / 2);
        code.push_str(INSTRUMENTED_HEADER);
        code.push('\n');

        let mut depth: i64 = 0;
        let mut anonymous = 0;
        for (index, raw) in source.lines().enumerate() {
            let line = index as u32 + 1;
            let text = raw.trim();
            let indent = (raw.len() - raw.trim_start().len()) as u32;
            let end = raw.trim_end().len() as u32;

            depth += brace_delta(text);
            if depth < 0 {
                return Err(InstrumentError::Parse {
                    line,
                    message: "unbalanced closing brace".to_string(),
                });
            }

            if !is_code(text) {
                code.push_str(raw);
                code.push('\n');
                continue;
            }

            let range = Range::on_line(line, indent, end);
            let mut markers = vec![format!("s:{}", record.add_statement(range))];
            if let Some(name) = function_name(text) {
                let name = name.map_or_else(
                    || {
                        anonymous += 1;
                        format!("(anonymous_{anonymous})")
                    },
                    str::to_string,
                );
                markers.push(format!("f:{}", record.add_function(name, range, range)));
            }
            if text.starts_with("if ") || text.starts_with("if(") {
                let arms = vec![range, Range::on_line(line, end, end)];
                markers.push(format!("b:{}", record.add_branch("if", range, arms)));
            }

            code.push_str(&raw[..indent as usize]);
            code.push_str("/* cov ");
            code.push_str(&markers.join(" "));
            code.push_str(" */ ");
            code.push_str(raw.trim_start());
            code.push('\n');
        }

        if depth != 0 {
            return Err(InstrumentError::Parse {
                line: source.lines().count() as u32,
                message: format!("{depth} unclosed brace(s) at end of input"),
            });
        }
        Ok(Instrumented { code, record })
    }

    fn is_instrumented(&self, source: &str) -> bool {
        source.starts_with(INSTRUMENTED_HEADER)
    }
}

fn is_code(text: &str) -> bool {
    !(text.is_empty()
        || text.starts_with("//")
        || text.starts_with("/*")
        || text.starts_with('*')
        || text.chars().all(|c| matches!(c, '{' | '}' | '(' | ')' | ';' | ',' | ']' | '[')))
}

fn brace_delta(text: &str) -> i64 {
    let code = text.split("//").next().unwrap_or_default();
    code.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

/// `Some(Some(name))` for a named function, `Some(None)` for an anonymous one
fn function_name(text: &str) -> Option<Option<&str>> {
    let text = text
        .trim_start_matches("export ")
        .trim_start_matches("default ")
        .trim_start_matches("pub ")
        .trim_start_matches("async ");
    let rest = text
        .strip_prefix("function")
        .or_else(|| text.strip_prefix("fn "))?;
    let rest = rest.trim_start_matches('*').trim_start();
    let name: &str = rest
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .next()
        .unwrap_or_default();
    Some(if name.is_empty() { None } else { Some(name) })
}
