//! Output formatting and progress reporting

use console::{style, Style, Term};
use covkit::MergeOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress and status reporter, writing to stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Show a spinner until [`Self::finish`]
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(pb);
    }

    /// Clear the spinner
    pub fn finish(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print what a merge read, skipped and wrote
    pub fn merge_summary(&self, outcome: &MergeOutcome) {
        for skipped in &outcome.skipped {
            self.warning(&format!(
                "skipped {}: {}",
                skipped.path.display(),
                skipped.reason
            ));
        }
        for path in &outcome.conflicts {
            self.warning(&format!("conflicting instrumentation for {path}; newest kept"));
        }
        if self.quiet {
            return;
        }

        let merged = outcome.artifacts.len();
        let files = outcome.map.len();
        let line = if self.use_color {
            let bold = Style::new().bold();
            format!(
                "merged {} artifacts covering {} files",
                bold.apply_to(merged),
                bold.apply_to(files)
            )
        } else {
            format!("merged {merged} artifacts covering {files} files")
        };
        self.success(&line);
        for report in &outcome.reports {
            self.info(&format!("wrote {}", report.display()));
        }
    }
}
