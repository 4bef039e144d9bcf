//! Subcommand implementations

use crate::commands::{CheckArgs, ConfigArgs, MergeArgs, ProjectArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use covkit::{
    merge_coverage_from_raw, read_config, validate_session_name, Config, FileMatcher, MergeOutcome,
};
use std::path::PathBuf;

/// Read the project's config, failing early on a missing root
pub fn load_config(project: &ProjectArgs) -> CliResult<Config> {
    if !project.root.is_dir() {
        return Err(CliError::config(format!(
            "project root {} is not a directory",
            project.root.display()
        )));
    }
    Ok(read_config(&project.root, Some(&project.config))?)
}

/// `covkit merge`
pub fn run_merge(config: &CliConfig, args: &MergeArgs) -> CliResult<MergeOutcome> {
    validate_session_name(&args.name).map_err(|e| CliError::invalid_argument(e.to_string()))?;
    let coverage = load_config(&args.project)?;
    let mut reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    if config.verbosity.is_verbose() {
        reporter.info(&format!("report dir: {}", coverage.report_dir().display()));
    }

    reporter.start_spinner("Merging raw coverage");
    let result = merge_coverage_from_raw(&args.name, &coverage);
    reporter.finish();

    let outcome = result?;
    reporter.merge_summary(&outcome);
    Ok(outcome)
}

/// `covkit config`: the normalized config as pretty JSON
pub fn run_config(args: &ConfigArgs) -> CliResult<String> {
    let coverage = load_config(&args.project)?;
    Ok(serde_json::to_string_pretty(&coverage)?)
}

/// `covkit check`: whether each path would be instrumented
pub fn run_check(args: &CheckArgs) -> CliResult<Vec<(PathBuf, bool)>> {
    let coverage = load_config(&args.project)?;
    let matcher = FileMatcher::new(coverage.match_config())?;
    Ok(args
        .paths
        .iter()
        .map(|path| (path.clone(), matcher.should_instrument(path)))
        .collect())
}
