//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Covkit: merge per-process coverage artifacts and render reports
#[derive(Parser, Debug)]
#[command(name = "covkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge raw coverage artifacts and render reports
    Merge(MergeArgs),

    /// Show the normalized coverage configuration
    Config(ConfigArgs),

    /// Check which files would be instrumented
    Check(CheckArgs),
}

/// Where to find the project and its config file
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root directory
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Config file name, relative to the project root
    #[arg(long, default_value = covkit::DEFAULT_CONFIG_FILE)]
    pub config: String,
}

/// Arguments for the merge command
#[derive(Parser, Debug)]
pub struct MergeArgs {
    /// Project location
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Session name for the merged report directory
    #[arg(short, long, default_value = "merged")]
    pub name: String,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Project location
    #[command(flatten)]
    pub project: ProjectArgs,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Project location
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Paths to check, relative to the configured cwd
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
