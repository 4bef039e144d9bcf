//! Covkit CLI Library
//!
//! Command-line interface for merging covkit raw artifacts and inspecting
//! the coverage configuration.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{CheckArgs, Cli, ColorArg, Commands, ConfigArgs, MergeArgs, ProjectArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
