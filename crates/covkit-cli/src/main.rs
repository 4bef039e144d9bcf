//! Covkit CLI: merge per-process coverage and render reports
//!
//! ## Usage
//!
//! ```bash
//! covkit merge                        # Merge <report-dir>/raw/*.json into <report-dir>/merged
//! covkit merge --root pkg --name ci   # Another project root and session name
//! covkit config                       # Show the normalized config
//! covkit check src/app.js test/a.js   # Would these files be instrumented?
//! ```

use clap::Parser;
use covkit_cli::{
    handlers, Cli, CliConfig, CliResult, ColorChoice, Commands, ProgressReporter, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(&config);

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
                .failure(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &CliConfig) -> CliResult<()> {
    match cli.command {
        Commands::Merge(args) => handlers::run_merge(config, &args).map(|_| ()),
        Commands::Config(args) => {
            println!("{}", handlers::run_config(&args)?);
            Ok(())
        }
        Commands::Check(args) => {
            for (path, instrumented) in handlers::run_check(&args)? {
                let verdict = if instrumented { "instrument" } else { "skip" };
                println!("{verdict:<10} {}", path.display());
            }
            Ok(())
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();
    console::set_colors_enabled(color.should_color());
    console::set_colors_enabled_stderr(color.should_color());

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

/// Logs go to stderr; `RUST_LOG` overrides the `-v`/`-q` level.
fn init_logging(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.color.should_color())
        .with_target(false)
        .try_init();
}
