//! Session Demo - two coverage sessions merged into one report
//!
//! Simulates two test processes against a tiny project, each dumping a raw
//! artifact, then merges them and prints the text reports.
//!
//! # Running
//!
//! ```bash
//! cargo run --example session_demo -p covkit
//! ```

#![allow(clippy::unwrap_used, clippy::uninlined_format_args)]

use covkit::coverage::StatementId;
use covkit::{
    merge_coverage_from_raw, read_config, setup_coverage, SetupOptions, SourceProvider,
    DEFAULT_CONFIG_FILE,
};
use std::fs;
use std::path::Path;

fn main() {
    println!("=== Covkit Session Demo ===\n");

    let project = tempfile::TempDir::new().unwrap();
    let root = project.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(
        root.join("src/math.js"),
        "function add(a, b) {\n  return a + b;\n}\nfunction sub(a, b) {\n  return a - b;\n}\n",
    )
    .unwrap();
    fs::write(root.join("src/idle.js"), "never();\n").unwrap();
    fs::write(
        root.join(DEFAULT_CONFIG_FILE),
        r#"{"all": true, "reporter": ["text", "text-summary", "lcov"]}"#,
    )
    .unwrap();

    let config = read_config(root, None).unwrap();
    println!("report dir: {}\n", config.report_dir().display());

    // Process 1 exercises `add`, process 2 exercises `sub`
    run_process(&config, "worker-1", &[0, 1]);
    run_process(&config, "worker-2", &[3, 4]);

    println!("--- Merged ---\n");
    let outcome = merge_coverage_from_raw("merged", &config).unwrap();
    println!(
        "merged {} artifacts, {} files, {} reports",
        outcome.artifacts.len(),
        outcome.map.len(),
        outcome.reports.len()
    );

    println!("\n=== Session Demo Complete ===");
}

fn run_process(config: &covkit::Config, name: &str, statements: &[u32]) {
    println!("--- {} ---\n", name);
    let options = SetupOptions {
        save_report: false,
        ..SetupOptions::default()
    };
    let session = setup_coverage(name, config, options).unwrap();
    let loaded = session.loader().load(Path::new("src/math.js")).unwrap();
    println!("instrumented source:\n{}", loaded.code);

    if let Some(probe) = &loaded.probe {
        for id in statements {
            probe.statement(StatementId::new(*id));
        }
    }

    let outcome = session.finish().unwrap();
    println!(
        "raw artifact: {}  (untouched files added: {})\n",
        outcome.raw_artifact.unwrap().display(),
        outcome.untouched_added
    );
}
