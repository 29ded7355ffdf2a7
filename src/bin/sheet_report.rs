use bodyboard::table::{analyze_file, default_report_path};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/body.csv"));

    let report = match analyze_file(&path) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("analysis failed: {}", err);
            std::process::exit(1);
        }
    };

    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }

    let out_path = default_report_path(&path);
    let payload = match serde_json::to_string_pretty(&report) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("failed to serialize report: {}", err);
            std::process::exit(2);
        }
    };
    if let Err(err) = fs::write(&out_path, payload) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(3);
    }
    println!(
        "wrote report {} ({} rows, {} pruned)",
        out_path.display(),
        report.rows,
        report.pruned_rows
    );
}
