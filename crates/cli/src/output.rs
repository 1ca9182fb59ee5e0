//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use visreg_runner::{SuiteReport, TestOutcome};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

fn row(outcome: &TestOutcome) -> Vec<String> {
    vec![
        outcome.display_path.display().to_string(),
        if outcome.succeeded { "pass" } else { "FAIL" }.to_string(),
        outcome.passed.to_string(),
        outcome.mismatches.to_string(),
        outcome.timeouts.to_string(),
        outcome.new_images.to_string(),
        outcome
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
        format!("{} ms", outcome.duration_ms),
    ]
}

const HEADERS: [&str; 8] = [
    "Test", "Result", "Passed", "Changed", "Timeouts", "New", "Exit", "Duration",
];

/// Print the per-test outcomes and the suite totals
pub fn print_report(report: &SuiteReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if !report.results.is_empty() {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic);

                table.set_header(HEADERS.to_vec());
                for outcome in &report.results {
                    table.add_row(row(outcome));
                }

                println!("{table}");
            }
            print_totals(report);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, outcome) in report.results.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                for (header, value) in HEADERS.iter().zip(row(outcome)) {
                    println!("{}: {}", header, value);
                }
            }
            print_totals(report);
        }
    }
}

fn print_totals(report: &SuiteReport) {
    let message = format!(
        "{} of {} test(s) passed, {} failed, {} not run ({} ms)",
        report.passed, report.total, report.failed, report.not_run, report.duration_ms
    );
    if report.success() {
        print_success(&message);
    } else {
        print_error(&message);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
