/// End-of-batch report tables
///
/// One row per processed file, plus failure counts grouped by kind.
use prettytable::{format, Cell, Row, Table};
use strum::IntoEnumIterator;

use super::batch::BatchReport;
use crate::error::FailureKind;
use crate::utils::format_duration;

fn boxed_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(Row::new(headers.iter().map(|h| Cell::new(h)).collect()));
    table
}

/// One row per job, in job order.
pub fn outcome_table(report: &BatchReport) -> Table {
    let mut table = boxed_table(&["Input", "Status", "Kept", "Removed", "Time"]);

    for outcome in &report.outcomes {
        let input = truncate(outcome.job.file_name(), 25);
        let row = match &outcome.result {
            Ok(result) => vec![
                Cell::new(&input),
                Cell::new("✓ converted"),
                Cell::new(&result.shapes_kept.to_string()),
                Cell::new(&result.shapes_removed.to_string()),
                Cell::new(&format_duration(result.processing_time)),
            ],
            Err(e) => vec![
                Cell::new(&input),
                Cell::new(&format!("✗ {}", e.kind())),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
            ],
        };
        table.add_row(Row::new(row));
    }
    table
}

/// Failure counts for every kind, zeros included.
pub fn failure_kinds_table(report: &BatchReport) -> Table {
    let counts = report.failures_by_kind();
    let mut table = boxed_table(&["Failure kind", "Files"]);
    for kind in FailureKind::iter() {
        let n = counts.get(&kind).copied().unwrap_or(0);
        table.add_row(Row::new(vec![
            Cell::new(&kind.to_string()),
            Cell::new(&n.to_string()),
        ]));
    }
    table
}

/// Print the complete report as formatted tables
pub fn print_report(report: &BatchReport) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                           REPORT                             ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    if !report.outcomes.is_empty() {
        println!("🖼️  FILES ({} total)\n", report.outcomes.len());
        outcome_table(report).printstd();
        println!();
    }

    if report.failed().count() > 0 {
        println!("❌ FAILURES BY KIND\n");
        failure_kinds_table(report).printstd();
        println!();
    }

    let stats = report.stats();
    println!("📊 Summary:");
    println!("   • Total files: {}", stats.total_files);
    println!(
        "   • Converted: {} ({:.1}%)",
        stats.successful,
        stats.success_rate()
    );
    println!("   • Shapes kept: {}", stats.shapes_kept);
    println!("   • Key shapes removed: {}", stats.shapes_removed);
    println!();
}

/// Truncate string to fit in column
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
