//! Operator-facing report output
//!
//! Plain text is built by the `format_*` functions; the `print_*` wrappers
//! add color and write to stdout.

use colored::Colorize;

use super::{FileOutcome, RunSummary};
use crate::procedure::Identity;

/// Width of the test name column
pub const NAME_WIDTH: usize = 50;
/// Width of the full table row
pub const COLUMN_WIDTH: usize = NAME_WIDTH + 22;

/// Turn colored output on or off for the whole process
pub fn set_color(enabled: bool) {
    colored::control::set_override(enabled);
}

pub fn format_header() -> String {
    format!("{:<width$} | Ver | Pass | Fail | Master", "Test Name", width = NAME_WIDTH)
}

pub fn format_rule() -> String {
    "-".repeat(COLUMN_WIDTH + 7)
}

/// One table row: `name | ver | P/F | master`
pub fn format_row(outcome: &FileOutcome) -> String {
    let name: String = outcome.name().chars().take(NAME_WIDTH).collect();
    let version: String = outcome.version.chars().take(3).collect();
    let (pass, fail) = if outcome.verdict.passed {
        ("P", "")
    } else {
        ("", "F")
    };
    format!(
        "{:<width$} | {:3} |  {:1}   |  {:1}   | {}",
        name,
        version,
        pass,
        fail,
        outcome.master_version,
        width = NAME_WIDTH
    )
}

/// Failed-step lines for a file, empty when it passed
pub fn format_failures(outcome: &FileOutcome) -> Vec<String> {
    let verdict = &outcome.verdict;
    if verdict.passed {
        return Vec::new();
    }

    let mut lines = vec![format!("Failed steps in {}:", outcome.path.display())];
    for step in &verdict.failed_steps {
        lines.push(format!("  Step {}: {}", step.step, step.description));
        if !step.detail.is_empty() {
            lines.push(format!("      {}", step.detail));
        }
    }
    if verdict.cancelled {
        lines.push(format!(
            "  Stopped after {} of {} steps",
            verdict.steps_run, verdict.steps_total
        ));
    }
    if let Some(fatal) = &verdict.fatal {
        lines.push(format!("  Abandoned: {}", fatal));
    }
    lines
}

pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    let duration = summary.duration();
    let secs = duration.num_seconds();
    let millis = duration.num_milliseconds() % 1000;
    vec![
        "Test Execution Summary:".to_string(),
        format!("Start Time: {}", summary.start.format("%Y-%m-%d %H:%M:%S")),
        format!("End Time: {}", summary.end.format("%Y-%m-%d %H:%M:%S")),
        format!(
            "Total Duration: {}:{:02}:{:02}.{:03}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            millis
        ),
        format!("Files Passed: {}", summary.passed()),
        format!("Files Failed: {}", summary.failed()),
        format!("Total Files: {}", summary.total()),
    ]
}

pub fn print_table_header() {
    println!();
    println!("{}", format_header().bold());
    println!("{}", format_rule());
}

pub fn print_outcome(outcome: &FileOutcome) {
    for line in format_failures(outcome) {
        println!("{}", line.yellow());
    }
    let row = format_row(outcome);
    if outcome.verdict.passed {
        println!("{}", row.green());
    } else {
        println!("{}", row.red().on_white());
    }
}

pub fn print_table_footer(summary: &RunSummary) {
    println!("{}", format_rule());
    println!(
        "Total: Pass = {}, Fail = {}",
        summary.passed().to_string().green(),
        summary.failed().to_string().red()
    );
    if summary.stopped {
        println!("{}", "Run stopped by operator".yellow());
    }
}

pub fn print_summary(summary: &RunSummary) {
    let lines = format_summary(summary);
    println!();
    if let Some((title, rest)) = lines.split_first() {
        println!("{}", title.cyan().bold());
        for line in rest {
            println!("{}", line);
        }
    }
}

pub fn print_banner(identity: &Identity) {
    println!("{}", "Device identity".cyan());
    for line in identity.banner() {
        println!("  {}", line.dimmed());
    }
}

pub fn print_not_processed(entries: &[String]) {
    if entries.is_empty() {
        println!("'not_processed' entries NOT found in any master files.");
        return;
    }
    println!("{}", "List of 'not_processed' entries from all master files:".cyan());
    for entry in entries {
        println!(" - {}", entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::{FileVerdict, StepResult};
    use chrono::{Local, TimeDelta};
    use std::path::PathBuf;

    fn failed_outcome() -> FileOutcome {
        FileOutcome {
            path: PathBuf::from("tests/vers.json"),
            version: "1.25".into(),
            master_version: "7".into(),
            verdict: FileVerdict {
                passed: false,
                failed_steps: vec![StepResult {
                    step: 2,
                    passed: false,
                    description: "check version".into(),
                    detail: "Expected 'A', received 'B'".into(),
                }],
                steps_run: 2,
                steps_total: 3,
                cancelled: false,
                fatal: Some("Step 2: Failed to send data: gone".into()),
            },
        }
    }

    #[test]
    fn test_row_columns() {
        let row = format_row(&failed_outcome());
        assert!(row.starts_with("vers.json "));
        assert!(row.contains("| 1.2 |"));
        assert!(row.ends_with("|  F   | 7"));
        assert_eq!(row.find('|'), format_header().find('|'));
    }

    #[test]
    fn test_failure_lines() {
        let lines = format_failures(&failed_outcome());
        assert_eq!(lines[0], "Failed steps in tests/vers.json:");
        assert_eq!(lines[1], "  Step 2: check version");
        assert!(lines[2].contains("Expected 'A'"));
        assert!(lines[3].starts_with("  Abandoned:"));
    }

    #[test]
    fn test_passed_file_has_no_failure_lines() {
        let mut outcome = failed_outcome();
        outcome.verdict = FileVerdict {
            passed: true,
            ..Default::default()
        };
        assert!(format_failures(&outcome).is_empty());
    }

    #[test]
    fn test_summary_lines() {
        let start = Local::now();
        let summary = RunSummary {
            start,
            end: start + TimeDelta::milliseconds(61_250),
            outcomes: vec![failed_outcome()],
            stopped: false,
        };
        let lines = format_summary(&summary);
        assert_eq!(lines[3], "Total Duration: 0:01:01.250");
        assert_eq!(lines[5], "Files Failed: 1");
        assert_eq!(lines[6], "Total Files: 1");
    }
}
