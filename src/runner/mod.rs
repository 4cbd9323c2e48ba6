//! Test run orchestration
//!
//! Runs discovered test files one after another over a single open link,
//! printing a table row per file and collecting the run summary.

pub mod configure;
pub mod describe;
pub mod discovery;
pub mod report;

use chrono::{DateTime, Local, TimeDelta};
use std::path::PathBuf;

use crate::link::DeviceLink;
use crate::procedure::{FileVerdict, Interpreter, RunContext, TestFile};
use discovery::Discovered;

/// Result of running one test file
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// `version` declared by the test file
    pub version: String,
    pub master_version: String,
    pub verdict: FileVerdict,
}

impl FileOutcome {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub outcomes: Vec<FileOutcome>,
    /// The run was stopped before every file was attempted
    pub stopped: bool,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.verdict.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// At least one file passed and none failed
    pub fn all_passed(&self) -> bool {
        self.passed() > 0 && self.failed() == 0
    }
}

/// Run every file in order, honoring stop-program between files
pub fn run<L: DeviceLink + ?Sized>(
    link: &mut L,
    ctx: &RunContext,
    files: &[Discovered],
) -> RunSummary {
    let start = Local::now();
    tracing::debug!("Tests started at: {}", start.format("%Y-%m-%d %H:%M"));
    report::print_table_header();

    let mut outcomes = Vec::with_capacity(files.len());
    let mut stopped = false;
    for discovered in files {
        if ctx.cancel.program_stopped() {
            tracing::info!("Run stopped; {} files not attempted", files.len() - outcomes.len());
            stopped = true;
            break;
        }
        ctx.cancel.clear_test();

        tracing::info!("File: {}", discovered.path.display());
        let outcome = run_file(link, ctx, discovered);
        if outcome.verdict.passed {
            tracing::info!("PASSED -- File {}", discovered.path.display());
        } else {
            tracing::warn!("FAILED -- File {}", discovered.path.display());
        }
        report::print_outcome(&outcome);
        outcomes.push(outcome);
    }

    let summary = RunSummary {
        start,
        end: Local::now(),
        outcomes,
        stopped,
    };
    report::print_table_footer(&summary);
    summary
}

fn run_file<L: DeviceLink + ?Sized>(
    link: &mut L,
    ctx: &RunContext,
    discovered: &Discovered,
) -> FileOutcome {
    match TestFile::load(&discovered.path) {
        Ok(file) => {
            let verdict = Interpreter::new(link, ctx).run_file(&file);
            FileOutcome {
                path: discovered.path.clone(),
                version: file.version,
                master_version: discovered.master_version.clone(),
                verdict,
            }
        }
        Err(e) => {
            tracing::error!("Error processing file {}: {}", discovered.path.display(), e);
            FileOutcome {
                path: discovered.path.clone(),
                version: "N/A".to_string(),
                master_version: discovered.master_version.clone(),
                verdict: FileVerdict::fatal(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(passed: bool) -> FileOutcome {
        FileOutcome {
            path: PathBuf::from("dir/vers.json"),
            version: "1.0".into(),
            master_version: "2".into(),
            verdict: FileVerdict {
                passed,
                ..Default::default()
            },
        }
    }

    fn summary(outcomes: Vec<FileOutcome>) -> RunSummary {
        let now = Local::now();
        RunSummary {
            start: now,
            end: now,
            outcomes,
            stopped: false,
        }
    }

    #[test]
    fn test_summary_counts() {
        let s = summary(vec![outcome(true), outcome(false), outcome(true)]);
        assert_eq!(s.passed(), 2);
        assert_eq!(s.failed(), 1);
        assert_eq!(s.total(), 3);
        assert!(!s.all_passed());
    }

    #[test]
    fn test_empty_run_is_not_a_pass() {
        assert!(!summary(Vec::new()).all_passed());
        assert!(summary(vec![outcome(true)]).all_passed());
    }

    #[test]
    fn test_outcome_name_is_file_name() {
        assert_eq!(outcome(true).name(), "vers.json");
    }
}
