//! Logging and tracing configuration
//!
//! Console logging is always on; a plain-text log file is added when the
//! operator asks for one. Detailed log files carry the serial number and
//! start time in their name and get a PASS/FAIL suffix when the run ends.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Where (and whether) to write a log file
#[derive(Debug, Clone)]
pub enum LogFile {
    /// Console only
    Disabled,
    /// Write to a fixed file name
    Plain(PathBuf),
    /// `<serial>_<yymmdd_HHMM>.log`, renamed with the run verdict at the end
    Detailed { serial_number: Option<String> },
}

/// Keeps the file writer alive and knows how to finalize the log file
#[derive(Debug)]
pub struct LogSession {
    path: Option<PathBuf>,
    detailed: bool,
    guard: Option<WorkerGuard>,
}

/// Map the CLI verbosity level onto a default filter directive
fn filter_for(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("slcd={level},warn"))
    })
}

/// Build the detailed log file name for a serial number and timestamp
pub fn detailed_file_name(serial_number: Option<&str>, stamp: &str) -> String {
    format!("{}_{}.log", serial_number.unwrap_or("NoSerialNumber"), stamp)
}

/// Name of a detailed log file once the run verdict is known
pub fn verdict_file_name(path: &Path, passed: bool) -> PathBuf {
    let verdict = if passed { "PASS" } else { "FAIL" };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, verdict, ext.to_string_lossy()),
        None => format!("{}_{}", stem, verdict),
    };
    path.with_file_name(name)
}

/// Initialize tracing for the CLI
///
/// Logs are controlled by `RUST_LOG` when set, otherwise by `verbosity`
/// (0 = warnings, 1 = info, 2 = debug, 3 = trace).
pub fn init(verbosity: u8, log_file: &LogFile, color: bool) -> LogSession {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(false)
        .compact()
        .with_filter(filter_for(verbosity));

    let path = match log_file {
        LogFile::Disabled => None,
        LogFile::Plain(path) => Some(path.clone()),
        LogFile::Detailed { serial_number } => {
            let stamp = chrono::Local::now().format("%y%m%d_%H%M").to_string();
            Some(PathBuf::from(detailed_file_name(
                serial_number.as_deref(),
                &stamp,
            )))
        }
    };

    let Some(path) = path else {
        tracing_subscriber::registry().with(console).init();
        return LogSession {
            path: None,
            detailed: false,
            guard: None,
        };
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

    // Truncate so each run starts with a fresh file
    if let Err(e) = std::fs::write(&path, "") {
        eprintln!("Warning: Could not create log file {}: {}", path.display(), e);
        tracing_subscriber::registry().with(console).init();
        return LogSession {
            path: None,
            detailed: false,
            guard: None,
        };
    }

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .with_level(false)
        .with_filter(filter_for(verbosity.max(1)));

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();

    LogSession {
        path: Some(path),
        detailed: matches!(log_file, LogFile::Detailed { .. }),
        guard: Some(guard),
    }
}

impl LogSession {
    /// Path of the active log file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush the file writer and, for detailed logs, rename the file with
    /// the run verdict. Returns the final path.
    pub fn finish(mut self, passed: bool) -> Option<PathBuf> {
        // Dropping the guard flushes pending lines
        self.guard.take();
        let path = self.path.take()?;
        if !self.detailed {
            return Some(path);
        }
        let renamed = verdict_file_name(&path, passed);
        match std::fs::rename(&path, &renamed) {
            Ok(()) => Some(renamed),
            Err(e) => {
                eprintln!("Warning: Could not rename log file {}: {}", path.display(), e);
                Some(path)
            }
        }
    }
}
