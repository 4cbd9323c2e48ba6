//! CLI command definitions
//!
//! Defines the clap commands for the tester CLI.

use clap::{ArgAction, Args, Subcommand};
use std::path::PathBuf;

use crate::common::logging::LogFile;
use crate::runner::describe::DEFAULT_OUTPUT;

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Path to / name of the configuration file
    #[arg(long, short, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Path to / name of the device identity file
    #[arg(long, short, global = true, default_value = "identity.json")]
    pub identity: PathBuf,

    /// More output: -v info, -vv debug, -vvv trace
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored console output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Write the log to a file
    #[arg(long, short, global = true)]
    pub log: bool,

    /// Write a log file named after the serial number, date and result
    #[arg(long, global = true)]
    pub log_details: bool,

    /// Log file name, used with --log
    #[arg(long, global = true, default_value = "test.log")]
    pub log_file: PathBuf,

    /// Serial number for the detailed log file name
    #[arg(long, global = true)]
    pub serial_number: Option<String>,
}

impl GlobalOptions {
    /// Log file selection; `--log-details` wins over `--log`
    pub fn log_target(&self) -> LogFile {
        if self.log_details {
            LogFile::Detailed {
                serial_number: self.serial_number.clone(),
            }
        } else if self.log {
            LogFile::Plain(self.log_file.clone())
        } else {
            LogFile::Disabled
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run test files against the device
    Run {
        /// A .json test file, a .master manifest or a directory
        input: PathBuf,
    },

    /// Write the test descriptions to a text file
    #[command(alias = "d")]
    Describe {
        /// A .json test file, a .master manifest or a directory
        input: PathBuf,

        /// Output file (replaced)
        #[arg(long, short, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
    },

    /// Push a device configuration file to the device
    Configure {
        /// Device configuration JSON file
        device_config: PathBuf,

        /// Save the configuration to device memory after applying it
        #[arg(long)]
        save: bool,
    },

    /// List the entries manifests mark as not processed
    #[command(alias = "np")]
    Unprocessed {
        /// A .master manifest or a directory of manifests
        input: PathBuf,
    },
}
