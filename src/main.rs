//! SLCD Tester - serial command tester for display controllers
//!
//! Drives the device over its serial port, sends the commands declared in
//! JSON test files and checks the responses.

use clap::Parser;
use slcd::cancel::CancelToken;
use slcd::commands::{Commands, GlobalOptions};
use slcd::common::logging;
use slcd::runner::report;
use slcd::{cli, Error};

#[derive(Parser)]
#[command(name = "slcd-tester", about = "Serial command tester for display controllers")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let color = !cli.options.no_color;

    report::set_color(color);
    let session = logging::init(cli.options.verbose, &cli.options.log_target(), color);
    if let Some(path) = session.path() {
        tracing::debug!("Writing to {}", path.display());
    }

    let cancel = CancelToken::new();
    cli::signals::listen(cancel.clone());

    let result = cli::dispatch(cli.command, &cli.options, cancel).await;

    match &result {
        Ok(Some(passed)) => {
            if let Some(path) = session.finish(*passed) {
                println!("Log file: {}", path.display());
            }
        }
        // Flush the log file before a possible exit below
        _ => drop(session),
    }

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if matches!(e, Error::NoTestFiles | Error::LinkOpen { .. }) {
            eprintln!("Check the input path and the serial port in the configuration file");
        }
        std::process::exit(1);
    }
}
