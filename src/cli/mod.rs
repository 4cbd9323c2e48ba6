//! CLI command handling
//!
//! Dispatches CLI commands. Device I/O is blocking, so anything touching
//! the serial port runs on the blocking thread pool.

pub mod signals;

use crate::cancel::CancelToken;
use crate::commands::{Commands, GlobalOptions};
use crate::common::{Config, Error, Result};
use crate::link::SerialLink;
use crate::procedure::{Identity, RunContext};
use crate::runner::{self, configure, describe, discovery, report};

/// Dispatch a CLI command
///
/// Returns the run verdict for `run`, `None` for commands without one.
pub async fn dispatch(
    command: Commands,
    options: &GlobalOptions,
    cancel: CancelToken,
) -> Result<Option<bool>> {
    match command {
        Commands::Run { input } => {
            let config = Config::load(&options.config);
            let identity = load_identity(options);
            report::print_banner(&identity);

            let files = discovery::discover(&input)?;
            let ctx = RunContext::new(&config, identity, cancel);

            let summary = tokio::task::spawn_blocking(move || {
                let mut link = SerialLink::open(
                    &config.serial_port,
                    config.baudrate,
                    config.timing.link_timeout(),
                )?;
                tracing::info!("Testing on {}", link.name());
                Ok::<_, Error>(runner::run(&mut link, &ctx, &files))
            })
            .await
            .map_err(|e| Error::Internal(format!("Test run task failed: {e}")))??;

            report::print_summary(&summary);
            Ok(Some(summary.all_passed()))
        }

        Commands::Describe { input, output } => {
            describe::write(&input, &output)?;
            println!("Descriptions have been written to {}", output.display());
            Ok(None)
        }

        Commands::Configure {
            device_config,
            save,
        } => {
            let config = Config::load(&options.config);
            let device_config = configure::DeviceConfig::load(&device_config)?;

            tokio::task::spawn_blocking(move || {
                let mut link = SerialLink::open(
                    &config.serial_port,
                    config.baudrate,
                    config.timing.link_timeout(),
                )?;
                tracing::info!("Configuring device on {}", link.name());
                configure::apply(&mut link, &config.timing, &device_config, save)
            })
            .await
            .map_err(|e| Error::Internal(format!("Configuration task failed: {e}")))??;

            println!("Device configuration applied");
            Ok(None)
        }

        Commands::Unprocessed { input } => {
            let masters = discovery::master_files(&input)?;
            if masters.is_empty() {
                return Err(Error::Config(
                    "No .master files found. Please check your inputs".to_string(),
                ));
            }
            report::print_not_processed(&discovery::not_processed(&masters));
            Ok(None)
        }
    }
}

fn load_identity(options: &GlobalOptions) -> Identity {
    match Identity::load(&options.identity) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("{}. Device-specific checks will fail", e);
            Identity::default()
        }
    }
}
