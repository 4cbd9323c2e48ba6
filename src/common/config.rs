//! Configuration file handling
//!
//! The tester reads a small JSON file naming the serial port and baud rate.
//! Every timing constant used by the link, framer and interpreter can be
//! overridden in its `timing` section.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_dir;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Serial port name (e.g. `/dev/ttyACM0`, `COM3`)
    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    /// Baud rate for the serial port
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,

    /// Channel tag prepended to every prompted command
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Timing settings
    #[serde(default)]
    pub timing: Timing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            baudrate: default_baudrate(),
            command_prefix: default_command_prefix(),
            timing: Timing::default(),
        }
    }
}

fn default_serial_port() -> String {
    "/dev/ttyACM0".to_string()
}
fn default_baudrate() -> u32 {
    115_200
}
fn default_command_prefix() -> String {
    "COM0".to_string()
}

/// Timing settings in milliseconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timing {
    /// Delay between characters of an outgoing command
    #[serde(default = "default_char_pacing")]
    pub char_pacing_ms: u64,

    /// Sleep between "bytes available" checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Settle time after buffer resets and raw writes
    #[serde(default = "default_settle")]
    pub settle_ms: u64,

    /// How long a prompted step waits for a cursor character
    #[serde(default = "default_prompt_timeout")]
    pub prompt_timeout_ms: u64,

    /// Response collection window for `command` steps
    #[serde(default = "default_collect_timeout")]
    pub collect_timeout_ms: u64,

    /// Discard window for `quiet` steps
    #[serde(default = "default_quiet_window")]
    pub quiet_window_ms: u64,

    /// Framer poll timeout while pushing device configuration
    #[serde(default = "default_config_response_timeout")]
    pub config_response_timeout_ms: u64,

    /// Low-level read/write timeout handed to the serial driver
    #[serde(default = "default_link_timeout")]
    pub link_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            char_pacing_ms: default_char_pacing(),
            poll_interval_ms: default_poll_interval(),
            settle_ms: default_settle(),
            prompt_timeout_ms: default_prompt_timeout(),
            collect_timeout_ms: default_collect_timeout(),
            quiet_window_ms: default_quiet_window(),
            config_response_timeout_ms: default_config_response_timeout(),
            link_timeout_ms: default_link_timeout(),
        }
    }
}

fn default_char_pacing() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    100
}
fn default_settle() -> u64 {
    100
}
fn default_prompt_timeout() -> u64 {
    2000
}
fn default_collect_timeout() -> u64 {
    2000
}
fn default_quiet_window() -> u64 {
    1000
}
fn default_config_response_timeout() -> u64 {
    1000
}
fn default_link_timeout() -> u64 {
    5000
}

impl Timing {
    pub fn char_pacing(&self) -> Duration {
        Duration::from_millis(self.char_pacing_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_millis(self.prompt_timeout_ms)
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    pub fn config_response_timeout(&self) -> Duration {
        Duration::from_millis(self.config_response_timeout_ms)
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.link_timeout_ms)
    }
}

/// Append `.json` when the caller gave a bare name
pub fn with_json_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "json") {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".json");
        PathBuf::from(name)
    }
}

impl Config {
    /// Load configuration from `path`
    ///
    /// A missing file is looked up again in the platform config directory.
    /// If neither exists, or the file cannot be parsed, the built-in
    /// defaults are used and the problem is logged.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                tracing::debug!(
                    port = %config.serial_port,
                    baudrate = config.baudrate,
                    "Config loaded"
                );
                config
            }
            Err(e) => {
                tracing::error!("{}. Using default settings", e);
                let config = Self::default();
                tracing::error!(
                    "Using default serial port {} at {} baud",
                    config.serial_port,
                    config.baudrate
                );
                config
            }
        }
    }

    /// Load configuration, reporting why it could not be read
    pub fn try_load(path: &Path) -> Result<Self> {
        let path = with_json_extension(path);
        let resolved = if path.exists() {
            path
        } else {
            config_dir()
                .map(|dir| dir.join(path.file_name().unwrap_or(path.as_os_str())))
                .filter(|candidate| candidate.exists())
                .ok_or_else(|| {
                    Error::Config(format!("Config file {} not found", path.display()))
                })?
        };

        let content =
            std::fs::read_to_string(&resolved).map_err(|e| Error::file_read(&resolved, e))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
