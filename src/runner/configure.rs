//! Device configuration push
//!
//! A device configuration file is a JSON object of sections. `device_info`
//! describes the unit; every other section maps setting names to values
//! that become device commands.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

use crate::common::config::with_json_extension;
use crate::common::{Error, Result, Timing};
use crate::framer::{Polled, StreamFramer};
use crate::link::{self, DeviceLink};

const DEVICE_INFO: &str = "device_info";
const NOT_SPECIFIED: &str = "Not specified";

/// Time the device needs to commit settings to non-volatile memory
const SAVE_SETTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub display_type: Option<String>,
}

/// Parsed device configuration file
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    pub info: Option<DeviceInfo>,
    /// Setting sections in file order
    pub sections: Vec<(String, Map<String, Value>)>,
}

impl DeviceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let path = with_json_extension(path);
        tracing::info!("Loading device configuration file: {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| Error::file_read(&path, e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let root: Map<String, Value> = serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("device configuration: {}", e)))?;

        let mut config = DeviceConfig::default();
        for (name, value) in root {
            if name == DEVICE_INFO {
                config.info = Some(serde_json::from_value(value)?);
                continue;
            }
            match value {
                Value::Object(settings) => config.sections.push((name, settings)),
                other => tracing::warn!("Section '{}' is not an object: {}", name, other),
            }
        }
        Ok(config)
    }

    /// Identification lines for the log
    pub fn info_lines(&self) -> Vec<String> {
        let info = self.info.clone().unwrap_or_default();
        vec![
            format!("Device name: {}", info.name.as_deref().unwrap_or(NOT_SPECIFIED)),
            format!("Part number: {}", info.part_number.as_deref().unwrap_or(NOT_SPECIFIED)),
            format!("Display type: {}", info.display_type.as_deref().unwrap_or(NOT_SPECIFIED)),
        ]
    }

    /// Device commands for every setting, in file order
    pub fn commands(&self) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|(_, settings)| settings.iter().map(|(key, value)| setting_command(key, value)))
            .collect()
    }
}

fn setting_command(key: &str, value: &Value) -> String {
    match value {
        Value::Bool(true) => format!("set {key}"),
        Value::Bool(false) => format!("clr {key}"),
        Value::String(s) => format!("{key} {s}"),
        other => format!("{key} {other}"),
    }
}

fn send_and_poll<L: DeviceLink + ?Sized>(
    link: &mut L,
    framer: &mut StreamFramer,
    timing: &Timing,
    command: &str,
) -> Result<()> {
    framer.reset_prompt();
    link::send_line(link, command, timing.char_pacing())?;
    let result = framer.poll(link, timing.config_response_timeout(), timing.poll_interval())?;
    match result.polled {
        Polled::Frame(frame) => tracing::info!("{}: {}", command, frame.text()),
        Polled::Raw(text) => tracing::info!("{}: {}", command, text.trim()),
        Polled::Nothing => tracing::debug!("{}: no response", command),
    }
    Ok(())
}

fn push_settings<L: DeviceLink + ?Sized>(
    link: &mut L,
    framer: &mut StreamFramer,
    timing: &Timing,
    config: &DeviceConfig,
    save: bool,
) -> Result<()> {
    for (section, settings) in &config.sections {
        tracing::info!("Configuring {}...", section);
        for (key, value) in settings {
            send_and_poll(link, framer, timing, &setting_command(key, value))?;
        }
    }

    if save {
        tracing::debug!("Saving configuration to device memory...");
        link::send_line(link, "SAVE", timing.char_pacing())?;
        std::thread::sleep(SAVE_SETTLE);
        tracing::debug!("Configuration saved to device memory");
    }
    Ok(())
}

/// Push `config` to the device, optionally saving it, then read back the
/// firmware version
pub fn apply<L: DeviceLink + ?Sized>(
    link: &mut L,
    timing: &Timing,
    config: &DeviceConfig,
    save: bool,
) -> Result<()> {
    for line in config.info_lines() {
        tracing::info!("{}", line);
    }

    let mut framer = StreamFramer::new();
    let result = push_settings(link, &mut framer, timing, config, save);
    if let Err(e) = &result {
        tracing::error!("Error applying device configuration: {}", e);
    } else {
        tracing::debug!("Device configuration applied");
    }

    let version = send_and_poll(link, &mut framer, timing, "VERS");
    result.and(version)
}
