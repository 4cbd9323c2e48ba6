//! Device identity and lookup table
//!
//! The identity file describes the unit under test and carries the
//! `deviceSpecific` name/value pairs that `device_specific` steps compare
//! against. A name ending in `_alt` is the alternate for its base name.

use serde::Deserialize;
use std::path::Path;

use crate::common::config::with_json_extension;
use crate::common::{Error, Result};

/// Suffix marking an alternate lookup entry
pub const ALT_SUFFIX: &str = "_alt";

/// Identity data for the unit under test
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub device_family: Option<String>,
    #[serde(default)]
    pub panel_type: Option<String>,
    #[serde(default)]
    pub device_number: Option<String>,
    #[serde(default)]
    pub assembly_number: Option<String>,
    /// Raw entries; malformed ones are skipped at lookup time
    #[serde(default)]
    device_specific: serde_json::Value,
}

/// Primary and alternate expected values for one name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupEntry {
    pub primary: Option<String>,
    pub alternate: Option<String>,
}

impl LookupEntry {
    /// Neither the name nor its alternate is defined
    pub fn is_missing(&self) -> bool {
        self.primary.is_none() && self.alternate.is_none()
    }
}

/// Read-only name → expected value table
pub trait LookupTable {
    fn lookup(&self, name: &str) -> LookupEntry;
}

impl Identity {
    /// Load the identity file, falling back to `identity.json` in the
    /// working directory when the named file does not exist. A file that
    /// cannot be parsed yields an empty identity.
    pub fn load(path: &Path) -> Result<Self> {
        let path = with_json_extension(path);
        let path = if path.exists() {
            path
        } else {
            tracing::info!(
                "Identity file {} not found. Trying default file",
                path.display()
            );
            Path::new("identity.json").to_path_buf()
        };

        let content = std::fs::read_to_string(&path).map_err(|e| Error::file_read(&path, e))?;
        match Self::from_json(&content) {
            Ok(identity) => Ok(identity),
            Err(e) => {
                tracing::error!("Error parsing {}: {}. Using empty identity", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Banner lines describing the unit
    pub fn banner(&self) -> Vec<String> {
        vec![
            format!(
                "deviceFamily: {}",
                self.device_family.as_deref().unwrap_or("Unknown")
            ),
            format!("panelType: {}", self.panel_type.as_deref().unwrap_or("Unknown")),
            format!("deviceNumber: {}", self.device_number.as_deref().unwrap_or("")),
            format!(
                "assemblyNumber: {}",
                self.assembly_number.as_deref().unwrap_or("Unknown")
            ),
        ]
    }

    fn pairs(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        let entries: &[serde_json::Value] = match &self.device_specific {
            serde_json::Value::Array(entries) => entries.as_slice(),
            serde_json::Value::Null => &[],
            other => {
                tracing::debug!("'deviceSpecific' is not a list: {}", other);
                &[]
            }
        };
        entries.iter().filter_map(|entry| {
            let name = entry.get("name").and_then(|n| n.as_str());
            let value = entry.get("value");
            match (name, value) {
                (Some(name), Some(value)) => Some((name, value)),
                _ => {
                    tracing::debug!("Skipping unexpected deviceSpecific entry: {}", entry);
                    None
                }
            }
        })
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl LookupTable for Identity {
    fn lookup(&self, name: &str) -> LookupEntry {
        tracing::debug!("Device-specific lookup for: {}", name);
        let alt_name = format!("{name}{ALT_SUFFIX}");
        let mut entry = LookupEntry::default();

        for (pair_name, value) in self.pairs() {
            if pair_name == name {
                entry.primary = Some(value_text(value));
            } else if pair_name == alt_name {
                entry.alternate = Some(value_text(value));
            }
        }

        if entry.is_missing() {
            tracing::debug!("No config value found for {} or {}", name, alt_name);
        }
        entry
    }
}
