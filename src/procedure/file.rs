//! Test file configuration types
//!
//! Defines the data structures for deserializing JSON test files:
//! ```json
//! {
//!   "version": "1.2",
//!   "commandName": "VERS",
//!   "testProcedures": [
//!     {"type": "simple", "command": "VERS", "retValue": "G1PLUS1.0", "retCursor": ">"}
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::common::{Error, Result};
use crate::framer::PromptSignal;

/// A complete test file
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestFile {
    /// Version of the test file
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: String,
    /// Name of the command under test
    #[serde(default)]
    pub command_name: String,
    /// Operator documentation for the command
    #[serde(default)]
    pub test_description: Option<TestDescription>,
    /// The ordered steps
    #[serde(default)]
    pub test_procedures: Vec<TestStep>,
}

impl TestFile {
    /// Load and parse a test file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_json(&content).map_err(|e| Error::test_file(path, e))
    }

    /// Parse a test file from JSON text
    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// Documentation block of a test file
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TestDescription {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Vec<ArgumentDoc>,
    #[serde(default)]
    pub examples: Vec<ExampleDoc>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub eeprom: bool,
}

/// One documented command argument
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ArgumentDoc {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A usage example: either a plain line or a described command list
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ExampleDoc {
    Text(String),
    Commands {
        #[serde(default)]
        description: String,
        #[serde(default)]
        commands: Vec<String>,
    },
}

/// Declared type of a step
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(from = "String")]
pub enum StepKind {
    /// Operator-facing comment, no device I/O
    Instruction,
    /// Send and log the response without judging it
    Command,
    /// Write raw bytes given as a comma-separated decimal list
    BinOut,
    /// Send, then read and discard for a fixed window
    Quiet,
    /// Compare the response bytes with a hex payload
    Binary,
    /// Compare extracted channel values with the lookup table
    DeviceSpecific,
    /// Search the response with a pattern
    Regex,
    Simple,
    Complex,
    /// Any other tag: send, wait for the prompt, log the text
    Unrecognized(String),
    /// Step without a `type` field
    #[default]
    Untyped,
}

impl From<String> for StepKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "instruction" => StepKind::Instruction,
            "command" => StepKind::Command,
            "binOut" => StepKind::BinOut,
            "quiet" => StepKind::Quiet,
            "binary" => StepKind::Binary,
            "device_specific" => StepKind::DeviceSpecific,
            "regex" => StepKind::Regex,
            "simple" => StepKind::Simple,
            "complex" => StepKind::Complex,
            "" => StepKind::Untyped,
            _ => StepKind::Unrecognized(tag),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            StepKind::Instruction => "instruction",
            StepKind::Command => "command",
            StepKind::BinOut => "binOut",
            StepKind::Quiet => "quiet",
            StepKind::Binary => "binary",
            StepKind::DeviceSpecific => "device_specific",
            StepKind::Regex => "regex",
            StepKind::Simple => "simple",
            StepKind::Complex => "complex",
            StepKind::Unrecognized(tag) => tag,
            StepKind::Untyped => "",
        };
        f.write_str(tag)
    }
}

/// A single step of a test file
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TestStep {
    #[serde(rename = "type", default)]
    pub kind: StepKind,
    /// Stimulus text (or decimal list for `binOut`)
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comment: String,
    /// Expected cursor: `>` or `!`
    #[serde(rename = "retCursor", default)]
    pub ret_cursor: String,
    /// Expected value; meaning depends on the step type
    #[serde(rename = "retValue", default, deserialize_with = "string_or_number")]
    pub ret_value: String,
    /// Delay in seconds applied around the response read
    #[serde(rename = "retDelay", default, deserialize_with = "string_or_number")]
    pub ret_delay: String,
    /// Pause in seconds after the step
    #[serde(rename = "pValue", default, deserialize_with = "string_or_number")]
    pub p_value: String,
}

impl TestStep {
    /// The expected prompt, if the step declares one
    pub fn expected_prompt(&self) -> Result<Option<PromptSignal>> {
        if self.ret_cursor.is_empty() {
            return Ok(None);
        }
        PromptSignal::parse(&self.ret_cursor).map(Some).ok_or_else(|| {
            Error::MalformedStep(format!(
                "retCursor must be '>' or '!', got '{}'",
                self.ret_cursor
            ))
        })
    }

    /// Post-response delay (`retDelay`)
    pub fn response_delay(&self) -> Result<Option<Duration>> {
        parse_seconds("retDelay", &self.ret_delay)
    }

    /// Pause after the step (`pValue`)
    pub fn pause(&self) -> Result<Option<Duration>> {
        parse_seconds("pValue", &self.p_value)
    }
}

fn parse_seconds(field: &str, value: &str) -> Result<Option<Duration>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let secs: f64 = value.parse().map_err(|_| {
        Error::MalformedStep(format!("{} is not a valid number: '{}'", field, value))
    })?;
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| Error::MalformedStep(format!("{} out of range: '{}'", field, value)))
}

/// Accept a JSON string or number (numbers are rendered as text)
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}
