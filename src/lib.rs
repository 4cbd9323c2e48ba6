//! SLCD Tester - drives a display controller over a serial link and
//! verifies its responses against JSON test files.
//!
//! The core is the [`framer`], which turns the device byte stream into
//! frames and a prompt signal, and the [`procedure`] interpreter, which
//! executes test steps and judges the responses.

pub mod cancel;
pub mod cli;
pub mod commands;
pub mod common;
pub mod framer;
pub mod link;
pub mod procedure;
pub mod runner;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use framer::{Frame, PromptSignal, StreamFramer};
pub use link::{DeviceLink, ScriptedLink};
