//! Device link abstraction
//!
//! The tester talks to the device through a half-duplex, character-oriented
//! link. [`DeviceLink`] is the seam between the engine and the physical
//! port so that procedures can be exercised against [`ScriptedLink`].

mod scripted;
mod serial;

pub use scripted::ScriptedLink;
pub use serial::SerialLink;

use std::time::Duration;

use crate::common::Result;

/// Line terminator sent after every command
pub const LINE_TERMINATOR: u8 = b'\r';

/// Blocking primitives offered by a connected device
pub trait DeviceLink {
    /// Write raw bytes to the device
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Number of bytes waiting to be read
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read whatever is currently available (possibly nothing)
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Discard pending input and output
    fn reset_buffers(&mut self) -> Result<()>;
}

/// Send a text command followed by a carriage return
///
/// With a non-zero `pacing` each character is written separately with a
/// pause in between, for devices with a small receive buffer.
pub fn send_line<L: DeviceLink + ?Sized>(link: &mut L, text: &str, pacing: Duration) -> Result<()> {
    tracing::debug!("SER - {}", text);
    if pacing.is_zero() {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(LINE_TERMINATOR);
        return link.write_bytes(&line);
    }

    for byte in text.bytes() {
        link.write_bytes(&[byte])?;
        std::thread::sleep(pacing);
    }
    link.write_bytes(&[LINE_TERMINATOR])
}

/// Read until `window` elapses, returning everything received
pub fn collect_for<L: DeviceLink + ?Sized>(
    link: &mut L,
    window: Duration,
    poll_interval: Duration,
) -> Result<Vec<u8>> {
    let start = std::time::Instant::now();
    let mut received = Vec::new();
    while start.elapsed() < window {
        if link.bytes_available()? > 0 {
            let chunk = link.read_available()?;
            tracing::debug!("Direct read chunk: {}", String::from_utf8_lossy(&chunk));
            received.extend_from_slice(&chunk);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(received)
}
