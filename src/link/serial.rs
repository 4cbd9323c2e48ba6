//! Serial port link backed by the `serialport` crate

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use super::DeviceLink;
use crate::common::{Error, Result};

/// An open serial connection to the device
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").field("name", &self.name).finish()
    }
}

impl SerialLink {
    /// Open `port_name` at `baud_rate`
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| Error::link_open(port_name, e))?;

        tracing::debug!(port = port_name, baud_rate, "Serial port opened");
        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }

    /// Port name this link was opened with
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        tracing::debug!(port = %self.name, "Serial port closed");
    }
}

impl DeviceLink for SerialLink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .and_then(|()| self.port.flush())
            .map_err(|e| Error::LinkWrite(e.to_string()))
    }

    fn bytes_available(&mut self) -> Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| Error::LinkRead(e.to_string()))
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let available = self.bytes_available()?;
        if available == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; available];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(Error::LinkRead(e.to_string())),
        }
    }

    fn reset_buffers(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::All)
            .map_err(|e| Error::LinkRead(e.to_string()))
    }
}
