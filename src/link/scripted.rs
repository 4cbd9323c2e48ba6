//! In-memory device for tests and dry runs
//!
//! Replies are queued up front and released one per carriage return the
//! engine writes, mimicking a device that answers each command line.

use std::collections::VecDeque;

use super::{DeviceLink, LINE_TERMINATOR};
use crate::common::{Error, Result};

/// Scripted stand-in for a serial device
#[derive(Debug, Default)]
pub struct ScriptedLink {
    /// Replies waiting for the next command line, each split into chunks
    replies: VecDeque<Vec<Vec<u8>>>,
    /// Chunks the device has "sent" and the engine has not read yet
    inbound: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    write_calls: usize,
    resets: usize,
    fail_writes: bool,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply delivered as a single chunk
    pub fn reply(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.replies.push_back(vec![bytes.as_ref().to_vec()]);
        self
    }

    /// Queue a reply delivered across several reads
    pub fn reply_chunked<I, B>(&mut self, chunks: I) -> &mut Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.replies
            .push_back(chunks.into_iter().map(|c| c.as_ref().to_vec()).collect());
        self
    }

    /// Make bytes readable right away, without waiting for a command
    pub fn push_unsolicited(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.inbound.push_back(bytes.as_ref().to_vec());
        self
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&mut self) -> &mut Self {
        self.fail_writes = true;
        self
    }

    /// Every byte written so far
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Written bytes split into command lines (terminator removed)
    pub fn written_lines(&self) -> Vec<String> {
        self.written
            .split(|b| *b == LINE_TERMINATOR)
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Number of `write_bytes` calls
    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    /// Number of buffer resets requested
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Replies not yet released
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }
}

impl DeviceLink for ScriptedLink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_calls += 1;
        if self.fail_writes {
            return Err(Error::LinkWrite("device disconnected".to_string()));
        }
        self.written.extend_from_slice(bytes);
        for _ in bytes.iter().filter(|b| **b == LINE_TERMINATOR) {
            if let Some(reply) = self.replies.pop_front() {
                self.inbound.extend(reply);
            }
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.inbound.front().map_or(0, Vec::len))
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        Ok(self.inbound.pop_front().unwrap_or_default())
    }

    fn reset_buffers(&mut self) -> Result<()> {
        self.resets += 1;
        self.inbound.clear();
        Ok(())
    }
}
