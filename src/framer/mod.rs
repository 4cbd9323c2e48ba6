//! Stream framer for the device's console output
//!
//! The device interleaves three kinds of output on one ASCII stream:
//! ```text
//! [debug text]            informational, square brackets
//! {"COM1": "value"}       command result, curly brackets
//! >  or  !                prompt cursor (ready / error)
//! ```
//! Bytes arrive in arbitrary chunks. [`StreamFramer`] accumulates them in a
//! single pending buffer, cuts out complete bracket spans as [`Frame`]s and
//! latches the most recent cursor as a [`PromptSignal`].

mod scan;

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use crate::common::Result;
use crate::link::DeviceLink;

/// Cursor character meaning "ready for the next command"
pub const READY_CURSOR: u8 = b'>';
/// Cursor character meaning "error"
pub const ERROR_CURSOR: u8 = b'!';

/// Latest cursor observed from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptSignal {
    /// `>` was seen
    Ready,
    /// `!` was seen
    Error,
    /// No cursor since the last send
    #[default]
    NotSeen,
}

impl PromptSignal {
    /// Map a cursor byte to its signal
    pub fn from_cursor(byte: u8) -> Option<Self> {
        match byte {
            READY_CURSOR => Some(Self::Ready),
            ERROR_CURSOR => Some(Self::Error),
            _ => None,
        }
    }

    /// The last cursor character in `chunk`, if any
    pub fn last_in(chunk: &[u8]) -> Option<Self> {
        chunk.iter().rev().find_map(|b| Self::from_cursor(*b))
    }

    /// The cursor ending `chunk`, ignoring trailing line terminators
    pub fn trailing(chunk: &[u8]) -> Option<Self> {
        chunk
            .iter()
            .rev()
            .find(|b| !matches!(b, b'\r' | b'\n'))
            .and_then(|b| Self::from_cursor(*b))
    }

    /// Parse the cursor notation used in test files (`>` or `!`)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Self::Ready),
            "!" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for PromptSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptSignal::Ready => write!(f, ">"),
            PromptSignal::Error => write!(f, "!"),
            PromptSignal::NotSeen => write!(f, "none"),
        }
    }
}

/// A decoded message cut from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `[...]` informational text
    Debug { text: String },
    /// `{...}` command echo or result
    Command { channel: String, value: String },
}

impl Frame {
    pub fn is_command(&self) -> bool {
        matches!(self, Frame::Command { .. })
    }

    /// The payload text of the frame
    pub fn text(&self) -> &str {
        match self {
            Frame::Debug { text } => text,
            Frame::Command { value, .. } => value,
        }
    }
}

/// What a [`StreamFramer::poll`] produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    /// A complete frame
    Frame(Frame),
    /// No frame, but unframed bytes were left in the buffer
    Raw(String),
    /// Nothing arrived at all
    Nothing,
}

/// Result of a poll: the outcome plus the latched prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub polled: Polled,
    pub prompt: PromptSignal,
}

/// Incremental framer for one open connection
#[derive(Debug, Default)]
pub struct StreamFramer {
    pending: Vec<u8>,
    frames: VecDeque<Frame>,
    prompt: PromptSignal,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, as on a fresh connection
    pub fn reset(&mut self) {
        self.pending.clear();
        self.frames.clear();
        self.prompt = PromptSignal::NotSeen;
    }

    /// Start a new send/wait cycle
    pub fn reset_prompt(&mut self) {
        self.prompt = PromptSignal::NotSeen;
    }

    /// Latest prompt observed since the last reset
    pub fn prompt(&self) -> PromptSignal {
        self.prompt
    }

    /// Bytes not yet framed
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Unframed bytes as text
    pub fn pending_text(&self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }

    /// Append a raw chunk and latch the last cursor character in it
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        if let Some(prompt) = PromptSignal::last_in(chunk) {
            tracing::debug!("Found cursor: '{}'", prompt);
            self.prompt = prompt;
        }
    }

    /// Cut every complete span out of the pending buffer and queue the
    /// frames. Returns how many frames were added.
    ///
    /// Square spans are taken before curly ones and the scan repeats until
    /// a full pass finds nothing, since removing one span can complete
    /// another around it.
    pub fn drain_frames(&mut self) -> usize {
        let mut added = 0;
        loop {
            let debug = scan::extract_spans(&mut self.pending, b'[', b']');
            if !debug.is_empty() {
                for content in &debug {
                    let frame = scan::debug_frame(content);
                    tracing::debug!("DEBUG '{}'", frame.text());
                    self.frames.push_back(frame);
                }
                added += debug.len();
                continue;
            }

            let commands = scan::extract_spans(&mut self.pending, b'{', b'}');
            if !commands.is_empty() {
                for content in &commands {
                    let frame = scan::command_frame(content);
                    tracing::debug!("RSP: {:?}", frame);
                    self.frames.push_back(frame);
                }
                added += commands.len();
                continue;
            }

            break;
        }

        self.tidy();
        added
    }

    /// Drop whitespace noise left between messages
    fn tidy(&mut self) {
        let leading = self
            .pending
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.pending.drain(..leading);
    }

    /// Pop the oldest queued frame
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Take every queued frame
    pub fn take_frames(&mut self) -> Vec<Frame> {
        self.frames.drain(..).collect()
    }

    /// Empty the queue, preferring the newest command frame over any
    /// debug frame
    fn take_preferred(&mut self) -> Option<Frame> {
        let mut frames = self.take_frames();
        let newest_command = frames.iter().rposition(Frame::is_command);
        match newest_command {
            Some(idx) => Some(frames.swap_remove(idx)),
            None => frames.pop(),
        }
    }

    /// Read from `link` until a frame is produced or `timeout` elapses
    ///
    /// Falls back to the unframed leftover text, then to
    /// [`Polled::Nothing`], so callers never wait past `timeout`.
    pub fn poll<L: DeviceLink + ?Sized>(
        &mut self,
        link: &mut L,
        timeout: Duration,
        interval: Duration,
    ) -> Result<PollResult> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if link.bytes_available()? > 0 {
                let chunk = link.read_available()?;
                self.feed(&chunk);
                self.drain_frames();
            }

            if let Some(frame) = self.take_preferred() {
                return Ok(PollResult {
                    polled: Polled::Frame(frame),
                    prompt: self.prompt,
                });
            }

            std::thread::sleep(interval);
        }

        let polled = if let Some(frame) = self.take_preferred() {
            Polled::Frame(frame)
        } else if !self.pending.is_empty() {
            let leftover = self.pending_text();
            tracing::debug!("Incomplete packet after timeout: {}", leftover);
            Polled::Raw(leftover)
        } else {
            Polled::Nothing
        };

        Ok(PollResult {
            polled,
            prompt: self.prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ScriptedLink;

    fn debug(text: &str) -> Frame {
        Frame::Debug { text: text.into() }
    }

    fn command(channel: &str, value: &str) -> Frame {
        Frame::Command {
            channel: channel.into(),
            value: value.into(),
        }
    }

    fn frames_for(chunks: &[&[u8]]) -> (Vec<Frame>, Vec<PromptSignal>) {
        let mut framer = StreamFramer::new();
        let mut prompts = Vec::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            framer.feed(chunk);
            framer.drain_frames();
            frames.extend(framer.take_frames());
            prompts.push(framer.prompt());
        }
        (frames, prompts)
    }

    #[test]
    fn test_duplicate_spans_extracted_exactly_once_each() {
        let mut framer = StreamFramer::new();
        framer.feed(b"[a][a]");
        assert_eq!(framer.drain_frames(), 2);
        assert_eq!(framer.take_frames(), vec![debug("a"), debug("a")]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_trailing_cursor_only_at_end() {
        assert_eq!(PromptSignal::trailing(b"\x01>\r\n"), Some(PromptSignal::Ready));
        assert_eq!(PromptSignal::trailing(b"\x0a!\x0b"), None);
        assert_eq!(PromptSignal::trailing(b"OK!"), Some(PromptSignal::Error));
        assert_eq!(PromptSignal::trailing(b"\r\n"), None);
    }

    #[test]
    fn test_partial_frame_across_chunks() {
        let (split, _) = frames_for(&[b"{CH", b"AN : \"ok\"}"]);
        let (whole, _) = frames_for(&[b"{CHAN : \"ok\"}"]);
        assert_eq!(split, vec![command("CHAN", "ok")]);
        assert_eq!(split, whole);
    }

    #[test]
    fn test_identical_inputs_give_identical_histories() {
        let chunks: &[&[u8]] = &[b"[boot", b"ing]\r\n{\"COM1\": \"X\"}", b"!", b" [x]>"];
        assert_eq!(frames_for(chunks), frames_for(chunks));
    }

    #[test]
    fn test_prompt_last_seen_wins_across_chunks() {
        let (_, prompts) = frames_for(&[b"!", b"text >"]);
        assert_eq!(prompts, vec![PromptSignal::Error, PromptSignal::Ready]);
    }

    #[test]
    fn test_prompt_last_seen_wins_within_chunk() {
        let mut framer = StreamFramer::new();
        framer.feed(b"> oops !");
        assert_eq!(framer.prompt(), PromptSignal::Error);
        framer.feed(b"no cursor here");
        assert_eq!(framer.prompt(), PromptSignal::Error);
        framer.reset_prompt();
        assert_eq!(framer.prompt(), PromptSignal::NotSeen);
    }

    #[test]
    fn test_square_spans_before_curly() {
        let mut framer = StreamFramer::new();
        framer.feed(b"{a[x]b}");
        framer.drain_frames();
        assert_eq!(
            framer.take_frames(),
            vec![debug("x"), command("", "ab")]
        );
    }

    #[test]
    fn test_unterminated_bracket_stays_pending() {
        let mut framer = StreamFramer::new();
        framer.feed(b"\r\n  [partial");
        assert_eq!(framer.drain_frames(), 0);
        assert_eq!(framer.pending(), b"[partial");

        framer.feed(b" done]");
        assert_eq!(framer.drain_frames(), 1);
        assert_eq!(framer.next_frame(), Some(debug("partial done")));
    }

    #[test]
    fn test_whitespace_only_buffer_cleared() {
        let mut framer = StreamFramer::new();
        framer.feed(b"[x]\r\n \t");
        framer.drain_frames();
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_poll_prefers_newest_command_frame() {
        let mut link = ScriptedLink::new();
        link.push_unsolicited(b"[dbg]{\"COM1\": \"first\"}{\"COM1\": \"second\"}[late]>");
        let mut framer = StreamFramer::new();
        let result = framer
            .poll(&mut link, Duration::from_millis(50), Duration::from_millis(1))
            .unwrap();
        assert_eq!(result.polled, Polled::Frame(command("COM1", "second")));
        assert_eq!(result.prompt, PromptSignal::Ready);
    }

    #[test]
    fn test_poll_falls_back_to_raw_leftover() {
        let mut link = ScriptedLink::new();
        link.push_unsolicited(b"G1PLUS1.0>");
        let mut framer = StreamFramer::new();
        let result = framer
            .poll(&mut link, Duration::from_millis(10), Duration::from_millis(1))
            .unwrap();
        assert_eq!(result.polled, Polled::Raw("G1PLUS1.0>".into()));
        assert_eq!(result.prompt, PromptSignal::Ready);
    }

    #[test]
    fn test_poll_reports_nothing() {
        let mut link = ScriptedLink::new();
        let mut framer = StreamFramer::new();
        let result = framer
            .poll(&mut link, Duration::from_millis(5), Duration::from_millis(1))
            .unwrap();
        assert_eq!(result.polled, Polled::Nothing);
        assert_eq!(result.prompt, PromptSignal::NotSeen);
    }

    #[test]
    fn test_poll_returns_already_queued_frame_at_zero_timeout() {
        let mut link = ScriptedLink::new();
        let mut framer = StreamFramer::new();
        framer.feed(b"[queued]");
        framer.drain_frames();
        let result = framer
            .poll(&mut link, Duration::ZERO, Duration::from_millis(1))
            .unwrap();
        assert_eq!(result.polled, Polled::Frame(debug("queued")));
    }

    #[test]
    fn test_prompt_parse() {
        assert_eq!(PromptSignal::parse(">"), Some(PromptSignal::Ready));
        assert_eq!(PromptSignal::parse("!"), Some(PromptSignal::Error));
        assert_eq!(PromptSignal::parse("#"), None);
    }
}
