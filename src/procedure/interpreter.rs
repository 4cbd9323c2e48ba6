//! Procedure interpreter
//!
//! Executes a test file's steps in order against a device link. Each step
//! is acquired under the policy of its declared type and judged by the
//! matching comparison policy. Step errors never escape: they become
//! failed step results and execution moves on.

use std::time::{Duration, Instant};

use super::file::{StepKind, TestFile, TestStep};
use super::lookup::LookupTable;
use super::policy::{self, Verdict};
use crate::cancel::CancelToken;
use crate::common::{Config, Error, Result, Timing};
use crate::framer::{PromptSignal, StreamFramer};
use crate::link::{self, DeviceLink};

/// Everything a run needs besides the link itself
pub struct RunContext {
    pub timing: Timing,
    /// Channel tag prepended to prompted commands (empty for none)
    pub command_prefix: String,
    pub lookup: Box<dyn LookupTable + Send + Sync>,
    pub cancel: CancelToken,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("timing", &self.timing)
            .field("command_prefix", &self.command_prefix)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    pub fn new(
        config: &Config,
        lookup: impl LookupTable + Send + Sync + 'static,
        cancel: CancelToken,
    ) -> Self {
        Self {
            timing: config.timing.clone(),
            command_prefix: config.command_prefix.clone(),
            lookup: Box::new(lookup),
            cancel,
        }
    }
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// 1-based position in the file
    pub step: usize,
    pub passed: bool,
    pub description: String,
    /// Diagnostic behind the verdict
    pub detail: String,
}

/// Result of one test file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileVerdict {
    pub passed: bool,
    pub failed_steps: Vec<StepResult>,
    pub steps_run: usize,
    pub steps_total: usize,
    /// The file was stopped before its last step
    pub cancelled: bool,
    /// Why the file was abandoned, if it was
    pub fatal: Option<String>,
}

impl FileVerdict {
    /// A file that failed before any step could run
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            fatal: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// What a prompted send collected
#[derive(Debug, Default)]
struct Acquired {
    bytes: Vec<u8>,
    prompt: PromptSignal,
    timed_out: bool,
}

impl Acquired {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Step-execution engine bound to one link
pub struct Interpreter<'a, L: DeviceLink + ?Sized> {
    link: &'a mut L,
    framer: StreamFramer,
    ctx: &'a RunContext,
}

impl<'a, L: DeviceLink + ?Sized> Interpreter<'a, L> {
    pub fn new(link: &'a mut L, ctx: &'a RunContext) -> Self {
        Self {
            link,
            framer: StreamFramer::new(),
            ctx,
        }
    }

    /// Run every step of `file`, stopping early only on cancellation or a
    /// broken link
    pub fn run_file(&mut self, file: &TestFile) -> FileVerdict {
        let steps_total = file.test_procedures.len();
        tracing::debug!(
            command = %file.command_name,
            version = %file.version,
            "Test procedures"
        );

        let mut verdict = FileVerdict {
            steps_total,
            ..Default::default()
        };

        for (idx, step) in file.test_procedures.iter().enumerate() {
            let number = idx + 1;
            if self.ctx.cancel.test_stopped() {
                tracing::info!("Exiting current test at step {}", number);
                verdict.cancelled = true;
                break;
            }

            tracing::debug!("Processing step {}/{}: {}", number, steps_total, step.description);
            log_step(step);

            let (mut passed, mut detail) = match self.run_step(step) {
                Ok(v) => (v.passed, v.detail),
                Err(e) => {
                    tracing::error!("Step {}: {}", number, e);
                    if e.is_link_fatal() {
                        verdict.fatal = Some(format!("Step {}: {}", number, e));
                    }
                    (false, e.to_string())
                }
            };

            match step.pause() {
                Ok(Some(pause)) => {
                    tracing::debug!("Pause {:?}", pause);
                    std::thread::sleep(pause);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Step {}: {}", number, e);
                    passed = false;
                    detail = if detail.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}; {}", detail, e)
                    };
                }
            }

            verdict.steps_run = number;
            if passed {
                tracing::info!("Step {} passed: {}", number, step.description);
            } else {
                tracing::warn!("Step {} failed: {} ({})", number, step.description, detail);
                verdict.failed_steps.push(StepResult {
                    step: number,
                    passed,
                    description: step.description.clone(),
                    detail,
                });
            }

            if verdict.fatal.is_some() {
                break;
            }
        }

        verdict.passed =
            verdict.failed_steps.is_empty() && !verdict.cancelled && verdict.fatal.is_none();
        verdict
    }

    /// Acquire and judge a single step
    fn run_step(&mut self, step: &TestStep) -> Result<Verdict> {
        if step.kind == StepKind::Untyped {
            tracing::warn!("Step has no type; nothing sent");
            return Ok(Verdict::pass("No type declared"));
        }

        let ctx = self.ctx;
        let timing = &ctx.timing;
        self.link.reset_buffers()?;
        self.framer.reset();
        std::thread::sleep(timing.settle());

        let delay = step.response_delay()?;

        match &step.kind {
            StepKind::Instruction => {
                if !step.comment.is_empty() {
                    tracing::info!("{}", step.comment);
                }
                Ok(Verdict::pass(step.comment.clone()))
            }
            StepKind::Command => self.run_command(step, delay),
            StepKind::BinOut => {
                let verdict = self.run_bin_out(step)?;
                sleep_for(delay);
                Ok(verdict)
            }
            kind => {
                let acquired = self.send_and_wait(&step.command, *kind == StepKind::Binary)?;
                sleep_for(delay);
                self.judge(kind, step, acquired)
            }
        }
    }

    /// `command`: send the bare command, then log everything that arrives
    /// within the collection window
    fn run_command(&mut self, step: &TestStep, delay: Option<Duration>) -> Result<Verdict> {
        let ctx = self.ctx;
        let timing = &ctx.timing;
        tracing::info!("Sending: {}", step.command);
        link::send_line(&mut *self.link, &step.command, timing.char_pacing())?;
        std::thread::sleep(delay.unwrap_or_else(|| timing.settle()));

        let response =
            link::collect_for(&mut *self.link, timing.collect_timeout(), timing.poll_interval())?;
        self.framer.feed(&response);
        self.log_frames();

        let text = String::from_utf8_lossy(&response);
        tracing::info!("Response: {}", text);
        Ok(Verdict::pass(format!("Response: '{}'", text.trim())))
    }

    /// `binOut`: write raw bytes, expect nothing back
    fn run_bin_out(&mut self, step: &TestStep) -> Result<Verdict> {
        let data = policy::parse_decimal_bytes(&step.command)?;
        tracing::info!("Sending binary data: {}", hex::encode(&data));
        self.link.write_bytes(&data)?;
        std::thread::sleep(self.ctx.timing.settle());
        Ok(Verdict::pass(format!("Sent {} bytes", data.len())))
    }

    /// Apply the comparison policy for a prompted step
    fn judge(&mut self, kind: &StepKind, step: &TestStep, acquired: Acquired) -> Result<Verdict> {
        let judged = matches!(
            kind,
            StepKind::Binary
                | StepKind::DeviceSpecific
                | StepKind::Regex
                | StepKind::Simple
                | StepKind::Complex
        );
        if acquired.timed_out {
            if judged && acquired.bytes.is_empty() {
                return Err(Error::LinkTimeout(self.ctx.timing.prompt_timeout_ms));
            }
            tracing::warn!("Timeout waiting for cursor after command: '{}'", step.command);
        }

        let text = acquired.text();
        match kind {
            StepKind::Quiet => {
                let timing = &self.ctx.timing;
                let discarded =
                    link::collect_for(&mut *self.link, timing.quiet_window(), timing.poll_interval())?;
                tracing::debug!("Total received: {}", String::from_utf8_lossy(&discarded));
                Ok(Verdict::pass(format!("Discarded {} bytes", discarded.len())))
            }
            StepKind::Binary => {
                tracing::debug!("Processing binary response: {}", hex::encode(&acquired.bytes));
                policy::compare_binary(&acquired.bytes, &step.ret_value)
            }
            StepKind::DeviceSpecific => {
                policy::compare_device_specific(&text, &step.ret_value, &*self.ctx.lookup)
            }
            StepKind::Regex => policy::compare_regex(
                &text,
                &step.ret_value,
                step.expected_prompt()?,
                acquired.prompt,
            ),
            StepKind::Simple | StepKind::Complex => Ok(policy::compare_text(
                &text,
                &step.ret_value,
                step.expected_prompt()?,
                acquired.prompt,
            )),
            StepKind::Unrecognized(tag) => {
                tracing::warn!("Unrecognized step type '{}'; response not judged", tag);
                Ok(Verdict::pass(format!(
                    "Unrecognized type '{}', received '{}'",
                    tag,
                    text.trim()
                )))
            }
            StepKind::Instruction | StepKind::Command | StepKind::BinOut | StepKind::Untyped => {
                Err(Error::Internal(format!("'{}' is not a prompted step type", kind)))
            }
        }
    }

    /// Send `<prefix> <command>` and read until a chunk carries a cursor or
    /// the prompt timeout elapses
    ///
    /// Binary payloads may contain cursor bytes, so with `binary` set only a
    /// chunk ending in a cursor completes the read.
    fn send_and_wait(&mut self, command: &str, binary: bool) -> Result<Acquired> {
        let ctx = self.ctx;
        let timing = &ctx.timing;
        let line = if ctx.command_prefix.is_empty() {
            command.to_string()
        } else {
            format!("{} {}", ctx.command_prefix, command)
        };

        self.framer.reset_prompt();
        tracing::debug!("Sending command: '{}'", line);
        link::send_line(&mut *self.link, &line, timing.char_pacing())?;

        let mut acquired = Acquired {
            timed_out: true,
            ..Default::default()
        };
        let start = Instant::now();
        while start.elapsed() < timing.prompt_timeout() {
            if self.link.bytes_available()? > 0 {
                let chunk = self.link.read_available()?;
                acquired.bytes.extend_from_slice(&chunk);
                self.framer.feed(&chunk);
                self.log_frames();
                let done = if binary {
                    PromptSignal::trailing(&chunk)
                } else {
                    PromptSignal::last_in(&chunk)
                };
                if done.is_some() {
                    acquired.timed_out = false;
                    break;
                }
            }
            std::thread::sleep(timing.poll_interval());
        }

        acquired.prompt = self.framer.prompt();
        tracing::debug!(prompt = %acquired.prompt, "Received: {}", acquired.text());
        Ok(acquired)
    }

    fn log_frames(&mut self) {
        self.framer.drain_frames();
        for frame in self.framer.take_frames() {
            tracing::debug!(?frame, "Frame");
        }
    }
}

fn sleep_for(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tracing::debug!("Waiting for {:?} after the response", delay);
        std::thread::sleep(delay);
    }
}

fn log_step(step: &TestStep) {
    if !step.description.is_empty() {
        tracing::debug!("Description: {}", step.description);
    }
    if !step.comment.is_empty() {
        tracing::info!("Comment: {}", step.comment);
    }
    tracing::debug!(
        kind = %step.kind,
        command = %step.command,
        ret_cursor = %step.ret_cursor,
        ret_value = %step.ret_value,
        ret_delay = %step.ret_delay,
        pause = %step.p_value,
        "Step"
    );
}
