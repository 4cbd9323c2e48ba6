//! Integration tests for the procedure interpreter
//!
//! Test files are executed against a scripted device that answers each
//! command line with a queued reply.

use std::path::PathBuf;

use slcd::cancel::CancelToken;
use slcd::common::{Config, Result, Timing};
use slcd::procedure::{Identity, Interpreter, RunContext, TestFile};
use slcd::{DeviceLink, ScriptedLink};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fast_config() -> Config {
    Config {
        timing: Timing {
            char_pacing_ms: 0,
            poll_interval_ms: 1,
            settle_ms: 0,
            prompt_timeout_ms: 50,
            collect_timeout_ms: 10,
            quiet_window_ms: 5,
            config_response_timeout_ms: 10,
            link_timeout_ms: 100,
        },
        ..Config::default()
    }
}

fn context(identity: Identity) -> RunContext {
    RunContext::new(&fast_config(), identity, CancelToken::new())
}

fn identity() -> Identity {
    Identity::load(&fixture("identity.json")).unwrap()
}

#[test]
fn test_three_step_file_passes() {
    let file = TestFile::load(&fixture("vers.json")).unwrap();
    let ctx = context(Identity::default());
    let mut device = ScriptedLink::new();
    device.reply("G1PLUS1.0>").reply("OK>");

    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);

    assert!(verdict.passed, "{:?}", verdict);
    assert!(verdict.failed_steps.is_empty());
    assert_eq!(verdict.steps_run, 3);
    assert_eq!(device.written_lines(), vec!["COM0 VERS", "COM0 "]);
}

#[test]
fn test_mismatch_reports_step_and_continues() {
    let file = TestFile::load(&fixture("vers.json")).unwrap();
    let ctx = context(Identity::default());
    let mut device = ScriptedLink::new();
    device.reply("G1PLUS0.9>").reply("OK>");

    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);

    assert!(!verdict.passed);
    assert_eq!(verdict.steps_run, 3);
    assert_eq!(verdict.failed_steps.len(), 1);
    let failed = &verdict.failed_steps[0];
    assert_eq!(failed.step, 1);
    assert_eq!(failed.description, "Firmware version");
    assert!(failed.detail.contains("G1PLUS0.9"));
}

#[test]
fn test_framed_reply_split_across_chunks() {
    let file = TestFile::from_json(
        r#"{"testProcedures": [
            {"type": "simple", "command": "VERS", "retValue": "G1PLUS1.0", "retCursor": ">"}
        ]}"#,
    )
    .unwrap();
    let ctx = context(Identity::default());
    let mut device = ScriptedLink::new();
    device.reply_chunked(["[boot ok]{\"COM0\":\"G1PL", "US1.0\"}", "\r\n>"]);

    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);
    assert!(verdict.passed, "{:?}", verdict);
}

#[test]
fn test_error_cursor_fails_expected_prompt() {
    let file = TestFile::from_json(
        r#"{"testProcedures": [
            {"type": "simple", "command": "BOGUS", "retValue": "", "retCursor": ">"}
        ]}"#,
    )
    .unwrap();
    let ctx = context(Identity::default());
    let mut device = ScriptedLink::new();
    device.reply("!");

    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);
    assert!(!verdict.passed);
    assert!(verdict.failed_steps[0].detail.contains("Expected '>', got '!'"));
}

#[test]
fn test_lookup_primary_alternate_and_missing() {
    let file = TestFile::load(&fixture("panel.json")).unwrap();

    let ctx = context(identity());
    let mut device = ScriptedLink::new();
    device
        .reply("{\"COM0\":\"LCD16X2\"}>")
        .reply([0x0A, 0x0B, b'>']);
    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);
    assert!(verdict.passed, "{:?}", verdict);

    let mut device = ScriptedLink::new();
    device
        .reply("{\"COM0\":\"OLED\"}>")
        .reply([0x0A, 0x0B, b'>']);
    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);
    assert!(!verdict.passed);
    let detail = &verdict.failed_steps[0].detail;
    assert!(detail.contains("LCD20X4") && detail.contains("LCD16X2"), "{detail}");

    let ctx = context(Identity::default());
    let mut device = ScriptedLink::new();
    device
        .reply("{\"COM0\":\"LCD20X4\"}>")
        .reply([0x0A, 0x0B, b'>']);
    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);
    assert!(!verdict.passed);
    assert!(verdict.failed_steps[0]
        .detail
        .contains("No lookup value defined for 'PANEL_TYPE'"));
}

#[test]
fn test_binary_mismatch_position() {
    let file = TestFile::load(&fixture("panel.json")).unwrap();
    let ctx = context(identity());
    let mut device = ScriptedLink::new();
    device
        .reply("{\"COM0\":\"LCD20X4\"}>")
        .reply([0x0A, 0x0C, b'>']);

    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);
    assert!(!verdict.passed);
    assert_eq!(verdict.failed_steps.len(), 1);
    assert_eq!(verdict.failed_steps[0].step, 2);
    assert!(verdict.failed_steps[0]
        .detail
        .contains("Difference at position 1: Expected 0x0b, Got 0x0c"));
}

/// Scripted device that raises stop-test once a given number of command
/// lines has been written
struct CancellingLink {
    inner: ScriptedLink,
    cancel: CancelToken,
    after_lines: usize,
}

impl DeviceLink for CancellingLink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_bytes(bytes)?;
        if self.inner.written_lines().len() >= self.after_lines {
            self.cancel.stop_test();
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        self.inner.bytes_available()
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        self.inner.read_available()
    }

    fn reset_buffers(&mut self) -> Result<()> {
        self.inner.reset_buffers()
    }
}

#[test]
fn test_cancellation_stops_at_step_boundary() {
    let file = TestFile::load(&fixture("vers.json")).unwrap();
    let ctx = context(Identity::default());
    let mut inner = ScriptedLink::new();
    inner.reply("G1PLUS1.0>").reply("OK>");
    let mut device = CancellingLink {
        inner,
        cancel: ctx.cancel.clone(),
        after_lines: 1,
    };

    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);

    assert!(!verdict.passed);
    assert!(verdict.cancelled);
    assert_eq!(verdict.steps_run, 1);
    assert!(verdict.failed_steps.is_empty());
    assert_eq!(device.inner.written_lines(), vec!["COM0 VERS"]);
    assert_eq!(device.inner.pending_replies(), 1);
}

#[test]
fn test_disconnected_device_abandons_file() {
    let file = TestFile::load(&fixture("vers.json")).unwrap();
    let ctx = context(Identity::default());
    let mut device = ScriptedLink::new();
    device.fail_writes();

    let verdict = Interpreter::new(&mut device, &ctx).run_file(&file);

    assert!(!verdict.passed);
    assert_eq!(verdict.steps_run, 1);
    assert_eq!(device.write_calls(), 1);
    let fatal = verdict.fatal.unwrap();
    assert!(fatal.contains("device disconnected"), "{fatal}");
}
