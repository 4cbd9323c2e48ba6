//! Cooperative cancellation for test runs
//!
//! Signal handlers only raise flags; the interpreter and orchestrator look
//! at them between steps and between files. An in-flight read always runs
//! to its own timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Flags {
    stop_test: AtomicBool,
    stop_program: AtomicBool,
}

/// Shared stop-test / stop-program flags
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flags: Arc<Flags>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the current test file to stop at the next step boundary
    pub fn stop_test(&self) {
        self.flags.stop_test.store(true, Ordering::Release);
    }

    /// Ask the whole run to stop; also stops the current test file
    pub fn stop_program(&self) {
        self.flags.stop_program.store(true, Ordering::Release);
        self.flags.stop_test.store(true, Ordering::Release);
    }

    pub fn test_stopped(&self) -> bool {
        self.flags.stop_test.load(Ordering::Acquire)
    }

    pub fn program_stopped(&self) -> bool {
        self.flags.stop_program.load(Ordering::Acquire)
    }

    /// Re-arm the stop-test flag before the next file
    pub fn clear_test(&self) {
        self.flags.stop_test.store(false, Ordering::Release);
    }
}
