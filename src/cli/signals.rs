//! Operator signals
//!
//! Ctrl-C stops the whole run after the current step; a second Ctrl-C
//! exits at once. SIGUSR1 (Ctrl-Break on Windows) skips the rest of the
//! current test file.

use crate::cancel::CancelToken;

/// Install the signal listeners on the current tokio runtime
pub fn listen(cancel: CancelToken) {
    let program = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Could not listen for Ctrl-C");
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current step");
        program.stop_program();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received, exiting");
            std::process::exit(130);
        }
    });

    listen_stop_test(cancel);
}

#[cfg(unix)]
fn listen_stop_test(cancel: CancelToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigusr1 = match signal(SignalKind::user_defined1()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Could not listen for SIGUSR1: {}", e);
            return;
        }
    };
    tokio::spawn(async move {
        while sigusr1.recv().await.is_some() {
            tracing::warn!("SIGUSR1 received, skipping the rest of the current test");
            cancel.stop_test();
        }
    });
}

#[cfg(windows)]
fn listen_stop_test(cancel: CancelToken) {
    let mut ctrl_break = match tokio::signal::windows::ctrl_break() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Could not listen for Ctrl-Break: {}", e);
            return;
        }
    };
    tracing::debug!("Press Ctrl+Break to skip the current test");
    tokio::spawn(async move {
        while ctrl_break.recv().await.is_some() {
            tracing::warn!("Ctrl-Break received, skipping the rest of the current test");
            cancel.stop_test();
        }
    });
}

#[cfg(not(any(unix, windows)))]
fn listen_stop_test(_cancel: CancelToken) {}
