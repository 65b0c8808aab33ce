//! Fail-stop handling.
//!
//! A campaign never recovers from a fault. The process either completes and halts, or halts
//! early.

use std::error::Error;
use std::panic;
use std::process;

use tracing::error;

use crate::runtime::Runtime;

/// Logs `reason` and halts through the runtime.
pub fn fail_stop<R: Runtime>(runtime: &R, reason: &dyn Error) -> ! {
    error!(error = %reason, "fatal error, halting");
    runtime.halt()
}

/// Makes a panic on any thread log and abort the process instead of unwinding.
///
/// Without this a panicking lane would leave the scheduler waiting on it.
pub fn install_panic_hook() {
    let default = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        error!(%info, "panic in chaff campaign, aborting");
        default(info);
        process::abort();
    }));
}
