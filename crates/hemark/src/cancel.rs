//! SIGINT handling.
//!
//! The handler only flips a flag; drivers poll it between pipeline steps, so
//! the in-flight backend call always returns before the run unwinds.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

static CANCELLED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_sig: libc::c_int) {
    CANCELLED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler. Call once at startup.
pub fn install_sigint_handler() {
    let handler: extern "C" fn(libc::c_int) = on_sigint;
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

pub fn cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Fail with [`Error::Cancelled`] once SIGINT has been observed.
pub fn check() -> Result<()> {
    if cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Test hook: clear the flag.
#[doc(hidden)]
pub fn reset() {
    CANCELLED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_reflects_the_flag() {
        // The flag is process-global; hold the shared test lock so a driver
        // test never observes the transient cancelled state.
        let _guard = hemark_data::rng::lock_for_tests();
        reset();
        assert!(check().is_ok());
        CANCELLED.store(true, Ordering::SeqCst);
        assert!(matches!(check(), Err(Error::Cancelled)));
        reset();
    }
}
