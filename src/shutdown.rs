// MCAST-RECV — SHUTDOWN MODULE
// SIGINT handling: the handler performs a single atomic store, and the
// receive loop observes the flag between receive attempts.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Register the SIGINT handler. Called before any socket operation, so an
/// interrupt during setup still ends in a (zero-valued) final report.
///
/// SA_RESTART is deliberately left out of `sa_flags`: a blocked `recv` must
/// return EINTR when the signal lands, otherwise the loop never gets back to
/// the flag check.
pub fn install() -> io::Result<()> {
    // SAFETY: on_interrupt is a valid extern "C" fn with a stable address
    // and only performs a relaxed atomic store, which is async-signal-safe.
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = on_interrupt as *const () as libc::sighandler_t;
        sa.sa_flags = 0;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// The flag the receive loop polls between receive attempts.
pub fn flag() -> &'static AtomicBool {
    &SHUTDOWN
}
