//! Cooperative Cancellation
//!
//! A one-shot flag written by an asynchronous event source (SIGINT on Unix)
//! and polled by the driver at round, case and indefinite-loop boundaries.
//! An in-flight `run` is never interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    flag: Arc<AtomicBool>,
}

impl CancellationController {
    /// Create a controller in the "not requested" state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent and safe from any thread.
    #[inline]
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Non-blocking poll
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Route SIGINT to this controller for the rest of the process lifetime.
    ///
    /// The handler only performs an atomic store. Installing again replaces
    /// the target; the previous flag stays alive (it is intentionally leaked).
    pub fn install_sigint_handler(&self) -> Result<(), std::io::Error> {
        let raw = Arc::into_raw(Arc::clone(&self.flag)) as *mut AtomicBool;
        SIGNAL_TARGET.store(raw, Ordering::Release);
        install_handler()
    }
}

/// Flag the signal handler writes to. Set once per install, never freed.
static SIGNAL_TARGET: AtomicPtr<AtomicBool> = AtomicPtr::new(std::ptr::null_mut());

#[cfg(unix)]
extern "C" fn sigint_handler(_sig: libc::c_int) {
    let target = SIGNAL_TARGET.load(Ordering::Acquire);
    if !target.is_null() {
        // SAFETY: the pointer comes from Arc::into_raw and is never released.
        unsafe { (*target).store(true, Ordering::Release) };
    }
}

#[cfg(unix)]
fn install_handler() -> Result<(), std::io::Error> {
    // SAFETY: sigaction is zero-initialisable; the handler is async-signal-safe.
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigint_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        if libc::sigemptyset(&mut sa.sa_mask) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        if libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut()) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

/// No-op on non-Unix (no SIGINT delivery through sigaction).
#[cfg(not(unix))]
fn install_handler() -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear_and_latches() {
        let cancel = CancellationController::new();
        assert!(!cancel.is_requested());

        cancel.request();
        cancel.request();
        assert!(cancel.is_requested());
    }

    #[test]
    fn clones_share_the_flag() {
        let cancel = CancellationController::new();
        let observer = cancel.clone();

        let setter = std::thread::spawn(move || cancel.request());
        setter.join().unwrap();

        assert!(observer.is_requested());
    }

    #[cfg(unix)]
    #[test]
    fn sigint_sets_installed_flag() {
        let cancel = CancellationController::new();
        cancel.install_sigint_handler().unwrap();

        // SAFETY: raising SIGINT on ourselves with our handler installed.
        unsafe {
            libc::raise(libc::SIGINT);
        }

        assert!(cancel.is_requested());
    }
}
