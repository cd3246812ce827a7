//! Signal handling for graceful daemon shutdown.
//!
//! Unix signal handling (`SIGTERM`, `SIGINT`, `SIGHUP`) for clean
//! shutdown of the SVTS daemon. Uses atomic flags to communicate
//! shutdown requests to the main loop without blocking.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Signal types the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// `SIGTERM` - graceful termination request.
    Terminate,
    /// `SIGINT` - interrupt (Ctrl+C).
    Interrupt,
    /// `SIGHUP` - hangup, used here for config reload.
    Hangup,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Shared state between the signal handler and the main loop. All
/// fields use atomic operations for thread-safe access.
#[derive(Debug)]
pub struct SignalState {
    shutdown_requested: AtomicBool,
    reload_requested: AtomicBool,
    signal_count: AtomicU32,
    last_signal: AtomicU32,
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalState {
    /// Create a new signal state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            reload_requested: AtomicBool::new(false),
            signal_count: AtomicU32::new(0),
            last_signal: AtomicU32::new(0),
        }
    }

    /// Check if shutdown has been requested.
    #[inline]
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Check if reload has been requested (and clear the flag).
    #[inline]
    pub fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Request reload (can be called from any thread).
    pub fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::Relaxed);
    }

    fn record_signal(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        self.last_signal.store(kind as u32, Ordering::Relaxed);
    }

    /// Total number of signals received.
    #[must_use]
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Handle for signal management: holds the shared state and provides
/// methods to check for signals.
#[derive(Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Create a new signal handler and register Unix signal handlers.
    pub fn new() -> std::io::Result<Self> {
        let state = Arc::new(SignalState::new());
        let handler = Self {
            state: Arc::clone(&state),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        static SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
        static RELOAD_FLAG: AtomicBool = AtomicBool::new(false);

        let state = Arc::clone(&self.state);

        std::thread::spawn(move || loop {
            if SHUTDOWN_FLAG.swap(false, Ordering::Relaxed) {
                info!("shutdown signal received");
                state.request_shutdown();
                state.record_signal(SignalKind::Terminate);
            }
            if RELOAD_FLAG.swap(false, Ordering::Relaxed) {
                info!("reload signal received");
                state.request_reload();
                state.record_signal(SignalKind::Hangup);
            }
            if state.shutdown_requested() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        });

        unsafe {
            libc::signal(libc::SIGTERM, sigterm_handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, sigint_handler as libc::sighandler_t);
            libc::signal(libc::SIGHUP, sighup_handler as libc::sighandler_t);
        }

        extern "C" fn sigterm_handler(_: c_int) {
            SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sigint_handler(_: c_int) {
            SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sighup_handler(_: c_int) {
            RELOAD_FLAG.store(true, Ordering::Relaxed);
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Check if reload has been requested (clears the flag).
    #[inline]
    pub fn take_reload_request(&self) -> bool {
        self.state.take_reload_request()
    }

    /// Manually request shutdown.
    pub fn request_shutdown(&self) {
        info!("manual shutdown requested");
        self.state.request_shutdown();
    }

    /// The underlying signal state, for diagnostics.
    #[must_use]
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new().expect("failed to create signal handler")
    }
}

/// Block until a shutdown signal is received or `timeout` expires.
/// Returns `true` if shutdown was signaled, `false` on timeout.
pub fn wait_for_shutdown(handler: &SignalHandler, timeout: std::time::Duration) -> bool {
    let start = std::time::Instant::now();
    let poll_interval = std::time::Duration::from_millis(50);

    while start.elapsed() < timeout {
        if handler.shutdown_requested() {
            return true;
        }
        std::thread::sleep(poll_interval.min(timeout - start.elapsed()));
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_state_default() {
        let state = SignalState::new();
        assert!(!state.shutdown_requested());
        assert!(!state.take_reload_request());
        assert_eq!(state.signal_count(), 0);
    }

    #[test]
    fn test_shutdown_request() {
        let state = SignalState::new();
        state.request_shutdown();
        assert!(state.shutdown_requested());
    }

    #[test]
    fn test_reload_request_clears_after_take() {
        let state = SignalState::new();
        state.request_reload();
        assert!(state.take_reload_request());
        assert!(!state.take_reload_request());
    }

    #[test]
    fn test_signal_handler_manual_shutdown() {
        let handler = SignalHandler::new().unwrap();
        assert!(!handler.shutdown_requested());
        handler.request_shutdown();
        assert!(handler.shutdown_requested());
    }
}
