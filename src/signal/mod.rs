//! Signal handling for graceful shutdown (SIGINT/SIGTERM)
//!
//! On the first signal the listener stops accepting requests and in-flight
//! audits are given a grace period to finish. A second signal skips the
//! wait.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default grace period for in-flight requests
pub const DEFAULT_GRACE_PERIOD_SECONDS: u64 = 10;

/// Signal handler state
#[derive(Debug)]
pub struct SignalState {
    shutdown_requested: AtomicBool,
    /// Second signal received
    immediate_exit: AtomicBool,
    signal_count: AtomicU8,
    /// Requests currently being audited
    in_flight: AtomicUsize,
    grace_period: Duration,
}

impl SignalState {
    pub fn new() -> Self {
        Self::with_grace_period(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECONDS))
    }

    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            immediate_exit: AtomicBool::new(false),
            signal_count: AtomicU8::new(0),
            in_flight: AtomicUsize::new(0),
            grace_period,
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn is_immediate_exit(&self) -> bool {
        self.immediate_exit.load(Ordering::SeqCst)
    }

    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Request shutdown without a signal (tests, embedding).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Handle a signal (SIGINT/SIGTERM)
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            self.shutdown_requested.store(true, Ordering::SeqCst);
            SignalAction::InitiateShutdown
        } else if count == 1 {
            self.immediate_exit.store(true, Ordering::SeqCst);
            SignalAction::ImmediateExit
        } else {
            SignalAction::Ignore
        }
    }

    /// Track a request until the returned guard drops.
    pub fn begin_request(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            state: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    state: Arc<SignalState>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop accepting, drain in-flight requests
    InitiateShutdown,
    /// Second signal: stop waiting
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

/// Signal handler that manages the signal state
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    pub fn with_state(state: Arc<SignalState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the process-wide SIGINT/SIGTERM handler. `on_shutdown` runs
    /// once, on the first signal. Must be called at most once per process.
    pub fn install<F>(&self, on_shutdown: F) -> Result<(), ctrlc::Error>
    where
        F: Fn() + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::InitiateShutdown => {
                tracing::info!("received interrupt signal, shutting down");
                on_shutdown();
            }
            SignalAction::ImmediateExit => {
                tracing::warn!("received second interrupt, not waiting for in-flight requests");
            }
            SignalAction::Ignore => {}
        })
    }

    /// Wait for in-flight requests to finish.
    ///
    /// Returns true if every request finished within the grace period,
    /// false on timeout or a second signal.
    pub fn wait_for_drain(&self) -> bool {
        let start = Instant::now();
        let grace_period = self.state.grace_period();

        while start.elapsed() < grace_period {
            if self.state.in_flight() == 0 {
                return true;
            }
            if self.state.is_immediate_exit() {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        self.state.in_flight() == 0
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
