//! Admission control for in-flight decode work.
//!
//! A counting gate built on `Mutex` + `Condvar`. Permits are RAII guards and
//! return to the gate when dropped, including while a task is unwinding.
//! Waiting is done in short timed slices so a cancelled [`CancelToken`] is
//! noticed promptly instead of leaving a waiter parked forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How long a waiter sleeps before re-checking for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// Cooperative stop signal shared between the interrupt handler and workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Returned by [`AdmissionGate::acquire`] when the run was cancelled while
/// waiting for a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "interrupted while waiting for an admission permit")
    }
}

impl std::error::Error for Interrupted {}

#[derive(Debug)]
struct GateState {
    in_flight: usize,
    peak: usize,
}

/// Fixed-capacity gate bounding how many files are decoded at once.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    state: Mutex<GateState>,
    released: Condvar,
}

impl AdmissionGate {
    /// Creates a gate with `capacity` permits. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(GateState {
                in_flight: 0,
                peak: 0,
            }),
            released: Condvar::new(),
        }
    }

    // A panicking task must still be able to hand its permit back.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Highest number of permits ever held at the same time.
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    /// Blocks until a permit is free or `cancel` fires.
    ///
    /// A token that is already cancelled fails immediately, even if permits
    /// are available.
    pub fn acquire(&self, cancel: &CancelToken) -> Result<AdmissionPermit<'_>, Interrupted> {
        let mut state = self.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(Interrupted);
            }
            if state.in_flight < self.capacity {
                state.in_flight += 1;
                state.peak = state.peak.max(state.in_flight);
                return Ok(AdmissionPermit { gate: self });
            }
            state = self
                .released
                .wait_timeout(state, CANCEL_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        debug_assert!(state.in_flight > 0, "admission permit released twice");
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.released.notify_one();
    }
}

/// One admitted slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
