// One side's wait/notify channel: a parking_lot Mutex + Condvar pair and the
// `waiting` flag that allows at most one parked caller per side.

use parking_lot::{Condvar, Mutex};
use std::time::Instant;

#[derive(Debug, Default)]
struct GateState {
    /// Set while a caller is blocked on this gate, and kept set while that
    /// caller holds the lease it obtained by blocking.
    parked: bool,
}

/// Why a park attempt did not yield a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// Someone else already holds the gate
    Busy,
    /// The deadline passed and the condition still did not hold
    TimedOut,
}

/// Bounded wait channel shared by one side of the ring.
///
/// ### Protocol
/// - A waiter calls [`park_until`](Self::park_until) with a poll closure.
///   The poll is evaluated under the gate mutex, so a notifier that changes
///   the ring state *before* calling [`notify`](Self::notify) can never be
///   missed.
/// - A successful park leaves the gate held. The holder must call
///   [`unpark`](Self::unpark) when its lease is returned.
#[derive(Debug, Default)]
pub struct WaitGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl WaitGate {
    pub const fn new() -> Self {
        Self {
            state: parking_lot::const_mutex(GateState { parked: false }),
            cond: Condvar::new(),
        }
    }

    /// Whether a caller is parked on (or holding) this gate.
    pub fn is_parked(&self) -> bool {
        self.state.lock().parked
    }

    /// Block until `poll` yields a value or `deadline` passes.
    ///
    /// `deadline == None` waits until signalled. `poll` is re-run after every
    /// wake-up and once more after the deadline expires.
    pub fn park_until<T>(
        &self,
        deadline: Option<Instant>,
        mut poll: impl FnMut() -> Option<T>,
    ) -> Result<T, GateError> {
        let mut state = self.state.lock();
        if state.parked {
            return Err(GateError::Busy);
        }
        state.parked = true;

        loop {
            if let Some(value) = poll() {
                return Ok(value);
            }
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        if let Some(value) = poll() {
                            return Ok(value);
                        }
                        state.parked = false;
                        return Err(GateError::TimedOut);
                    }
                }
                None => self.cond.wait(&mut state),
            }
        }
    }

    /// Release a gate held since a successful [`park_until`](Self::park_until).
    pub fn unpark(&self) {
        self.state.lock().parked = false;
    }

    /// Wake the parked caller, if any.
    pub fn notify(&self) {
        let state = self.state.lock();
        if state.parked {
            self.cond.notify_one();
        }
    }
}
