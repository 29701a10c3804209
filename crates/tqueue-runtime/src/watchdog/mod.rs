//! Tick-driven watchdog for wait timeouts
//!
//! Time is counted in ticks. `System::tick` advances the watchdog and runs
//! the timeout branch of extraction for every waiter whose deadline came
//! due. Tests tick by hand; `ClockThread` ticks at the configured interval.
//!
//! The pending set is guarded by a plain mutex. It is taken while a queue
//! lock is held (arming and cancelling) but never the other way round:
//! expiry collects due entries, drops the mutex, and only then touches the
//! queues.

mod clock;
mod entry;
mod ticks;

pub use clock::{ClockHandle, ClockStats};
pub use entry::TimerHandle;

pub(crate) use clock::spawn_clock;
pub(crate) use entry::Expired;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tqueue_core::WaitStatus;

use crate::thread::Thread;
use entry::WatchdogEntry;
use ticks::TickQueue;

/// Watchdog counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogStats {
    /// Current tick
    pub now: u64,
    /// Armed and neither fired nor cancelled
    pub pending: usize,
    pub total_armed: u64,
    pub total_fired: u64,
    pub total_cancelled: u64,
}

pub struct Watchdog {
    inner: Mutex<TickQueue>,
}

impl Watchdog {
    pub fn new() -> Self {
        Watchdog {
            inner: Mutex::new(TickQueue::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TickQueue> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a timeout `ticks` from now for `thread`
    pub(crate) fn arm(&self, thread: &Arc<Thread>, ticks: u64, status: WaitStatus) -> TimerHandle {
        self.lock().insert(
            ticks,
            WatchdogEntry {
                thread: Arc::clone(thread),
                status,
            },
        )
    }

    /// Disarm; false if the timeout already fired or was cancelled
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        self.lock().remove(handle)
    }

    /// Advance the clock, returning the timeouts that came due
    pub(crate) fn advance(&self, ticks: u64) -> Vec<Expired> {
        self.lock().advance(ticks)
    }

    pub fn now(&self) -> u64 {
        self.lock().now()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.lock().next_deadline()
    }

    pub fn stats(&self) -> WatchdogStats {
        let inner = self.lock();
        WatchdogStats {
            now: inner.now(),
            pending: inner.len(),
            total_armed: inner.total_armed,
            total_fired: inner.total_fired,
            total_cancelled: inner.total_cancelled,
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}
