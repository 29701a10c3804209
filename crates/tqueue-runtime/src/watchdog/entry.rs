//! Watchdog handles and entries

use std::sync::Arc;

use tqueue_core::WaitStatus;

use crate::thread::Thread;

/// Identifies one armed timeout
///
/// Orders by deadline first, so it doubles as the key of the pending set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle {
    deadline: u64,
    seq: u64,
}

impl TimerHandle {
    #[inline]
    pub(crate) fn new(deadline: u64, seq: u64) -> Self {
        TimerHandle { deadline, seq }
    }

    /// Tick at which the timeout fires
    #[inline]
    pub fn deadline(&self) -> u64 {
        self.deadline
    }
}

/// A timeout that fired: the waiter and the status it should observe
pub(crate) struct Expired {
    pub handle: TimerHandle,
    pub thread: Arc<Thread>,
    pub status: WaitStatus,
}

pub(crate) struct WatchdogEntry {
    pub thread: Arc<Thread>,
    pub status: WaitStatus,
}
