//! Thread state, priority and wait status types

use core::fmt;

/// Life-cycle state of a thread as far as the thread queues care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Runnable (executing or on a ready queue)
    Ready = 0,

    /// Blocked on a thread queue without a timeout
    WaitingOnQueue = 1,

    /// Blocked on a thread queue with a watchdog armed
    WaitingOnQueueWithTimeout = 2,
}

impl ThreadState {
    #[inline]
    pub const fn is_ready(&self) -> bool {
        matches!(self, ThreadState::Ready)
    }

    #[inline]
    pub const fn is_blocked(&self) -> bool {
        !self.is_ready()
    }

    #[inline]
    pub const fn has_timeout(&self) -> bool {
        matches!(self, ThreadState::WaitingOnQueueWithTimeout)
    }
}

impl From<u8> for ThreadState {
    fn from(v: u8) -> Self {
        match v {
            1 => ThreadState::WaitingOnQueue,
            2 => ThreadState::WaitingOnQueueWithTimeout,
            _ => ThreadState::Ready,
        }
    }
}

impl From<ThreadState> for u8 {
    fn from(state: ThreadState) -> u8 {
        state as u8
    }
}

/// Thread priority
///
/// Numerically lower values are more important. Priority 0 is the most
/// important level a thread can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Priority(pub u32);

impl Priority {
    /// The most important priority
    pub const HIGHEST: Priority = Priority(0);

    /// The least important priority
    pub const LOWEST: Priority = Priority(255);

    #[inline]
    pub const fn new(value: u32) -> Self {
        Priority(value)
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Check if `self` should run before `other`
    #[inline]
    pub const fn is_more_important_than(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority(128)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome a blocked thread observes once it resumes
///
/// Whoever removes the thread from its queue decides the status. Callers of
/// `enqueue` inspect it after the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WaitStatus {
    /// Released normally by the resource
    Successful = 1,

    /// The timeout expired before a release
    Timeout = 2,

    /// The resource owning the queue was deleted
    ObjectDeleted = 3,

    /// The waiting thread itself is being deleted
    ThreadDeleted = 4,

    /// The wait was interrupted (e.g. by a signal)
    Interrupted = 5,

    /// The resource could not satisfy the request
    Unsatisfied = 6,
}

impl WaitStatus {
    /// Raw code stored in an outcome cell (0 is reserved for "pending")
    #[inline]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Decode a raw code, `None` for the pending sentinel or unknown codes
    pub const fn from_code(code: u32) -> Option<WaitStatus> {
        match code {
            1 => Some(WaitStatus::Successful),
            2 => Some(WaitStatus::Timeout),
            3 => Some(WaitStatus::ObjectDeleted),
            4 => Some(WaitStatus::ThreadDeleted),
            5 => Some(WaitStatus::Interrupted),
            6 => Some(WaitStatus::Unsatisfied),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_successful(self) -> bool {
        matches!(self, WaitStatus::Successful)
    }
}

impl fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStatus::Successful => write!(f, "successful"),
            WaitStatus::Timeout => write!(f, "timeout"),
            WaitStatus::ObjectDeleted => write!(f, "object deleted"),
            WaitStatus::ThreadDeleted => write!(f, "thread deleted"),
            WaitStatus::Interrupted => write!(f, "interrupted"),
            WaitStatus::Unsatisfied => write!(f, "unsatisfied"),
        }
    }
}
