//! Error types for the thread-queue engine
//!
//! Two classes exist. A [`FatalError`] is a violated system invariant: it is
//! never returned, [`fatal`] logs it and aborts the current thread of
//! control. A [`TqError`] is a recoverable setup failure and travels through
//! ordinary `Result`s. Wait outcomes are neither; they are
//! [`WaitStatus`](crate::WaitStatus) codes.

use core::fmt;

/// Result type for recoverable operations
pub type TqResult<T> = Result<T, TqError>;

/// Conditions that corrupt shared queue state if execution continued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// Enqueue on a queue whose discipline is still `None`
    EnqueueWithoutDiscipline,

    /// The multiprocessor queue-heads arena ran out of slots
    HeadsExhausted { capacity: usize },

    /// A queue was destroyed while threads were still waiting on it
    QueueNotEmpty { waiters: usize },

    /// A thread other than the executing one tried to block itself
    NotExecuting,

    /// A thread names a scheduler instance the system does not have
    InvalidSchedulerIndex { index: usize, count: usize },
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::EnqueueWithoutDiscipline => {
                write!(f, "enqueue on a queue without a waiting discipline")
            }
            FatalError::HeadsExhausted { capacity } => {
                write!(f, "queue-heads arena exhausted ({} slots)", capacity)
            }
            FatalError::QueueNotEmpty { waiters } => {
                write!(f, "destroying a queue with {} waiters", waiters)
            }
            FatalError::NotExecuting => write!(f, "only the executing thread may block"),
            FatalError::InvalidSchedulerIndex { index, count } => {
                write!(f, "scheduler index {} out of range (count {})", index, count)
            }
        }
    }
}

impl std::error::Error for FatalError {}

/// Abort on a violated invariant
///
/// Logs at error level, then panics so the failure unwinds the offending
/// thread (and fails the test that provoked it).
#[cold]
#[inline(never)]
pub fn fatal(err: FatalError) -> ! {
    crate::kerror!("fatal: {}", err);
    panic!("fatal error: {}", err)
}

/// Recoverable errors of the runtime surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TqError {
    /// The calling OS thread is not attached to a kernel thread
    NotAttached,

    /// The calling OS thread already runs a kernel thread
    AlreadyAttached,

    /// The thread-id space is used up
    NoThreadIds,

    /// Configuration rejected by validation
    InvalidConfig(&'static str),

    /// A clock thread is already driving this system
    ClockAlreadyRunning,

    /// The OS refused to create a thread
    SpawnFailed,
}

impl fmt::Display for TqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TqError::NotAttached => write!(f, "no kernel thread attached to this OS thread"),
            TqError::AlreadyAttached => write!(f, "OS thread already runs a kernel thread"),
            TqError::NoThreadIds => write!(f, "thread ids exhausted"),
            TqError::InvalidConfig(why) => write!(f, "invalid configuration: {}", why),
            TqError::ClockAlreadyRunning => write!(f, "clock thread already running"),
            TqError::SpawnFailed => write!(f, "failed to spawn OS thread"),
        }
    }
}

impl std::error::Error for TqError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_display() {
        let e = FatalError::HeadsExhausted { capacity: 4 };
        assert_eq!(format!("{}", e), "queue-heads arena exhausted (4 slots)");

        let e = FatalError::InvalidSchedulerIndex { index: 3, count: 2 };
        assert_eq!(format!("{}", e), "scheduler index 3 out of range (count 2)");
    }

    #[test]
    fn test_error_display() {
        let e = TqError::InvalidConfig("tick interval must be non-zero");
        assert_eq!(
            format!("{}", e),
            "invalid configuration: tick interval must be non-zero"
        );
    }

    #[test]
    #[should_panic(expected = "fatal error: enqueue on a queue without a waiting discipline")]
    fn test_fatal_panics() {
        crate::kprint::set_log_level(crate::kprint::LogLevel::Off);
        fatal(FatalError::EnqueueWithoutDiscipline);
    }
}
