//! Transient wait fields of a thread
//!
//! Everything a thread carries only while it is associated with a queue.
//! The link (queue back-reference, position in the discipline, armed timer,
//! proxy callout) is guarded by a per-thread ticket lock that is always
//! taken after the owning queue's lock, never before it. The flags and the
//! outcome are atomics because the blocking thread reads them after it has
//! dropped the queue lock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tqueue_core::{TicketLock, WaitStatus};

use crate::discipline::chain::ChainIndex;
use crate::discipline::priority::PriorityKey;
use crate::discipline::Discipline;
use crate::mp::MpCallout;
use crate::queue::QueueCore;
use crate::watchdog::TimerHandle;

/// The thread is on a queue but has not suspended yet
pub(crate) const INTEND_TO_BLOCK: u32 = 1;
/// The thread committed to suspending; the extractor must unblock it
pub(crate) const BLOCKED: u32 = 2;
/// Extracted; whoever set this hands the thread back to the scheduler
pub(crate) const READY_AGAIN: u32 = 3;

/// Where a thread sits inside its queue's heads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Detached,
    Fifo(ChainIndex),
    Priority { instance: usize, key: PriorityKey },
}

impl Position {
    pub(crate) fn discipline(&self) -> Discipline {
        match self {
            Position::Detached => Discipline::None,
            Position::Fifo(_) => Discipline::Fifo,
            Position::Priority { .. } => Discipline::Priority,
        }
    }
}

pub(crate) struct WaitLink {
    /// Queue the thread waits on; `None` when not waiting
    pub(crate) queue: Option<Arc<QueueCore>>,
    pub(crate) position: Position,
    pub(crate) timer: Option<TimerHandle>,
    pub(crate) mp_callout: Option<MpCallout>,
}

impl WaitLink {
    /// Check the back-reference against `queue`
    #[inline]
    pub(crate) fn is_on(&self, queue: &QueueCore) -> bool {
        self.queue
            .as_ref()
            .is_some_and(|q| std::ptr::eq(Arc::as_ptr(q), queue))
    }
}

/// First-writer-wins cell holding the wait outcome
///
/// 0 means pending. Extraction and timeout both try to store their status;
/// only the first store takes effect.
pub(crate) struct OutcomeCell(AtomicU32);

impl OutcomeCell {
    const PENDING: u32 = 0;

    fn new() -> Self {
        OutcomeCell(AtomicU32::new(Self::PENDING))
    }

    pub(crate) fn reset(&self) {
        self.0.store(Self::PENDING, Ordering::Release);
    }

    /// Store `status` unless an outcome is already decided
    pub(crate) fn try_set(&self, status: WaitStatus) -> bool {
        self.0
            .compare_exchange(Self::PENDING, status.code(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn get(&self) -> Option<WaitStatus> {
        WaitStatus::from_code(self.0.load(Ordering::Acquire))
    }
}

pub(crate) struct ThreadWait {
    pub(crate) link: TicketLock<WaitLink>,
    pub(crate) flags: AtomicU32,
    pub(crate) outcome: OutcomeCell,
}

impl ThreadWait {
    pub(crate) fn new() -> Self {
        ThreadWait {
            link: TicketLock::new(WaitLink {
                queue: None,
                position: Position::Detached,
                timer: None,
                mp_callout: None,
            }),
            flags: AtomicU32::new(0),
            outcome: OutcomeCell::new(),
        }
    }

    /// Try to move the flags from `from` to `to`
    #[inline]
    pub(crate) fn try_change_flags(&self, from: u32, to: u32) -> bool {
        self.flags
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub(crate) fn set_flags(&self, flags: u32) {
        self.flags.store(flags, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_first_writer_wins() {
        let cell = OutcomeCell::new();
        assert_eq!(cell.get(), None);
        assert!(cell.try_set(WaitStatus::Timeout));
        assert!(!cell.try_set(WaitStatus::Successful));
        assert_eq!(cell.get(), Some(WaitStatus::Timeout));
        cell.reset();
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn test_flag_transitions() {
        let wait = ThreadWait::new();
        wait.set_flags(INTEND_TO_BLOCK);
        assert!(wait.try_change_flags(INTEND_TO_BLOCK, READY_AGAIN));
        assert!(!wait.try_change_flags(INTEND_TO_BLOCK, BLOCKED));
    }

    #[test]
    fn test_position_discipline() {
        assert_eq!(Position::Detached.discipline(), Discipline::None);
        assert_eq!(Position::Fifo(ChainIndex::new(0)).discipline(), Discipline::Fifo);
    }
}
