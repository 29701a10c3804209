//! Waiting disciplines
//!
//! The order in which waiters leave a queue. The set is closed, so the
//! queue stores a [`Discipline`] tag and dispatches by `match` to a
//! stateless implementation of [`WaitDiscipline`].

pub mod chain;
pub(crate) mod fifo;
pub mod priority;

use std::sync::Arc;

use tqueue_core::{fatal, FatalError};

use crate::heads::ThreadQueueHeads;
use crate::scheduler::Scheduler;
use crate::thread::Thread;
use crate::wait::WaitLink;

use self::fifo::FifoDiscipline;
use self::priority::PriorityDiscipline;

/// Release order of a thread queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discipline {
    /// Not configured yet; enqueueing is fatal
    #[default]
    None,
    /// Arrival order
    Fifo,
    /// Most important priority first, arrival order among equals
    Priority,
}

/// Operations one discipline provides on a queue's heads
///
/// Callers hold the queue lock and the waiter's link lock.
pub(crate) trait WaitDiscipline {
    /// Add `thread`, recording its position in `link`
    fn insert(&self, heads: &mut ThreadQueueHeads, thread: &Arc<Thread>, seq: u64, link: &mut WaitLink);

    /// Remove the waiter whose position `link` records
    fn extract(&self, heads: &mut ThreadQueueHeads, link: &mut WaitLink) -> Option<Arc<Thread>>;

    /// The waiter that leaves next
    fn first(&self, heads: &ThreadQueueHeads, scheduler: &dyn Scheduler) -> Option<Arc<Thread>>;

    /// Move a waiter after its priority changed
    fn reposition(&self, heads: &mut ThreadQueueHeads, thread: &Arc<Thread>, seq: u64, link: &mut WaitLink);
}

impl Discipline {
    pub(crate) fn insert(self, heads: &mut ThreadQueueHeads, thread: &Arc<Thread>, seq: u64, link: &mut WaitLink) {
        match self {
            Discipline::None => fatal(FatalError::EnqueueWithoutDiscipline),
            Discipline::Fifo => FifoDiscipline.insert(heads, thread, seq, link),
            Discipline::Priority => PriorityDiscipline.insert(heads, thread, seq, link),
        }
    }

    pub(crate) fn extract(self, heads: &mut ThreadQueueHeads, link: &mut WaitLink) -> Option<Arc<Thread>> {
        match self {
            Discipline::None => None,
            Discipline::Fifo => FifoDiscipline.extract(heads, link),
            Discipline::Priority => PriorityDiscipline.extract(heads, link),
        }
    }

    pub(crate) fn first(self, heads: &ThreadQueueHeads, scheduler: &dyn Scheduler) -> Option<Arc<Thread>> {
        match self {
            Discipline::None => None,
            Discipline::Fifo => FifoDiscipline.first(heads, scheduler),
            Discipline::Priority => PriorityDiscipline.first(heads, scheduler),
        }
    }

    pub(crate) fn reposition(self, heads: &mut ThreadQueueHeads, thread: &Arc<Thread>, seq: u64, link: &mut WaitLink) {
        match self {
            Discipline::None => {}
            Discipline::Fifo => FifoDiscipline.reposition(heads, thread, seq, link),
            Discipline::Priority => PriorityDiscipline.reposition(heads, thread, seq, link),
        }
    }
}
