//! Scheduler seam
//!
//! The thread queues never decide who runs. They tell the scheduler that a
//! thread blocked or must become runnable, ask it which scheduler instance
//! holds the most important waiter, and ask it to raise or restore a
//! thread's priority for cross-instance boosting.

mod host;

pub use host::{HostScheduler, SchedulerStats};

use std::sync::Arc;

use tqueue_core::Priority;

use crate::thread::Thread;

/// Most important waiter of one scheduler instance
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub instance: usize,
    pub thread: &'a Arc<Thread>,
    pub priority: Priority,
    /// Enqueue sequence of `thread`; lower arrived earlier
    pub seq: u64,
}

pub trait Scheduler: Send + Sync {
    /// Number of scheduler instances
    fn instance_count(&self) -> usize;

    /// `thread` has committed to blocking; its state is already set
    fn block(&self, thread: &Thread);

    /// Make `thread` runnable again
    fn unblock(&self, thread: &Thread);

    /// Pick the instance whose candidate leaves the queue first
    ///
    /// `candidates` holds at most one entry per instance and is never empty.
    /// The default picks the most important priority; ties go to the earlier
    /// arrival.
    fn select_instance(&self, candidates: &[Candidate<'_>]) -> Option<usize> {
        candidates
            .iter()
            .min_by_key(|c| (c.priority, c.seq))
            .map(|c| c.instance)
    }

    /// Temporarily run `thread` at `priority`
    fn raise_priority(&self, thread: &Thread, priority: Priority);

    /// Undo `raise_priority`
    fn restore_priority(&self, thread: &Thread);

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::bare_thread;

    #[test]
    fn test_default_select_instance() {
        let sched = HostScheduler::new(3);
        let a = Arc::new(bare_thread(1, 0));
        let b = Arc::new(bare_thread(2, 1));
        let c = Arc::new(bare_thread(3, 2));
        let candidates = [
            Candidate { instance: 0, thread: &a, priority: Priority(5), seq: 0 },
            Candidate { instance: 1, thread: &b, priority: Priority(2), seq: 7 },
            Candidate { instance: 2, thread: &c, priority: Priority(2), seq: 3 },
        ];
        // equal priorities resolve by arrival, not instance number
        assert_eq!(sched.select_instance(&candidates), Some(2));
    }
}
