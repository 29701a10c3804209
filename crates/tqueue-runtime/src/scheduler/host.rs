//! Scheduler for host threads
//!
//! Every kernel thread has an OS thread of its own, so there is no ready
//! queue to manage: making a thread runnable means marking it ready and
//! waking its OS thread.

use std::sync::atomic::{AtomicU64, Ordering};

use tqueue_core::{Priority, ThreadState};

use super::Scheduler;
use crate::thread::Thread;

/// Counters kept by [`HostScheduler`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub blocks: u64,
    pub unblocks: u64,
    pub raises: u64,
    pub restores: u64,
}

pub struct HostScheduler {
    instances: usize,
    blocks: AtomicU64,
    unblocks: AtomicU64,
    raises: AtomicU64,
    restores: AtomicU64,
}

impl HostScheduler {
    pub fn new(instances: usize) -> Self {
        HostScheduler {
            instances: instances.max(1),
            blocks: AtomicU64::new(0),
            unblocks: AtomicU64::new(0),
            raises: AtomicU64::new(0),
            restores: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            blocks: self.blocks.load(Ordering::Relaxed),
            unblocks: self.unblocks.load(Ordering::Relaxed),
            raises: self.raises.load(Ordering::Relaxed),
            restores: self.restores.load(Ordering::Relaxed),
        }
    }
}

impl Scheduler for HostScheduler {
    fn instance_count(&self) -> usize {
        self.instances
    }

    fn block(&self, _thread: &Thread) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    fn unblock(&self, thread: &Thread) {
        self.unblocks.fetch_add(1, Ordering::Relaxed);
        thread.set_state(ThreadState::Ready);
        thread.unpark();
    }

    fn raise_priority(&self, thread: &Thread, priority: Priority) {
        self.raises.fetch_add(1, Ordering::Relaxed);
        thread.set_effective_priority(priority);
    }

    fn restore_priority(&self, thread: &Thread) {
        self.restores.fetch_add(1, Ordering::Relaxed);
        thread.set_effective_priority(thread.real_priority());
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::bare_thread;

    #[test]
    fn test_unblock_marks_ready() {
        let sched = HostScheduler::new(1);
        let t = bare_thread(1, 0);
        t.set_state(ThreadState::WaitingOnQueue);
        sched.unblock(&t);
        assert!(t.is_ready());
        assert_eq!(sched.stats().unblocks, 1);
    }

    #[test]
    fn test_raise_restore() {
        let sched = HostScheduler::new(2);
        let t = bare_thread(10, 0);
        sched.raise_priority(&t, Priority(2));
        assert_eq!(t.priority(), Priority(2));
        sched.restore_priority(&t);
        assert_eq!(t.priority(), Priority(10));
        assert_eq!(sched.stats().raises, 1);
        assert_eq!(sched.stats().restores, 1);
    }
}
