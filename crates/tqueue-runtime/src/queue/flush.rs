//! Flush: release every waiter
//!
//! One lock acquisition per waiter, so a long queue never keeps the lock
//! (and local interrupts) for more than one removal.

use tqueue_core::WaitStatus;

use super::ThreadQueue;

impl ThreadQueue {
    /// Release all waiters with `status`, in discipline order
    ///
    /// Returns how many threads were released. Threads that enqueue while
    /// the flush runs are released as well.
    pub fn flush(&self, status: WaitStatus) -> usize {
        let mut released = 0;
        while self.acquire().dequeue(status).is_some() {
            released += 1;
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::SystemConfig;
    use crate::discipline::Discipline;
    use crate::scheduler::{HostScheduler, Scheduler};
    use crate::system::System;
    use crate::testutil;
    use crate::thread::Thread;
    use tqueue_core::Priority;

    /// Host scheduler that remembers the order of unblocks
    struct RecordingScheduler {
        host: HostScheduler,
        unblocked: Mutex<Vec<u32>>,
    }

    impl Scheduler for RecordingScheduler {
        fn instance_count(&self) -> usize {
            self.host.instance_count()
        }
        fn block(&self, thread: &Thread) {
            self.host.block(thread)
        }
        fn unblock(&self, thread: &Thread) {
            self.unblocked.lock().unwrap().push(thread.priority().value());
            self.host.unblock(thread)
        }
        fn raise_priority(&self, thread: &Thread, priority: Priority) {
            self.host.raise_priority(thread, priority)
        }
        fn restore_priority(&self, thread: &Thread) {
            self.host.restore_priority(thread)
        }
        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn recording_system() -> (System, Arc<RecordingScheduler>) {
        let sched = Arc::new(RecordingScheduler {
            host: HostScheduler::new(1),
            unblocked: Mutex::new(Vec::new()),
        });
        let sys = System::builder(SystemConfig::new())
            .scheduler(sched.clone())
            .build()
            .unwrap();
        (sys, sched)
    }

    #[test]
    fn test_flush_priority_order() {
        let (sys, sched) = recording_system();
        let q = ThreadQueue::new(&sys, Discipline::Priority);
        let handles: Vec<_> = [5, 1, 3]
            .iter()
            .map(|&p| {
                let t = sys.create_thread(&format!("p{}", p), Priority(p)).unwrap();
                testutil::spawn_waiter(&sys, &q, &t)
            })
            .collect();
        assert_eq!(q.first().unwrap().priority(), Priority(1));

        assert_eq!(q.flush(WaitStatus::Successful), 3);
        assert_eq!(*sched.unblocked.lock().unwrap(), vec![1, 3, 5]);
        for h in handles {
            assert_eq!(h.join().unwrap(), WaitStatus::Successful);
        }
    }

    #[test]
    fn test_flush_releases_everyone_in_arrival_order() {
        let (sys, sched) = recording_system();
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        // Priorities only tag the threads; FIFO ignores them
        let arrival = [6, 2, 9, 4, 8, 1, 7, 3];
        let handles: Vec<_> = arrival
            .iter()
            .map(|&p| {
                let t = sys.create_thread(&format!("w{}", p), Priority(p)).unwrap();
                testutil::spawn_waiter(&sys, &q, &t)
            })
            .collect();
        assert_eq!(q.waiters(), 8);

        assert_eq!(q.flush(WaitStatus::ObjectDeleted), 8);
        assert!(q.is_empty());
        assert!(!q.has_heads());
        assert_eq!(*sched.unblocked.lock().unwrap(), arrival.to_vec());
        for h in handles {
            assert_eq!(h.join().unwrap(), WaitStatus::ObjectDeleted);
        }
        assert_eq!(sched.host.stats().unblocks, 8);
        assert_eq!(q.flush(WaitStatus::ObjectDeleted), 0);
    }

    #[test]
    fn test_flush_takes_lock_per_waiter() {
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let t = sys.create_thread(&format!("w{}", i), Priority(7)).unwrap();
                testutil::spawn_waiter(&sys, &q, &t)
            })
            .collect();

        let before = q.lock_stats().acquisitions;
        q.flush(WaitStatus::Successful);
        if cfg!(feature = "lock-stats") {
            // One per waiter plus the final empty look
            assert_eq!(q.lock_stats().acquisitions - before, 4);
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
