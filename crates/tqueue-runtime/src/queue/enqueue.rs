//! Enqueue and block
//!
//! All bookkeeping happens under the queue lock: the thread is inserted,
//! its back-reference and timeout are set up and its state becomes
//! blocked. Only then is the lock released, with dispatching disabled, so
//! nothing else runs on this processor before the thread commits to
//! blocking. The commit is a compare-and-swap on the wait flags; if an
//! extractor got there first the thread readies itself instead.

use std::sync::Arc;

use tqueue_core::{fatal, FatalError, ThreadState, TqError, TqResult, WaitStatus};

use super::boost::boost_locked;
use super::{QueueCore, QueueGuard, ThreadQueue};
use crate::dispatch;
use crate::mp::MpCallout;
use crate::thread::Thread;
use crate::tls;
use crate::wait::{BLOCKED, INTEND_TO_BLOCK};

/// Options of one enqueue
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueContext<'a> {
    timeout: Option<(u64, WaitStatus)>,
    boost_owner: Option<&'a Arc<Thread>>,
}

impl<'a> EnqueueContext<'a> {
    /// Wait forever, no boosting
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up after `ticks` with `status`; zero ticks means no timeout
    pub fn timeout(mut self, ticks: u64, status: WaitStatus) -> Self {
        self.timeout = (ticks > 0).then_some((ticks, status));
        self
    }

    /// Boost `owner` (the resource holder) if the new waiter outranks it
    /// from another scheduler instance
    ///
    /// Priority queues only; enqueueing on a FIFO queue with an owner set
    /// trips a debug assertion.
    pub fn boost_owner(mut self, owner: &'a Arc<Thread>) -> Self {
        self.boost_owner = Some(owner);
        self
    }

    pub fn timeout_ticks(&self) -> Option<u64> {
        self.timeout.map(|(ticks, _)| ticks)
    }
}

impl QueueCore {
    /// Insert `thread` and fill in its wait link; caller holds the lock
    pub(super) fn link_waiter(
        self: &Arc<Self>,
        state: &mut super::QueueState,
        thread: &Arc<Thread>,
        ctx: &EnqueueContext<'_>,
        callout: Option<MpCallout>,
    ) {
        let discipline = state.discipline;
        let seq = state.next_seq();
        let arena = self.arena();
        let heads = state.acquire_heads(arena, self.system.config().scheduler_count);

        let mut link = thread.wait.link.lock();
        debug_assert!(link.queue.is_none(), "{} already waits on a queue", thread.id());
        discipline.insert(heads, thread, seq, &mut link);
        link.queue = Some(Arc::clone(self));
        link.mp_callout = callout;
        if let Some((ticks, status)) = ctx.timeout {
            link.timer = Some(self.system.watchdog().arm(thread, ticks, status));
        }
        drop(link);

        if let Some(owner) = ctx.boost_owner {
            boost_locked(&self.system, heads, owner);
        }
        state.count += 1;
    }
}

impl<'q> QueueGuard<'q> {
    /// Block the executing `thread` on this queue (enqueue-critical)
    ///
    /// Consumes the lock. Returns once the thread has been released, with
    /// the status its releaser chose.
    pub fn enqueue(mut self, thread: &Arc<Thread>, ctx: &EnqueueContext<'_>) -> WaitStatus {
        if !tls::is_executing(thread) {
            fatal(FatalError::NotExecuting);
        }
        if self.state.discipline == crate::discipline::Discipline::None {
            fatal(FatalError::EnqueueWithoutDiscipline);
        }
        debug_assert!(
            ctx.boost_owner.is_none() || self.state.discipline == crate::discipline::Discipline::Priority,
            "priority boosting needs a priority queue"
        );

        thread.wait.outcome.reset();
        thread.wait.set_flags(INTEND_TO_BLOCK);
        self.core.link_waiter(&mut *self.state, thread, ctx, None);
        thread.set_state(if ctx.timeout.is_some() {
            ThreadState::WaitingOnQueueWithTimeout
        } else {
            ThreadState::WaitingOnQueue
        });

        let core = self.core;
        let cpu_self = dispatch::disable();
        self.release();

        let scheduler = core.system.scheduler();
        if thread.wait.try_change_flags(INTEND_TO_BLOCK, BLOCKED) {
            scheduler.block(thread);
        } else {
            // Extracted before we committed; nobody else will ready us
            scheduler.unblock(thread);
        }
        cpu_self.enable();

        thread.wait.outcome.get().unwrap_or(WaitStatus::Successful)
    }

    /// Put a multiprocessing proxy on this queue without suspending anyone
    ///
    /// When the proxy leaves the queue, `callout` runs instead of a local
    /// unblock.
    pub fn enqueue_proxy(mut self, proxy: &Arc<Thread>, callout: MpCallout) -> TqResult<()> {
        if !proxy.is_proxy() {
            return Err(TqError::InvalidConfig("enqueue_proxy needs a proxy thread"));
        }
        if proxy.is_waiting() {
            return Err(TqError::InvalidConfig("proxy already waits on a queue"));
        }
        if self.state.discipline == crate::discipline::Discipline::None {
            fatal(FatalError::EnqueueWithoutDiscipline);
        }

        proxy.wait.outcome.reset();
        proxy.wait.set_flags(BLOCKED);
        self.core.link_waiter(&mut *self.state, proxy, &EnqueueContext::new(), Some(callout));
        proxy.set_state(ThreadState::WaitingOnQueue);
        Ok(())
    }
}

impl ThreadQueue {
    /// Take the lock and block the executing `thread`
    pub fn enqueue(&self, thread: &Arc<Thread>, ctx: &EnqueueContext<'_>) -> WaitStatus {
        self.acquire().enqueue(thread, ctx)
    }

    /// Take the lock and link `proxy` (see [`QueueGuard::enqueue_proxy`])
    pub fn enqueue_proxy(&self, proxy: &Arc<Thread>, callout: MpCallout) -> TqResult<()> {
        self.acquire().enqueue_proxy(proxy, callout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::discipline::Discipline;
    use crate::testutil;
    use tqueue_core::{ObjectId, Priority};

    #[test]
    fn test_context_zero_ticks_means_forever() {
        let ctx = EnqueueContext::new().timeout(0, WaitStatus::Timeout);
        assert_eq!(ctx.timeout_ticks(), None);
        let ctx = EnqueueContext::new().timeout(7, WaitStatus::Timeout);
        assert_eq!(ctx.timeout_ticks(), Some(7));
    }

    #[test]
    fn test_enqueue_blocks_until_released() {
        let (sys, sched) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        let t = sys.create_thread("sleeper", Priority(5)).unwrap();

        let h = testutil::spawn_waiter(&sys, &q, &t);
        assert_eq!(t.state(), ThreadState::WaitingOnQueue);
        assert!(t.is_waiting());
        assert_eq!(sched.stats().blocks, 1);

        assert!(q.extract(&t, WaitStatus::Interrupted));
        assert_eq!(h.join().unwrap(), WaitStatus::Interrupted);
        assert!(t.is_ready());
        assert!(!t.is_waiting());
        assert_eq!(t.last_wait_status(), Some(WaitStatus::Interrupted));
        assert_eq!(sched.stats().unblocks, 1);
    }

    #[test]
    fn test_timeout_state_and_deadline() {
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        let t = sys.create_thread("timed", Priority(5)).unwrap();

        sys.advance(10);
        let h = testutil::spawn_waiter_with(&sys, &q, &t, Some(4), None);
        assert_eq!(t.state(), ThreadState::WaitingOnQueueWithTimeout);
        assert_eq!(t.wait_deadline(), Some(14));

        q.flush(WaitStatus::Successful);
        assert_eq!(h.join().unwrap(), WaitStatus::Successful);
        assert_eq!(t.wait_deadline(), None);
        assert_eq!(sys.watchdog().stats().pending, 0);
    }

    #[test]
    #[should_panic(expected = "fatal error: only the executing thread may block")]
    fn test_enqueue_foreign_thread_is_fatal() {
        tqueue_core::kprint::set_log_level(tqueue_core::kprint::LogLevel::Off);
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        let t = sys.create_thread("other", Priority(5)).unwrap();
        q.enqueue(&t, &EnqueueContext::new());
    }

    #[test]
    #[should_panic(expected = "fatal error: enqueue on a queue without a waiting discipline")]
    fn test_enqueue_without_discipline_is_fatal() {
        tqueue_core::kprint::set_log_level(tqueue_core::kprint::LogLevel::Off);
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::None);
        let t = sys.create_thread("me", Priority(5)).unwrap();
        t.attach().unwrap();
        q.enqueue(&t, &EnqueueContext::new());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "priority boosting needs a priority queue")]
    fn test_boost_owner_on_fifo_queue_asserts() {
        let (sys, _) = testutil::system(SystemConfig::multiprocessor(2));
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        let owner = sys.create_thread_on("owner", Priority(10), 0).unwrap();
        let t = sys.create_thread_on("me", Priority(2), 1).unwrap();
        t.attach().unwrap();
        q.enqueue(&t, &EnqueueContext::new().boost_owner(&owner));
    }

    static RELEASED: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

    fn note_release(_proxy: &Thread, id: ObjectId) {
        RELEASED.store(id.raw(), std::sync::atomic::Ordering::SeqCst);
    }

    #[test]
    fn test_proxy_release_runs_callout() {
        let (sys, sched) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Priority);
        let proxy = sys.create_proxy(ObjectId::new(2, 17), Priority(3)).unwrap();
        let id = ObjectId::new(1, 4);

        q.enqueue_proxy(&proxy, MpCallout::new(note_release, id)).unwrap();
        assert_eq!(q.waiters(), 1);
        assert!(proxy.state().is_blocked());
        assert!(q.enqueue_proxy(&proxy, MpCallout::do_nothing(id)).is_err());

        let local = sys.create_thread("local", Priority(3)).unwrap();
        assert!(q.enqueue_proxy(&local, MpCallout::do_nothing(id)).is_err());

        let released = q.dequeue(WaitStatus::Successful).unwrap();
        assert!(Arc::ptr_eq(&released, &proxy));
        assert_eq!(RELEASED.load(std::sync::atomic::Ordering::SeqCst), id.raw());
        assert_eq!(sched.stats().unblocks, 0);
        assert!(q.is_empty());
    }
}
