//! Thread control block
//!
//! Only the parts the thread queues touch: life-cycle state, priorities,
//! scheduler instance, the boost flag and the transient wait fields.
//! Creation goes through [`System`](crate::System) so ids and scheduler
//! instances are checked against the configuration.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tqueue_core::{ObjectId, Priority, ThreadId, ThreadState, TqError, TqResult, WaitStatus};

use crate::parking::{Parker, PlatformParker};
use crate::tls;
use crate::wait::ThreadWait;

/// Local thread, or stand-in for a thread on another node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadKind {
    Local,
    /// Waits on behalf of `remote`; never executes
    Proxy { remote: ObjectId },
}

pub struct Thread {
    id: ThreadId,
    name: String,
    kind: ThreadKind,
    scheduler_index: usize,
    state: AtomicU8,
    real_priority: AtomicU32,
    priority: AtomicU32,
    boosted: AtomicBool,
    parker: PlatformParker,
    pub(crate) wait: ThreadWait,
}

impl Thread {
    pub(crate) fn new(
        id: ThreadId,
        name: String,
        kind: ThreadKind,
        scheduler_index: usize,
        priority: Priority,
    ) -> Self {
        Thread {
            id,
            name,
            kind,
            scheduler_index,
            state: AtomicU8::new(ThreadState::Ready as u8),
            real_priority: AtomicU32::new(priority.value()),
            priority: AtomicU32::new(priority.value()),
            boosted: AtomicBool::new(false),
            parker: PlatformParker::new(),
            wait: ThreadWait::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ThreadKind {
        self.kind
    }

    #[inline]
    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, ThreadKind::Proxy { .. })
    }

    /// Scheduler instance this thread is assigned to
    #[inline]
    pub fn scheduler_index(&self) -> usize {
        self.scheduler_index
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        ThreadState::from(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    #[inline]
    pub(crate) fn set_state(&self, state: ThreadState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Effective priority, including any boost
    #[inline]
    pub fn priority(&self) -> Priority {
        Priority(self.priority.load(Ordering::Acquire))
    }

    /// Priority assigned by the thread's owner, ignoring boosts
    #[inline]
    pub fn real_priority(&self) -> Priority {
        Priority(self.real_priority.load(Ordering::Acquire))
    }

    /// Change the effective priority only; used by schedulers
    #[inline]
    pub fn set_effective_priority(&self, priority: Priority) {
        self.priority.store(priority.value(), Ordering::Release);
    }

    /// Assign a new real priority; the effective one follows unless boosted
    ///
    /// A thread that waits on a priority queue keeps its old position until
    /// the queue is told through `ThreadQueue::change_priority`.
    pub fn set_real_priority(&self, priority: Priority) {
        self.real_priority.store(priority.value(), Ordering::Release);
        if !self.is_boosted() {
            self.set_effective_priority(priority);
        }
    }

    /// Whether a cross-scheduler boost is in effect
    #[inline]
    pub fn is_boosted(&self) -> bool {
        self.boosted.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_boosted(&self, boosted: bool) {
        self.boosted.store(boosted, Ordering::Release);
    }

    /// Whether this thread currently waits on some thread queue
    pub fn is_waiting(&self) -> bool {
        self.wait.link.lock().queue.is_some()
    }

    /// Status of the most recent wait; `None` while it is still pending
    pub fn last_wait_status(&self) -> Option<WaitStatus> {
        self.wait.outcome.get()
    }

    /// Tick at which the current wait times out
    pub fn wait_deadline(&self) -> Option<u64> {
        self.wait.link.lock().timer.map(|t| t.deadline())
    }

    /// Make this thread the executing thread of the calling OS thread
    pub fn attach(self: &Arc<Self>) -> TqResult<()> {
        if self.is_proxy() {
            return Err(TqError::InvalidConfig("proxies never execute"));
        }
        if tls::set_executing(Arc::clone(self)) {
            Ok(())
        } else {
            Err(TqError::AlreadyAttached)
        }
    }

    /// Release the calling OS thread from its kernel thread
    pub fn detach() -> TqResult<Arc<Thread>> {
        tls::clear_executing().ok_or(TqError::NotAttached)
    }

    /// The kernel thread attached to the calling OS thread
    pub fn current() -> TqResult<Arc<Thread>> {
        tls::executing().ok_or(TqError::NotAttached)
    }

    /// Wake the OS thread behind this kernel thread
    #[inline]
    pub(crate) fn unpark(&self) {
        self.parker.unpark();
    }

    /// Context switch away from a thread that is no longer ready
    ///
    /// Returns once the scheduler has made the thread ready again.
    pub(crate) fn switch_away(&self) {
        while !self.is_ready() {
            self.parker.park(None);
        }
    }

    /// Whether the OS thread is asleep in `switch_away` (hint)
    pub fn is_suspended(&self) -> bool {
        self.parker.is_parked()
    }

    /// Spin until this thread is blocked on a queue, or `limit` elapses
    pub fn wait_until_blocked(&self, limit: Duration) -> bool {
        let deadline = std::time::Instant::now() + limit;
        while !self.state().is_blocked() {
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::yield_now();
        }
        true
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("scheduler_index", &self.scheduler_index)
            .field("state", &self.state())
            .field("priority", &self.priority())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(priority: u32) -> Arc<Thread> {
        Arc::new(Thread::new(
            ThreadId::new(1),
            "t".into(),
            ThreadKind::Local,
            0,
            Priority(priority),
        ))
    }

    #[test]
    fn test_new_thread_ready() {
        let t = make(7);
        assert!(t.is_ready());
        assert_eq!(t.priority(), Priority(7));
        assert_eq!(t.real_priority(), Priority(7));
        assert!(!t.is_waiting());
        assert!(!t.is_proxy());
    }

    #[test]
    fn test_real_priority_while_boosted() {
        let t = make(10);
        t.set_effective_priority(Priority(2));
        t.set_boosted(true);
        t.set_real_priority(Priority(8));
        assert_eq!(t.priority(), Priority(2));
        assert_eq!(t.real_priority(), Priority(8));

        t.set_boosted(false);
        t.set_real_priority(Priority(9));
        assert_eq!(t.priority(), Priority(9));
    }

    #[test]
    fn test_attach_detach() {
        let t = make(1);
        assert_eq!(Thread::current().unwrap_err(), TqError::NotAttached);
        t.attach().unwrap();
        assert_eq!(t.attach().unwrap_err(), TqError::AlreadyAttached);
        assert!(Arc::ptr_eq(&Thread::current().unwrap(), &t));
        assert!(tls::is_executing(&t));
        let back = Thread::detach().unwrap();
        assert!(Arc::ptr_eq(&back, &t));
        assert!(Thread::detach().is_err());
    }

    #[test]
    fn test_proxy_cannot_attach() {
        let p = Arc::new(Thread::new(
            ThreadId::new(2),
            "proxy".into(),
            ThreadKind::Proxy { remote: ObjectId::new(2, 5) },
            0,
            Priority::default(),
        ));
        assert!(p.is_proxy());
        assert!(p.attach().is_err());
    }

    #[test]
    fn test_switch_away_returns_when_ready() {
        let t = make(1);
        t.set_state(ThreadState::WaitingOnQueue);
        let waker = Arc::clone(&t);
        let h = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            waker.set_state(ThreadState::Ready);
            waker.unpark();
        });
        t.switch_away();
        assert!(t.is_ready());
        h.join().unwrap();
    }
}
