//! Thread queue control block
//!
//! What a resource object (mutex, semaphore, message queue) embeds to let
//! threads wait on it. The control block owns the queue lock and, while it
//! has waiters, a set of queue heads. A resource takes the lock with
//! [`ThreadQueue::acquire`], decides under its own invariant whether the
//! caller must wait, and hands the still-held [`QueueGuard`] to
//! [`QueueGuard::enqueue`]. Releasers take the lock, look at the first
//! waiter and hand it to [`QueueGuard::extract_critical`].
//!
//! The acquiring forms on [`ThreadQueue`] wrap the guard operations for
//! callers that have no invariant of their own to check.

mod boost;
mod enqueue;
mod extract;
mod flush;

pub use boost::{BoostEvent, BoostPolicy, RevertOnRelease};
pub use enqueue::EnqueueContext;
pub use extract::{extract, extract_with_proxy};

pub(crate) use extract::timeout;

use std::fmt;
use std::sync::Arc;

use tqueue_core::{fatal, FatalError, LockStats, ObjectId, Priority, TicketGuard, TicketLock};

use crate::discipline::Discipline;
use crate::heads::{HeadsArena, HeadsLink, ThreadQueueHeads};
use crate::system::System;
use crate::thread::Thread;

/// Mutable part of a queue, guarded by the queue lock
pub(crate) struct QueueState {
    pub(crate) discipline: Discipline,
    /// Linked heads; `None` exactly when `count` is zero
    heads: Option<HeadsLink>,
    /// Unlinked embedded heads of a uniprocessor queue
    spare: Option<Box<ThreadQueueHeads>>,
    pub(crate) count: usize,
    seq: u64,
}

impl QueueState {
    fn new(discipline: Discipline, system: &System) -> Self {
        let spare = (!system.is_smp())
            .then(|| Box::new(ThreadQueueHeads::new(system.config().scheduler_count)));
        QueueState {
            discipline,
            heads: None,
            spare,
            count: 0,
            seq: 0,
        }
    }

    /// Enqueue sequence number; breaks priority ties in arrival order
    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    /// Link heads if the queue has none yet, and return them
    pub(crate) fn acquire_heads<'a>(
        &'a mut self,
        arena: Option<&'a HeadsArena>,
        instances: usize,
    ) -> &'a mut ThreadQueueHeads {
        let spare = &mut self.spare;
        let link = self.heads.get_or_insert_with(|| match arena {
            Some(arena) => HeadsLink::Pooled(arena.acquire()),
            None => HeadsLink::Embedded(
                spare
                    .take()
                    .unwrap_or_else(|| Box::new(ThreadQueueHeads::new(instances))),
            ),
        });
        resolve_mut(link, arena)
    }

    /// Unlink the heads once the last waiter is gone
    pub(crate) fn release_heads_if_empty(&mut self, arena: Option<&HeadsArena>) {
        if self.count != 0 {
            return;
        }
        match self.heads.take() {
            Some(HeadsLink::Embedded(heads)) => {
                debug_assert!(heads.is_empty());
                self.spare = Some(heads);
            }
            Some(HeadsLink::Pooled(handle)) => {
                if let Some(arena) = arena {
                    arena.release(handle);
                }
            }
            None => {}
        }
    }

    pub(crate) fn heads<'a>(&'a self, arena: Option<&'a HeadsArena>) -> Option<&'a ThreadQueueHeads> {
        match self.heads.as_ref()? {
            HeadsLink::Embedded(heads) => Some(&**heads),
            HeadsLink::Pooled(handle) => arena.map(|arena| arena.get(handle)),
        }
    }

    pub(crate) fn heads_mut<'a>(&'a mut self, arena: Option<&'a HeadsArena>) -> Option<&'a mut ThreadQueueHeads> {
        self.heads.as_mut().map(|link| resolve_mut(link, arena))
    }

    pub(crate) fn has_heads(&self) -> bool {
        self.heads.is_some()
    }
}

fn resolve_mut<'a>(link: &'a mut HeadsLink, arena: Option<&'a HeadsArena>) -> &'a mut ThreadQueueHeads {
    match (link, arena) {
        (HeadsLink::Embedded(heads), _) => &mut **heads,
        (HeadsLink::Pooled(handle), Some(arena)) => arena.get_mut(handle),
        (HeadsLink::Pooled(_), None) => unreachable!("pooled heads on a system without an arena"),
    }
}

/// Shared part of a thread queue
///
/// Waiting threads hold an `Arc` to it in their wait link, which is how
/// timeouts and `extract` find the queue of a thread.
pub(crate) struct QueueCore {
    pub(crate) system: System,
    pub(crate) object: Option<ObjectId>,
    pub(crate) boost_policy: Option<Arc<dyn BoostPolicy>>,
    pub(crate) state: TicketLock<QueueState>,
}

impl QueueCore {
    #[inline]
    pub(crate) fn acquire(self: &Arc<Self>) -> QueueGuard<'_> {
        QueueGuard {
            core: self,
            state: self.state.lock(),
        }
    }

    #[inline]
    pub(crate) fn arena(&self) -> Option<&HeadsArena> {
        self.system.arena()
    }
}

/// A thread queue, embedded by one resource object
#[derive(Clone)]
pub struct ThreadQueue {
    core: Arc<QueueCore>,
}

/// Builder for a [`ThreadQueue`] with an object id or boost policy
pub struct ThreadQueueBuilder {
    system: System,
    discipline: Discipline,
    object: Option<ObjectId>,
    boost_policy: Option<Arc<dyn BoostPolicy>>,
}

impl ThreadQueueBuilder {
    pub fn discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Id of the owning object, used to tell remote objects apart
    pub fn object(mut self, id: ObjectId) -> Self {
        self.object = Some(id);
        self
    }

    /// Rule for reverting priority boosts this queue causes
    pub fn boost_policy(mut self, policy: Arc<dyn BoostPolicy>) -> Self {
        self.boost_policy = Some(policy);
        self
    }

    pub fn build(self) -> ThreadQueue {
        let state = QueueState::new(self.discipline, &self.system);
        ThreadQueue {
            core: Arc::new(QueueCore {
                system: self.system,
                object: self.object,
                boost_policy: self.boost_policy,
                state: TicketLock::new(state),
            }),
        }
    }
}

impl ThreadQueue {
    /// Empty queue releasing waiters in `discipline` order
    pub fn new(system: &System, discipline: Discipline) -> Self {
        Self::builder(system).discipline(discipline).build()
    }

    pub fn builder(system: &System) -> ThreadQueueBuilder {
        ThreadQueueBuilder {
            system: system.clone(),
            discipline: Discipline::None,
            object: None,
            boost_policy: None,
        }
    }

    /// Take the queue lock
    #[inline]
    pub fn acquire(&self) -> QueueGuard<'_> {
        self.core.acquire()
    }

    pub fn system(&self) -> &System {
        &self.core.system
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        self.core.object
    }

    pub fn discipline(&self) -> Discipline {
        self.acquire().state.discipline
    }

    /// Switch the discipline; refused (false) while threads wait
    pub fn set_discipline(&self, discipline: Discipline) -> bool {
        let mut guard = self.acquire();
        if guard.state.count != 0 {
            return false;
        }
        guard.state.discipline = discipline;
        true
    }

    /// The waiter that would leave next
    pub fn first(&self) -> Option<Arc<Thread>> {
        self.acquire().first()
    }

    pub fn waiters(&self) -> usize {
        self.acquire().waiters()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters() == 0
    }

    /// Whether queue heads are linked
    pub fn has_heads(&self) -> bool {
        self.acquire().has_heads()
    }

    /// Counters of the queue lock (zeros without `lock-stats`)
    pub fn lock_stats(&self) -> LockStats {
        self.core.state.stats()
    }

    /// Give a waiting thread a new real priority and re-sort it
    ///
    /// Returns true if `thread` waits on this queue. The priority is
    /// assigned either way.
    pub fn change_priority(&self, thread: &Arc<Thread>, priority: Priority) -> bool {
        let mut guard = self.acquire();
        thread.set_real_priority(priority);

        let arena = self.core.arena();
        let state = &mut *guard.state;
        let mut link = thread.wait.link.lock();
        if !link.is_on(&self.core) {
            return false;
        }
        let seq = state.next_seq();
        let discipline = link.position.discipline();
        if let Some(heads) = state.heads_mut(arena) {
            discipline.reposition(heads, thread, seq, &mut link);
        }
        true
    }

    /// Tear down an empty queue
    ///
    /// Destroying a queue that still has waiters is fatal: they would never
    /// be released.
    pub fn destroy(self) {
        let waiters = self.waiters();
        if waiters != 0 {
            fatal(FatalError::QueueNotEmpty { waiters });
        }
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Arc<QueueCore> {
        &self.core
    }
}

impl fmt::Debug for ThreadQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.acquire();
        f.debug_struct("ThreadQueue")
            .field("discipline", &guard.state.discipline)
            .field("waiters", &guard.state.count)
            .field("object", &self.core.object)
            .finish()
    }
}

/// Held queue lock
///
/// Dropping the guard releases the lock. The operations that must release
/// it before touching the scheduler (`enqueue`, `extract_critical`,
/// `unblock_critical`) consume the guard.
#[must_use = "the queue lock is released as soon as the guard is dropped"]
pub struct QueueGuard<'q> {
    core: &'q Arc<QueueCore>,
    state: TicketGuard<'q, QueueState>,
}

impl<'q> QueueGuard<'q> {
    /// The waiter that would leave next (first-locked)
    pub fn first(&self) -> Option<Arc<Thread>> {
        let heads = self.state.heads(self.core.arena())?;
        self.state.discipline.first(heads, self.core.system.scheduler())
    }

    pub fn waiters(&self) -> usize {
        self.state.count
    }

    pub fn has_heads(&self) -> bool {
        self.state.has_heads()
    }

    pub fn discipline(&self) -> Discipline {
        self.state.discipline
    }

    /// Release the lock before the end of the scope
    #[inline]
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::testutil;

    #[test]
    fn test_new_queue_is_empty() {
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        assert!(q.is_empty());
        assert!(!q.has_heads());
        assert!(q.first().is_none());
        assert_eq!(q.discipline(), Discipline::Fifo);
        assert_eq!(q.object_id(), None);
        q.destroy();
    }

    #[test]
    fn test_builder() {
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::builder(&sys)
            .discipline(Discipline::Priority)
            .object(ObjectId::new(1, 9))
            .boost_policy(Arc::new(RevertOnRelease))
            .build();
        assert_eq!(q.discipline(), Discipline::Priority);
        assert_eq!(q.object_id(), Some(ObjectId::new(1, 9)));
        assert!(q.core().boost_policy.is_some());
    }

    #[test]
    fn test_set_discipline_only_when_empty() {
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::None);
        assert!(q.set_discipline(Discipline::Priority));

        let t = sys.create_thread("w", Priority(4)).unwrap();
        let h = testutil::spawn_waiter(&sys, &q, &t);
        assert!(!q.set_discipline(Discipline::Fifo));
        assert_eq!(q.discipline(), Discipline::Priority);

        assert_eq!(q.flush(tqueue_core::WaitStatus::Successful), 1);
        h.join().unwrap();
        assert!(q.set_discipline(Discipline::Fifo));
    }

    #[test]
    fn test_heads_linked_iff_waiters() {
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        let a = sys.create_thread("a", Priority(1)).unwrap();
        let b = sys.create_thread("b", Priority(1)).unwrap();

        let ha = testutil::spawn_waiter(&sys, &q, &a);
        assert!(q.has_heads());
        let hb = testutil::spawn_waiter(&sys, &q, &b);
        assert_eq!(q.waiters(), 2);

        assert!(q.dequeue(tqueue_core::WaitStatus::Successful).is_some());
        assert!(q.has_heads());
        assert!(q.dequeue(tqueue_core::WaitStatus::Successful).is_some());
        assert!(!q.has_heads());
        assert_eq!(q.waiters(), 0);
        ha.join().unwrap();
        hb.join().unwrap();
    }

    #[test]
    fn test_pooled_heads_return_to_arena() {
        let (sys, _) = testutil::system(SystemConfig::multiprocessor(2).max_nonempty_queues(2));
        let q1 = ThreadQueue::new(&sys, Discipline::Priority);
        let q2 = ThreadQueue::new(&sys, Discipline::Fifo);
        let arena = sys.arena().unwrap();
        let a = sys.create_thread_on("a", Priority(3), 1).unwrap();
        let b = sys.create_thread_on("b", Priority(3), 0).unwrap();

        let ha = testutil::spawn_waiter(&sys, &q1, &a);
        assert_eq!(arena.available(), 1);
        let hb = testutil::spawn_waiter(&sys, &q2, &b);
        assert_eq!(arena.available(), 0);

        q1.flush(tqueue_core::WaitStatus::Successful);
        assert_eq!(arena.available(), 1);
        assert!(!q1.has_heads());
        q2.flush(tqueue_core::WaitStatus::Successful);
        assert_eq!(arena.available(), 2);
        ha.join().unwrap();
        hb.join().unwrap();
    }

    #[test]
    fn test_change_priority_resorts_waiter() {
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Priority);
        let a = sys.create_thread("a", Priority(5)).unwrap();
        let b = sys.create_thread("b", Priority(3)).unwrap();
        let ha = testutil::spawn_waiter(&sys, &q, &a);
        let hb = testutil::spawn_waiter(&sys, &q, &b);
        assert!(Arc::ptr_eq(&q.first().unwrap(), &b));

        assert!(q.change_priority(&a, Priority(1)));
        assert_eq!(a.priority(), Priority(1));
        assert!(Arc::ptr_eq(&q.first().unwrap(), &a));

        let idle = sys.create_thread("idle", Priority(9)).unwrap();
        assert!(!q.change_priority(&idle, Priority(2)));
        assert_eq!(idle.real_priority(), Priority(2));

        q.flush(tqueue_core::WaitStatus::Successful);
        ha.join().unwrap();
        hb.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "destroying a queue with 1 waiters")]
    fn test_destroy_with_waiters_is_fatal() {
        tqueue_core::kprint::set_log_level(tqueue_core::kprint::LogLevel::Off);
        let (sys, _) = testutil::system(SystemConfig::new());
        let q = ThreadQueue::new(&sys, Discipline::Fifo);
        let t = sys.create_thread("stuck", Priority(1)).unwrap();
        let _h = testutil::spawn_waiter(&sys, &q, &t);
        q.destroy();
    }
}
