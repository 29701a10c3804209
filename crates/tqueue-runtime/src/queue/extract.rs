//! Extract and unblock
//!
//! Removal happens under the queue lock; the scheduler is only told after
//! the lock is gone, with dispatching disabled in between. Explicit
//! releases, timeouts and `extract` on a thread's back-reference all meet
//! in [`QueueGuard::extract_locked`], so whichever takes the queue lock
//! first removes the thread and the others find it gone.

use std::sync::Arc;

use tqueue_core::{ktrace, WaitStatus};

use super::boost::BoostEvent;
use super::{QueueCore, QueueGuard, ThreadQueue};
use crate::dispatch;
use crate::thread::Thread;
use crate::wait::{Position, INTEND_TO_BLOCK, READY_AGAIN};
use crate::watchdog::Expired;

impl<'q> QueueGuard<'q> {
    /// Remove `thread` if it waits here; `None` if it does not
    ///
    /// `Some(true)` means the caller must unblock the thread, `Some(false)`
    /// that the thread had not committed to blocking yet and readies itself.
    fn extract_waiter(&mut self, thread: &Arc<Thread>, status: WaitStatus) -> Option<bool> {
        let core = self.core;
        let arena = core.arena();
        let state = &mut *self.state;

        let mut link = thread.wait.link.lock();
        if !link.is_on(core) {
            return None;
        }
        thread.wait.outcome.try_set(status);
        if let Some(timer) = link.timer.take() {
            core.system.watchdog().cancel(timer);
        }

        let discipline = link.position.discipline();
        if let Some(heads) = state.heads_mut(arena) {
            let removed = discipline.extract(heads, &mut link);
            debug_assert!(removed.is_some_and(|t| Arc::ptr_eq(&t, thread)));
        }
        link.queue = None;
        link.position = Position::Detached;
        drop(link);

        state.count -= 1;
        state.release_heads_if_empty(arena);

        if thread.wait.try_change_flags(INTEND_TO_BLOCK, READY_AGAIN) {
            Some(false)
        } else {
            thread.wait.set_flags(READY_AGAIN);
            Some(true)
        }
    }

    /// Remove `thread` from this queue with `status` (extract-locked)
    ///
    /// Returns true if the caller must pass the thread to
    /// [`unblock_critical`](Self::unblock_critical). False either when the
    /// thread readies itself or when it does not wait here at all; a
    /// second extraction of the same thread changes nothing.
    pub fn extract_locked(&mut self, thread: &Arc<Thread>, status: WaitStatus) -> bool {
        self.extract_waiter(thread, status).unwrap_or(false)
    }

    /// Release the lock and, if `unblock`, make `thread` runnable
    ///
    /// Always consumes the lock.
    pub fn unblock_critical(self, thread: &Arc<Thread>, unblock: bool) {
        if !unblock {
            self.release();
            return;
        }

        let core = self.core;
        let cpu_self = dispatch::disable();
        self.release();

        if thread.is_proxy() {
            let callout = thread.wait.link.lock().mp_callout.take();
            if let Some(callout) = callout {
                callout.invoke(thread);
            }
        } else {
            core.system.scheduler().unblock(thread);
        }
        if thread.is_boosted() {
            core.revert_boost(thread, BoostEvent::Unblocked);
        }
        cpu_self.enable();
    }

    /// Remove `thread` and unblock it, releasing the lock
    ///
    /// Returns whether the thread was on this queue.
    pub fn extract_critical(mut self, thread: &Arc<Thread>, status: WaitStatus) -> bool {
        match self.extract_waiter(thread, status) {
            Some(unblock) => {
                self.unblock_critical(thread, unblock);
                true
            }
            None => {
                self.release();
                false
            }
        }
    }

    /// Release the first waiter with `status`, consuming the lock
    pub fn dequeue(self, status: WaitStatus) -> Option<Arc<Thread>> {
        let first = match self.first() {
            Some(first) => first,
            None => {
                self.release();
                return None;
            }
        };
        self.extract_critical(&first, status).then_some(first)
    }
}

impl ThreadQueue {
    /// Take the lock and release the first waiter with `status`
    pub fn dequeue(&self, status: WaitStatus) -> Option<Arc<Thread>> {
        self.acquire().dequeue(status)
    }

    /// Take the lock and release `thread` if it waits here
    pub fn extract(&self, thread: &Arc<Thread>, status: WaitStatus) -> bool {
        self.acquire().extract_critical(thread, status)
    }
}

/// Pull `thread` off whatever queue it waits on
///
/// The queue is found through the thread's back-reference. Returns false
/// if the thread was not waiting. Used for thread deletion, signals and
/// other forced unblocks.
pub fn extract(thread: &Arc<Thread>, status: WaitStatus) -> bool {
    loop {
        let Some(core) = waiting_on(thread) else {
            return false;
        };
        if core.acquire().extract_critical(thread, status) {
            return true;
        }
        // Released or moved between reading the link and locking the queue
    }
}

/// As [`extract`], first telling the multiprocessing layer when the
/// thread waits on an object of another node
pub fn extract_with_proxy(thread: &Arc<Thread>, status: WaitStatus) -> bool {
    if let Some(core) = waiting_on(thread) {
        if let (Some(id), Some(hooks)) = (core.object, core.system.mp_hooks()) {
            if !id.is_local(core.system.config().local_node) {
                hooks.cancel_remote_wait(thread, id);
            }
        }
    }
    extract(thread, status)
}

fn waiting_on(thread: &Thread) -> Option<Arc<QueueCore>> {
    thread.wait.link.lock().queue.clone()
}

/// Timeout branch of extraction, run for each expired watchdog entry
///
/// Returns false if the thread left its queue before the lock was taken.
pub(crate) fn timeout(expired: Expired) -> bool {
    let Expired { handle, thread, status } = expired;

    let core = {
        let link = thread.wait.link.lock();
        if link.timer != Some(handle) {
            return false;
        }
        match &link.queue {
            Some(core) => Arc::clone(core),
            None => return false,
        }
    };

    let mut guard = core.acquire();
    let still_armed = {
        let link = thread.wait.link.lock();
        link.is_on(&core) && link.timer == Some(handle)
    };
    if !still_armed {
        guard.release();
        return false;
    }

    ktrace!("{} timed out ({})", thread.id(), status);
    match guard.extract_waiter(&thread, status) {
        Some(unblock) => {
            guard.unblock_critical(&thread, unblock);
            true
        }
        None => {
            guard.release();
            false
        }
    }
}
