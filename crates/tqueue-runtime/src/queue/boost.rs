//! Cross-scheduler priority boosting
//!
//! With several scheduler instances a resource holder on instance A can
//! starve a more important waiter that blocked from instance B, because
//! A's scheduler never sees B's waiter. When such a waiter blocks, the
//! holder is raised to the waiter's priority.
//!
//! When to drop the boost depends on the resource, so the queue asks its
//! [`BoostPolicy`]. A queue without a policy never reverts on its own; the
//! resource calls [`ThreadQueue::unboost`] itself.

use std::sync::Arc;

use tqueue_core::{kdebug, Priority};

use super::{QueueCore, ThreadQueue};
use crate::heads::ThreadQueueHeads;
use crate::system::System;
use crate::thread::Thread;

/// Moments at which a boost may be dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostEvent {
    /// The boosted thread was unblocked from a queue with this policy
    Unblocked,
    /// The boosted thread gave up the resource
    OwnershipReleased,
}

/// Resource-specific rule for reverting a boost
pub trait BoostPolicy: Send + Sync {
    fn should_revert(&self, event: BoostEvent, thread: &Thread) -> bool;
}

/// Drop the boost when ownership is released, keep it across unblocks
#[derive(Debug, Clone, Copy, Default)]
pub struct RevertOnRelease;

impl BoostPolicy for RevertOnRelease {
    fn should_revert(&self, event: BoostEvent, _thread: &Thread) -> bool {
        event == BoostEvent::OwnershipReleased
    }
}

/// Raise `owner` to the best waiter of any other instance; queue lock held
pub(crate) fn boost_locked(system: &System, heads: &ThreadQueueHeads, owner: &Thread) -> bool {
    let best = heads
        .minima_excluding(owner.scheduler_index())
        .map(|(key, _)| Priority(key.priority))
        .min();

    match best {
        Some(best) if best.is_more_important_than(owner.priority()) => {
            kdebug!("boost {} from {} to {}", owner.id(), owner.priority(), best);
            system.scheduler().raise_priority(owner, best);
            owner.set_boosted(true);
            true
        }
        _ => false,
    }
}

fn unboost(system: &System, owner: &Thread) -> bool {
    if !owner.is_boosted() {
        return false;
    }
    system.scheduler().restore_priority(owner);
    owner.set_boosted(false);
    kdebug!("unboost {} back to {}", owner.id(), owner.priority());
    true
}

impl QueueCore {
    /// Revert `thread`'s boost if this queue's policy says so
    pub(crate) fn revert_boost(&self, thread: &Thread, event: BoostEvent) -> bool {
        match &self.boost_policy {
            Some(policy) if policy.should_revert(event, thread) => unboost(&self.system, thread),
            _ => false,
        }
    }
}

impl ThreadQueue {
    /// Boost `owner` against the current waiters; returns whether it was raised
    ///
    /// For resources whose ownership changes hands while threads wait.
    pub fn boost_priority(&self, owner: &Arc<Thread>) -> bool {
        let guard = self.acquire();
        match guard.state.heads(self.core.arena()) {
            Some(heads) => boost_locked(&self.core.system, heads, owner),
            None => false,
        }
    }

    /// Drop `owner`'s boost unconditionally
    pub fn unboost(&self, owner: &Thread) -> bool {
        unboost(&self.core.system, owner)
    }

    /// `owner` released the resource; revert per policy
    pub fn ownership_released(&self, owner: &Thread) -> bool {
        owner.is_boosted() && self.core.revert_boost(owner, BoostEvent::OwnershipReleased)
    }
}
