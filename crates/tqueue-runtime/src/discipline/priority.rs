//! Priority-ordered waiting
//!
//! Each scheduler instance owns one ordered map keyed by
//! (priority, enqueue sequence). The sequence makes the key a strict total
//! order, so equal priorities leave in arrival order. The queue-wide first
//! waiter is picked by the scheduler among the per-instance minima.

use std::sync::Arc;

use tqueue_core::{fatal, FatalError, Priority};

use super::WaitDiscipline;
use crate::heads::ThreadQueueHeads;
use crate::scheduler::{Candidate, Scheduler};
use crate::thread::Thread;
use crate::wait::{Position, WaitLink};

/// Ordering key of a waiter; lower sorts first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriorityKey {
    pub priority: u32,
    pub seq: u64,
}

impl PriorityKey {
    #[inline]
    pub fn new(priority: Priority, seq: u64) -> Self {
        PriorityKey {
            priority: priority.value(),
            seq,
        }
    }
}

pub(crate) struct PriorityDiscipline;

fn instance_of(heads: &ThreadQueueHeads, thread: &Thread) -> usize {
    let index = thread.scheduler_index();
    let count = heads.priority.len();
    if index >= count {
        fatal(FatalError::InvalidSchedulerIndex { index, count });
    }
    index
}

impl WaitDiscipline for PriorityDiscipline {
    fn insert(&self, heads: &mut ThreadQueueHeads, thread: &Arc<Thread>, seq: u64, link: &mut WaitLink) {
        let instance = instance_of(heads, thread);
        let key = PriorityKey::new(thread.priority(), seq);
        heads.priority[instance].insert(key, Arc::clone(thread));
        link.position = Position::Priority { instance, key };
    }

    fn extract(&self, heads: &mut ThreadQueueHeads, link: &mut WaitLink) -> Option<Arc<Thread>> {
        match link.position {
            Position::Priority { instance, key } => heads.priority.get_mut(instance)?.remove(&key),
            _ => None,
        }
    }

    fn first(&self, heads: &ThreadQueueHeads, scheduler: &dyn Scheduler) -> Option<Arc<Thread>> {
        let candidates: Vec<Candidate<'_>> = heads
            .priority
            .iter()
            .enumerate()
            .filter_map(|(instance, map)| {
                map.first_key_value().map(|(key, thread)| Candidate {
                    instance,
                    thread,
                    priority: Priority(key.priority),
                    seq: key.seq,
                })
            })
            .collect();

        match candidates.len() {
            0 => None,
            1 => Some(Arc::clone(candidates[0].thread)),
            _ => {
                let chosen = scheduler.select_instance(&candidates)?;
                candidates
                    .iter()
                    .find(|c| c.instance == chosen)
                    .map(|c| Arc::clone(c.thread))
            }
        }
    }

    fn reposition(&self, heads: &mut ThreadQueueHeads, thread: &Arc<Thread>, seq: u64, link: &mut WaitLink) {
        if let Some(waiter) = self.extract(heads, link) {
            debug_assert!(Arc::ptr_eq(&waiter, thread));
            self.insert(heads, thread, seq, link);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_order() {
        let a = PriorityKey::new(Priority(1), 9);
        let b = PriorityKey::new(Priority(3), 0);
        let c = PriorityKey::new(Priority(3), 1);
        assert!(a < b);
        assert!(b < c);
    }
}
