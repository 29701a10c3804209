//! First-in first-out waiting
//!
//! One chain per queue regardless of scheduler instances: arrival order is
//! the only thing that counts.

use std::sync::Arc;

use super::WaitDiscipline;
use crate::heads::ThreadQueueHeads;
use crate::scheduler::Scheduler;
use crate::thread::Thread;
use crate::wait::{Position, WaitLink};

pub(crate) struct FifoDiscipline;

impl WaitDiscipline for FifoDiscipline {
    fn insert(&self, heads: &mut ThreadQueueHeads, thread: &Arc<Thread>, _seq: u64, link: &mut WaitLink) {
        let index = heads.fifo.push_back(Arc::clone(thread));
        link.position = Position::Fifo(index);
    }

    fn extract(&self, heads: &mut ThreadQueueHeads, link: &mut WaitLink) -> Option<Arc<Thread>> {
        match link.position {
            Position::Fifo(index) => heads.fifo.remove(index),
            _ => None,
        }
    }

    fn first(&self, heads: &ThreadQueueHeads, _scheduler: &dyn Scheduler) -> Option<Arc<Thread>> {
        heads.fifo.front().cloned()
    }

    fn reposition(&self, _heads: &mut ThreadQueueHeads, _thread: &Arc<Thread>, _seq: u64, _link: &mut WaitLink) {}
}
