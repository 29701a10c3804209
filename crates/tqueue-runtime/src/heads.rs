//! Queue heads and the multiprocessor heads arena
//!
//! The heads hold a queue's waiters: one FIFO chain plus one priority map
//! per scheduler instance. A queue needs them only while it has waiters.
//!
//! On a uniprocessor each queue carries its own heads and links them
//! implicitly on the first enqueue. With `smp` the heads come from a
//! shared arena of `max_nonempty_queues` slots, so the per-queue cost does
//! not grow with the number of scheduler instances. Running out of slots
//! is a configuration error and fatal.

use std::cell::UnsafeCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use tqueue_core::{fatal, kdebug, FatalError};

use crate::discipline::chain::Chain;
use crate::discipline::priority::PriorityKey;
use crate::thread::Thread;

/// Waiter containers of one non-empty queue
pub struct ThreadQueueHeads {
    pub(crate) fifo: Chain<Arc<Thread>>,
    pub(crate) priority: Vec<BTreeMap<PriorityKey, Arc<Thread>>>,
}

impl ThreadQueueHeads {
    pub fn new(instances: usize) -> Self {
        ThreadQueueHeads {
            fifo: Chain::new(),
            priority: (0..instances.max(1)).map(|_| BTreeMap::new()).collect(),
        }
    }

    /// Put every container into the empty state
    pub fn initialize_empty(&mut self) {
        self.fifo.clear();
        for map in &mut self.priority {
            map.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.fifo.len() + self.priority.iter().map(BTreeMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty() && self.priority.iter().all(BTreeMap::is_empty)
    }

    /// Number of per-instance priority containers
    pub fn instances(&self) -> usize {
        self.priority.len()
    }

    /// Most important priority waiter of every instance except `instance`
    pub(crate) fn minima_excluding(&self, instance: usize) -> impl Iterator<Item = (&PriorityKey, &Arc<Thread>)> {
        self.priority
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != instance)
            .filter_map(|(_, map)| map.first_key_value())
    }
}

/// Exclusive claim on one arena slot
///
/// Not `Clone`: whoever holds the handle is the only one who can reach the
/// slot, which is what makes handing out `&mut` from a shared arena sound.
#[derive(Debug)]
pub struct HeadsHandle {
    index: u32,
    arena: usize,
}

impl HeadsHandle {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Fixed pool of heads for multiprocessor queues
pub struct HeadsArena {
    slots: Box<[UnsafeCell<ThreadQueueHeads>]>,
    free: ArrayQueue<u32>,
}

// Safety: a slot is only reachable through its unique HeadsHandle
unsafe impl Send for HeadsArena {}
unsafe impl Sync for HeadsArena {}

impl HeadsArena {
    pub fn new(capacity: usize, instances: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(ThreadQueueHeads::new(instances)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let free = ArrayQueue::new(capacity);
        for index in 0..capacity as u32 {
            // Cannot fail: the queue has exactly `capacity` places
            let _ = free.push(index);
        }
        HeadsArena { slots, free }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots not linked to any queue
    pub fn available(&self) -> usize {
        self.free.len()
    }

    fn id(&self) -> usize {
        self as *const HeadsArena as usize
    }

    /// Take a slot, emptied; exhaustion is fatal
    pub(crate) fn acquire(&self) -> HeadsHandle {
        let Some(index) = self.free.pop() else {
            fatal(FatalError::HeadsExhausted {
                capacity: self.capacity(),
            });
        };
        let mut handle = HeadsHandle {
            index,
            arena: self.id(),
        };
        self.get_mut(&mut handle).initialize_empty();
        kdebug!("heads slot {} linked ({} left)", index, self.available());
        handle
    }

    /// Return a slot to the free list
    pub(crate) fn release(&self, handle: HeadsHandle) {
        debug_assert_eq!(handle.arena, self.id(), "heads handle from another arena");
        debug_assert!(self.get(&handle).is_empty());
        kdebug!("heads slot {} unlinked", handle.index);
        // Cannot fail: every index is either handed out or queued, never both
        let _ = self.free.push(handle.index);
    }

    pub(crate) fn get<'a>(&'a self, handle: &'a HeadsHandle) -> &'a ThreadQueueHeads {
        debug_assert_eq!(handle.arena, self.id(), "heads handle from another arena");
        // Safety: the handle is the sole claim on this slot
        unsafe { &*self.slots[handle.index as usize].get() }
    }

    pub(crate) fn get_mut<'a>(&'a self, handle: &'a mut HeadsHandle) -> &'a mut ThreadQueueHeads {
        debug_assert_eq!(handle.arena, self.id(), "heads handle from another arena");
        // Safety: the handle is the sole claim on this slot, borrowed mutably
        unsafe { &mut *self.slots[handle.index as usize].get() }
    }
}

/// Heads currently linked to a queue
pub(crate) enum HeadsLink {
    Embedded(Box<ThreadQueueHeads>),
    Pooled(HeadsHandle),
}
