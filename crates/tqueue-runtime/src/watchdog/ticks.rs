//! Ordered set of pending timeouts
//!
//! A `BTreeMap` keyed by handle, which sorts by deadline. Cancelling removes
//! the entry right away, so `cancel` can tell whether the timeout was still
//! pending and a cancelled entry never keeps its thread alive.
//!
//! # Complexity
//!
//! - Arm: O(log n)
//! - Cancel: O(log n)
//! - Expire: O(k log n) for k expired entries

use std::collections::BTreeMap;

use super::entry::{Expired, TimerHandle, WatchdogEntry};

pub(crate) struct TickQueue {
    pending: BTreeMap<TimerHandle, WatchdogEntry>,
    now: u64,
    next_seq: u64,
    pub(crate) total_armed: u64,
    pub(crate) total_fired: u64,
    pub(crate) total_cancelled: u64,
}

impl TickQueue {
    pub(crate) fn new() -> Self {
        TickQueue {
            pending: BTreeMap::new(),
            now: 0,
            next_seq: 0,
            total_armed: 0,
            total_fired: 0,
            total_cancelled: 0,
        }
    }

    #[inline]
    pub(crate) fn now(&self) -> u64 {
        self.now
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn insert(&mut self, ticks: u64, entry: WatchdogEntry) -> TimerHandle {
        let handle = TimerHandle::new(self.now.saturating_add(ticks), self.next_seq);
        self.next_seq += 1;
        self.pending.insert(handle, entry);
        self.total_armed += 1;
        handle
    }

    pub(crate) fn remove(&mut self, handle: TimerHandle) -> bool {
        let removed = self.pending.remove(&handle).is_some();
        if removed {
            self.total_cancelled += 1;
        }
        removed
    }

    /// Move the clock forward and take everything now due, earliest first
    pub(crate) fn advance(&mut self, ticks: u64) -> Vec<Expired> {
        self.now = self.now.saturating_add(ticks);
        let mut expired = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().deadline() > self.now {
                break;
            }
            let (handle, WatchdogEntry { thread, status }) = entry.remove_entry();
            expired.push(Expired { handle, thread, status });
        }
        self.total_fired += expired.len() as u64;
        expired
    }

    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(TimerHandle::deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::bare_thread;
    use std::sync::Arc;
    use tqueue_core::WaitStatus;

    fn entry() -> WatchdogEntry {
        WatchdogEntry {
            thread: Arc::new(bare_thread(1, 0)),
            status: WaitStatus::Timeout,
        }
    }

    #[test]
    fn test_fires_at_deadline() {
        let mut q = TickQueue::new();
        let h = q.insert(3, entry());
        assert_eq!(h.deadline(), 3);
        assert!(q.advance(2).is_empty());
        let fired = q.advance(1);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].handle, h);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_earliest_first() {
        let mut q = TickQueue::new();
        let late = q.insert(5, entry());
        let early = q.insert(2, entry());
        let fired = q.advance(10);
        assert_eq!(fired.iter().map(|e| e.handle).collect::<Vec<_>>(), vec![early, late]);
        assert_eq!(q.total_fired, 2);
    }

    #[test]
    fn test_cancel() {
        let mut q = TickQueue::new();
        let h = q.insert(1, entry());
        assert!(q.remove(h));
        assert!(!q.remove(h));
        assert!(q.advance(5).is_empty());
        assert_eq!(q.total_cancelled, 1);
        assert_eq!(q.next_deadline(), None);
    }
}
