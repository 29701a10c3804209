//! Interrupt-safe ticket lock
//!
//! The lock protecting every thread queue. Acquisition disables local
//! interrupts first and then draws a ticket; tickets are served strictly in
//! the order they were drawn, so a waiting processor is overtaken by nobody
//! that arrived after it.
//!
//! The guard releases on drop. Paths that have to give the lock up before
//! doing something else (suspending, touching the scheduler) call
//! [`TicketGuard::release`] instead.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "lock-stats")]
use core::sync::atomic::AtomicU64;

use crate::isr::IsrLevel;

/// Snapshot of lock usage counters
///
/// All zeros unless the `lock-stats` feature is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Completed acquisitions
    pub acquisitions: u64,
    /// Acquisitions that found the lock taken
    pub contended: u64,
    /// Largest number of ticket holders seen ahead of an acquirer
    pub max_ticket_distance: u32,
}

#[cfg(feature = "lock-stats")]
#[derive(Default)]
struct StatCounters {
    acquisitions: AtomicU64,
    contended: AtomicU64,
    max_ticket_distance: AtomicU32,
}

/// Ticket lock owning the data it protects
pub struct TicketLock<T> {
    next_ticket: AtomicU32,
    now_serving: AtomicU32,
    #[cfg(feature = "lock-stats")]
    stats: StatCounters,
    data: UnsafeCell<T>,
}

// Safety: TicketLock hands out exclusive access to T one holder at a time
unsafe impl<T: Send> Send for TicketLock<T> {}
unsafe impl<T: Send> Sync for TicketLock<T> {}

impl<T> TicketLock<T> {
    pub fn new(value: T) -> Self {
        TicketLock {
            next_ticket: AtomicU32::new(0),
            now_serving: AtomicU32::new(0),
            #[cfg(feature = "lock-stats")]
            stats: StatCounters::default(),
            data: UnsafeCell::new(value),
        }
    }

    /// Disable local interrupts and wait for our ticket to come up
    #[inline]
    pub fn lock(&self) -> TicketGuard<'_, T> {
        let level = IsrLevel::disable();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        let mut serving = self.now_serving.load(Ordering::Acquire);
        if serving != ticket {
            self.record_contention(ticket.wrapping_sub(serving));
            while serving != ticket {
                // Back off in proportion to the queue ahead of us
                let ahead = ticket.wrapping_sub(serving);
                for _ in 0..ahead.min(64) {
                    relax();
                }
                serving = self.now_serving.load(Ordering::Acquire);
            }
        }
        self.record_acquisition();

        TicketGuard {
            lock: self,
            level: Some(level),
        }
    }

    /// Acquire only if nobody holds or waits for the lock
    #[inline]
    pub fn try_lock(&self) -> Option<TicketGuard<'_, T>> {
        let level = IsrLevel::disable();
        let serving = self.now_serving.load(Ordering::Acquire);
        if self
            .next_ticket
            .compare_exchange(serving, serving.wrapping_add(1), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.record_acquisition();
            Some(TicketGuard {
                lock: self,
                level: Some(level),
            })
        } else {
            level.enable();
            None
        }
    }

    /// Check if the lock is held or has waiters
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.next_ticket.load(Ordering::Relaxed) != self.now_serving.load(Ordering::Relaxed)
    }

    /// Mutable access through an exclusive borrow, no locking needed
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Current usage counters
    pub fn stats(&self) -> LockStats {
        #[cfg(feature = "lock-stats")]
        {
            LockStats {
                acquisitions: self.stats.acquisitions.load(Ordering::Relaxed),
                contended: self.stats.contended.load(Ordering::Relaxed),
                max_ticket_distance: self.stats.max_ticket_distance.load(Ordering::Relaxed),
            }
        }
        #[cfg(not(feature = "lock-stats"))]
        {
            LockStats::default()
        }
    }

    #[inline]
    fn record_acquisition(&self) {
        #[cfg(feature = "lock-stats")]
        self.stats.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_contention(&self, _distance: u32) {
        #[cfg(feature = "lock-stats")]
        {
            self.stats.contended.fetch_add(1, Ordering::Relaxed);
            self.stats
                .max_ticket_distance
                .fetch_max(_distance, Ordering::Relaxed);
        }
    }

    #[inline]
    fn unlock(&self) {
        let serving = self.now_serving.load(Ordering::Relaxed);
        self.now_serving
            .store(serving.wrapping_add(1), Ordering::Release);
    }
}

impl<T: Default> Default for TicketLock<T> {
    fn default() -> Self {
        TicketLock::new(T::default())
    }
}

#[inline]
fn relax() {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64"))] {
            core::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

/// Scoped holder of a [`TicketLock`]
///
/// Dropping the guard passes the lock to the next ticket and then restores
/// the interrupt level, in that order.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct TicketGuard<'a, T> {
    lock: &'a TicketLock<T>,
    level: Option<IsrLevel>,
}

impl<'a, T> TicketGuard<'a, T> {
    /// Release the lock before the end of the scope
    #[inline]
    pub fn release(self) {
        drop(self);
    }

    /// The lock this guard holds
    #[inline]
    pub fn lock_ref(&self) -> &'a TicketLock<T> {
        self.lock
    }
}

impl<'a, T> Deref for TicketGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: we hold the lock
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for TicketGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: we hold the lock
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for TicketGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock();
        if let Some(level) = self.level.take() {
            level.enable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_ticket_basic() {
        let lock = TicketLock::new(0u32);
        {
            let mut guard = lock.lock();
            *guard = 42;
        }
        assert!(!lock.is_locked());
        assert_eq!(*lock.lock(), 42);
    }

    #[test]
    fn test_guard_disables_interrupts() {
        let lock = TicketLock::new(());
        assert!(!IsrLevel::is_disabled());
        let guard = lock.lock();
        assert!(IsrLevel::is_disabled());
        guard.release();
        assert!(!IsrLevel::is_disabled());
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_try_lock() {
        let lock = TicketLock::new(0u32);

        let guard = lock.try_lock();
        assert!(guard.is_some());
        assert!(lock.try_lock().is_none());
        assert_eq!(IsrLevel::depth(), 1);

        drop(guard);
        assert!(lock.try_lock().is_some());
        assert_eq!(IsrLevel::depth(), 0);
    }

    #[test]
    fn test_ticket_concurrent() {
        let lock = Arc::new(TicketLock::new(0u32));
        let mut handles = vec![];

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *lock.lock() += 1;
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*lock.lock(), 4000);
    }

    #[test]
    fn test_ticket_fifo_handoff() {
        // Each waiter appends its ticket order; tickets are served in draw order
        let lock = Arc::new(TicketLock::new(Vec::new()));
        let held = lock.lock();

        let mut handles = vec![];
        for i in 0..3u32 {
            let lock_clone = Arc::clone(&lock);
            handles.push(thread::spawn(move || lock_clone.lock().push(i)));
            // Wait until thread i has drawn its ticket
            while lock.next_ticket.load(Ordering::Relaxed) != i + 2 {
                thread::yield_now();
            }
        }
        held.release();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(), vec![0, 1, 2]);
    }

    #[cfg(feature = "lock-stats")]
    #[test]
    fn test_lock_stats() {
        let lock = TicketLock::new(());
        drop(lock.lock());
        drop(lock.lock());
        assert_eq!(lock.stats().acquisitions, 2);
    }

    #[cfg(not(feature = "lock-stats"))]
    #[test]
    fn test_lock_stats_disabled() {
        let lock = TicketLock::new(());
        drop(lock.lock());
        assert_eq!(lock.stats(), LockStats::default());
    }
}
