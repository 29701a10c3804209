//! Linux futex parker
//!
//! Futex word: 0 = no token, 1 = wake token deposited.
//!
//! The unparker always publishes the token before it looks at `parked`, and
//! the parker always announces itself in `parked` before it looks at the
//! token. Both sides use SeqCst, so at least one of them sees the other:
//! either the parker finds the token and skips the sleep, or the unparker
//! finds a sleeper and issues the FUTEX_WAKE. FUTEX_WAIT itself re-checks
//! the word atomically, closing the remaining window.

use super::Parker;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub struct FutexParker {
    word: AtomicU32,
    parked: AtomicU32,
}

impl FutexParker {
    pub fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
            parked: AtomicU32::new(0),
        }
    }

    fn futex_wait(&self, timeout: Option<Duration>) {
        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });
        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // Sleeps only while the word is still 0; ETIMEDOUT, EAGAIN and EINTR
        // all send us back to the caller's re-check
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexParker {
    fn default() -> Self {
        Self::new()
    }
}

impl Parker for FutexParker {
    fn park(&self, timeout: Option<Duration>) -> bool {
        self.parked.fetch_add(1, Ordering::SeqCst);
        if self.word.swap(0, Ordering::SeqCst) == 0 {
            self.futex_wait(timeout);
        } else {
            self.parked.fetch_sub(1, Ordering::SeqCst);
            return true;
        }
        self.parked.fetch_sub(1, Ordering::SeqCst);
        self.word.swap(0, Ordering::SeqCst) != 0
    }

    fn unpark(&self) {
        self.word.store(1, Ordering::SeqCst);
        if self.parked.load(Ordering::SeqCst) != 0 {
            self.futex_wake();
        }
    }

    fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Relaxed) != 0
    }
}
