//! Thread dispatch disable level
//!
//! A nesting counter per processor. While it is non-zero the executing
//! thread keeps the processor even if it has been blocked. When the last
//! level is given back and the executing thread is no longer ready, the
//! processor switches away from it, which on the host means parking the
//! OS thread until the scheduler readies the kernel thread again.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::tls;

thread_local! {
    static DISABLE_LEVEL: Cell<u32> = const { Cell::new(0) };
}

/// Token for one level of dispatch disabling
#[must_use = "dispatching is re-enabled when the token is dropped"]
pub struct CpuSelf {
    _not_send: PhantomData<*const ()>,
}

/// Disable thread dispatching on this processor
#[inline]
pub fn disable() -> CpuSelf {
    DISABLE_LEVEL.with(|l| l.set(l.get() + 1));
    CpuSelf {
        _not_send: PhantomData,
    }
}

/// Current disable level of this processor
#[inline]
pub fn level() -> u32 {
    DISABLE_LEVEL.with(|l| l.get())
}

impl CpuSelf {
    /// Give the level back, dispatching if it was the last one
    #[inline]
    pub fn enable(self) {
        drop(self);
    }
}

impl Drop for CpuSelf {
    fn drop(&mut self) {
        let remaining = DISABLE_LEVEL.with(|l| {
            let level = l.get() - 1;
            l.set(level);
            level
        });
        if remaining == 0 {
            if let Some(thread) = tls::executing() {
                thread.switch_away();
            }
        }
    }
}
