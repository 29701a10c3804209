//! Local interrupt disable levels
//!
//! On the host there are no interrupt vectors; an OS thread stands in for a
//! processor and its "interrupts disabled" state is a nesting depth kept in
//! thread-local storage. [`IsrLevel`] captures the depth at the point of
//! disabling and puts it back when dropped, so nested disable/enable pairs
//! unwind in strict LIFO order.

use core::cell::Cell;
use core::marker::PhantomData;

thread_local! {
    static DISABLE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Token proving local interrupts are disabled
///
/// Not `Send`: the level belongs to the processor (OS thread) that
/// created it.
#[must_use = "interrupts are re-enabled when the level is dropped"]
pub struct IsrLevel {
    previous: u32,
    _not_send: PhantomData<*const ()>,
}

impl IsrLevel {
    /// Disable local interrupts, returning the level to restore
    #[inline]
    pub fn disable() -> Self {
        let previous = DISABLE_DEPTH.with(|d| {
            let prev = d.get();
            d.set(prev + 1);
            prev
        });
        IsrLevel {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Restore the level captured by `disable`
    #[inline]
    pub fn enable(self) {
        drop(self);
    }

    /// Check if local interrupts are currently disabled
    #[inline]
    pub fn is_disabled() -> bool {
        Self::depth() > 0
    }

    /// Current nesting depth on this processor
    #[inline]
    pub fn depth() -> u32 {
        DISABLE_DEPTH.with(|d| d.get())
    }
}

impl Drop for IsrLevel {
    #[inline]
    fn drop(&mut self) {
        DISABLE_DEPTH.with(|d| {
            debug_assert_eq!(d.get(), self.previous + 1, "interrupt levels restored out of order");
            d.set(self.previous);
        });
    }
}
