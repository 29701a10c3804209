//! Thread-local storage for the executing kernel thread
//!
//! Each OS thread plays one processor; the kernel thread attached to it is
//! that processor's executing thread.

use std::cell::RefCell;
use std::sync::Arc;

use crate::thread::Thread;

thread_local! {
    static EXECUTING: RefCell<Option<Arc<Thread>>> = const { RefCell::new(None) };
}

/// Install `thread` as this processor's executing thread
///
/// Returns false if another thread is already attached.
pub(crate) fn set_executing(thread: Arc<Thread>) -> bool {
    EXECUTING.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(thread);
        true
    })
}

/// Remove and return the executing thread
pub(crate) fn clear_executing() -> Option<Arc<Thread>> {
    EXECUTING.with(|cell| cell.borrow_mut().take())
}

/// The executing thread of this processor, if any
#[inline]
pub fn executing() -> Option<Arc<Thread>> {
    EXECUTING.with(|cell| cell.borrow().clone())
}

/// Check whether `thread` is this processor's executing thread
#[inline]
pub fn is_executing(thread: &Thread) -> bool {
    EXECUTING.with(|cell| {
        cell.borrow()
            .as_ref()
            .is_some_and(|t| std::ptr::eq(Arc::as_ptr(t), thread))
    })
}
