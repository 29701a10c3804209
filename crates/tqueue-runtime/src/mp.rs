//! Multiprocessing hooks
//!
//! A proxy is a local thread control block that waits on behalf of a
//! thread living on another node. When a proxy leaves a queue nothing local
//! is scheduled; instead the callout recorded at enqueue time runs with the
//! proxy and the id of the object it waited on, and the multiprocessing
//! layer forwards the outcome to the remote node.

use std::fmt;

use tqueue_core::ObjectId;

use crate::thread::Thread;

/// Called when a proxy is released from a queue
pub type MpCalloutFn = fn(&Thread, ObjectId);

/// Callout plus the object id it reports
#[derive(Clone, Copy)]
pub struct MpCallout {
    pub callout: MpCalloutFn,
    pub id: ObjectId,
}

impl MpCallout {
    pub fn new(callout: MpCalloutFn, id: ObjectId) -> Self {
        MpCallout { callout, id }
    }

    /// Callout that ignores the release; for objects only local nodes use
    pub fn do_nothing(id: ObjectId) -> Self {
        MpCallout::new(mp_callout_do_nothing, id)
    }

    #[inline]
    pub(crate) fn invoke(&self, proxy: &Thread) {
        (self.callout)(proxy, self.id)
    }
}

impl fmt::Debug for MpCallout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpCallout").field("id", &self.id).finish_non_exhaustive()
    }
}

/// The no-op callout
pub fn mp_callout_do_nothing(_proxy: &Thread, _id: ObjectId) {}

/// Services the multiprocessing layer provides to the queues
pub trait MpHooks: Send + Sync {
    /// A local thread waiting on the remote object `id` is being pulled off
    /// its queue; the remote node must forget the pending request
    fn cancel_remote_wait(&self, thread: &Thread, id: ObjectId);
}
