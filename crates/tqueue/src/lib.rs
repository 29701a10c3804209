//! # tqueue - Thread-Queue Engine
//!
//! The blocking core of a real-time kernel, running on host threads.
//!
//! ## Features
//!
//! - **Disciplines**: FIFO, or priority with arrival order among equals
//! - **Protocol**: enqueue under the queue lock, block after releasing it,
//!   no lost or doubled wakeups
//! - **Timeouts**: tick-driven watchdog, manual ticks or a clock thread
//! - **Boosting**: a resource holder is raised when a more important
//!   thread of another scheduler instance waits for it
//! - **Multiprocessing**: proxies of remote threads released through a callout
//!
//! ## Quick Start
//!
//! ```ignore
//! use tqueue::prelude::*;
//!
//! let system = System::new(SystemConfig::from_env())?;
//! let queue = ThreadQueue::new(&system, Discipline::Priority);
//!
//! let waiter = system.create_thread("waiter", Priority(3))?;
//! let q = queue.clone();
//! let handle = system.spawn(&waiter, move |me| {
//!     q.enqueue(me, &EnqueueContext::new().timeout(100, WaitStatus::Timeout))
//! })?;
//!
//! // ... later, from the releasing side
//! queue.flush(WaitStatus::Successful);
//! assert_eq!(handle.join().unwrap(), WaitStatus::Successful);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │           Resource objects (mutex, semaphore, ...)          │
//! │      acquire / enqueue / extract_critical / flush           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ThreadQueue                           │
//! │     ticket lock, heads (embedded or arena), disciplines     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │ Scheduler │      │ Watchdog  │      │  MpHooks  │
//!    │ (unblock) │      │ (ticks)   │      │ (proxies) │
//!    └───────────┘      └───────────┘      └───────────┘
//! ```

// Re-export core types
pub use tqueue_core::{
    fatal, FatalError, IsrLevel, LockStats, ObjectId, Priority, ThreadId, ThreadState, TicketGuard,
    TicketLock, TqError, TqResult, WaitStatus,
};

// Re-export kprint macros for debug logging
pub use tqueue_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};
pub use tqueue_core::{kdebug, kerror, kinfo, kprintln, ktrace, kwarn};

// Re-export env utilities
pub use tqueue_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use tqueue_runtime::{
    extract, extract_with_proxy, mp_callout_do_nothing, BoostEvent, BoostPolicy, Candidate,
    ClockHandle, ClockStats, ConfigError, Discipline, EnqueueContext, HostScheduler, MpCallout,
    MpCalloutFn, MpHooks, QueueGuard, RevertOnRelease, Scheduler, SchedulerStats, System,
    SystemBuilder, SystemConfig, Thread, ThreadKind, ThreadQueue, ThreadQueueBuilder, TimerHandle,
    WatchdogStats,
};

pub use tqueue_runtime::dispatch;

/// The names most programs need
pub mod prelude {
    pub use crate::{
        Discipline, EnqueueContext, Priority, System, SystemConfig, Thread, ThreadQueue, TqResult,
        WaitStatus,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_round_trip() {
        let system = System::new(SystemConfig::new()).unwrap();
        let queue = ThreadQueue::new(&system, Discipline::Priority);
        let waiter = system.create_thread("waiter", Priority(3)).unwrap();

        let q = queue.clone();
        let handle = system
            .spawn(&waiter, move |me| {
                q.enqueue(me, &EnqueueContext::new().timeout(1000, WaitStatus::Timeout))
            })
            .unwrap();
        assert!(waiter.wait_until_blocked(std::time::Duration::from_secs(5)));

        // The waiter may still be on its way to parking; the protocol copes
        while queue.flush(WaitStatus::Successful) == 0 {
            std::thread::yield_now();
        }
        assert_eq!(handle.join().unwrap(), WaitStatus::Successful);
        assert!(queue.is_empty());
    }
}
