//! # tqueue-runtime
//!
//! The thread-queue engine: the part of a real-time kernel that every
//! blocking primitive (mutex, semaphore, message queue, multiprocessing
//! proxy) is built on.
//!
//! This crate provides:
//! - Thread queues with FIFO and priority release disciplines
//! - The enqueue/extract/unblock protocol with dispatch disabling
//! - Tick-driven wait timeouts and a clock thread
//! - Cross-scheduler priority boosting
//! - A multiprocessing hook for proxies of remote threads
//!
//! Kernel threads run on host OS threads: blocking parks the OS thread,
//! and the "processor" of a kernel thread is the OS thread it is attached
//! to.

pub mod config;
pub mod discipline;
pub mod dispatch;
pub mod heads;
pub mod mp;
pub mod parking;
pub mod queue;
pub mod scheduler;
pub mod system;
pub mod thread;
pub mod tls;
pub mod watchdog;

mod wait;

#[cfg(test)]
mod testutil;

// Re-exports
pub use config::{ConfigError, SystemConfig};
pub use discipline::Discipline;
pub use heads::{HeadsArena, ThreadQueueHeads};
pub use mp::{mp_callout_do_nothing, MpCallout, MpCalloutFn, MpHooks};
pub use queue::{
    extract, extract_with_proxy, BoostEvent, BoostPolicy, EnqueueContext, QueueGuard,
    RevertOnRelease, ThreadQueue, ThreadQueueBuilder,
};
pub use scheduler::{Candidate, HostScheduler, Scheduler, SchedulerStats};
pub use system::{System, SystemBuilder};
pub use thread::{Thread, ThreadKind};
pub use watchdog::{ClockHandle, ClockStats, TimerHandle, Watchdog, WatchdogStats};
