//! # tqueue-core
//!
//! Core types for the tqueue thread-queue engine.
//!
//! This crate is platform-agnostic and knows nothing about threads being
//! parked or scheduled. Everything that blocks lives in `tqueue-runtime`.
//!
//! ## Modules
//!
//! - `id` - Thread and object identifiers
//! - `state` - Thread life-cycle state, priority and wait status codes
//! - `error` - Fatal conditions and recoverable setup errors
//! - `isr` - Local interrupt disable levels
//! - `ticket` - Interrupt-safe ticket lock with scoped guards
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

#![allow(dead_code)]

pub mod id;
pub mod state;
pub mod error;
pub mod isr;
pub mod ticket;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::{ObjectId, ThreadId};
pub use state::{Priority, ThreadState, WaitStatus};
pub use error::{fatal, FatalError, TqError, TqResult};
pub use isr::IsrLevel;
pub use ticket::{LockStats, TicketGuard, TicketLock};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Constants shared by every crate of the workspace
pub mod constants {
    /// Upper bound on scheduler instances a system may be configured with
    pub const MAX_SCHEDULER_INSTANCES: usize = 32;

    /// Sentinel for "no thread"
    pub const THREAD_NONE: u32 = u32::MAX;

    /// Node number of a uniprocessor, single-node system
    pub const DEFAULT_NODE: u16 = 1;

    /// Cache line size for alignment
    pub const CACHE_LINE_SIZE: usize = 64;
}
