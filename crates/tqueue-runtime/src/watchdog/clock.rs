//! Clock thread
//!
//! An OS thread that calls `System::tick` once per tick interval. Deadlines
//! are computed from a fixed start so sleeping late does not accumulate
//! drift; a tick that starts more than a whole interval late is counted as
//! an overrun and the schedule is re-based on the current time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tqueue_core::{kdebug, TqError, TqResult};

use crate::system::System;

/// Statistics from one clock thread run
#[derive(Debug, Clone, Default)]
pub struct ClockStats {
    /// Ticks delivered
    pub ticks: u64,
    /// Timeouts that fired
    pub timeouts: u64,
    /// Ticks that started more than one interval late
    pub overruns: u64,
    /// Largest number of timeouts fired by one tick
    pub max_batch: usize,
}

/// Handle to a running clock thread
///
/// Dropping the handle stops the thread and waits for it.
pub struct ClockHandle {
    handle: Option<JoinHandle<ClockStats>>,
    shutdown: Arc<AtomicBool>,
}

impl ClockHandle {
    /// Stop the clock and collect its statistics
    pub fn shutdown(mut self) -> ClockStats {
        self.stop().unwrap_or_default()
    }

    /// Ask the clock to stop without waiting for it
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn stop(&mut self) -> Option<ClockStats> {
        self.request_shutdown();
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

pub(crate) fn spawn_clock(system: System, interval: Duration) -> TqResult<ClockHandle> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let handle = thread::Builder::new()
        .name("tq-clock".into())
        .spawn(move || {
            let stats = clock_loop(&system, interval, &flag);
            system.clock_stopped();
            stats
        })
        .map_err(|_| TqError::SpawnFailed)?;

    Ok(ClockHandle {
        handle: Some(handle),
        shutdown,
    })
}

fn clock_loop(system: &System, interval: Duration, shutdown: &AtomicBool) -> ClockStats {
    let mut stats = ClockStats::default();
    let mut next = Instant::now() + interval;

    while !shutdown.load(Ordering::Acquire) {
        let now = Instant::now();
        if now < next {
            thread::sleep(next - now);
            continue;
        }

        let fired = system.tick();
        stats.ticks += 1;
        stats.timeouts += fired as u64;
        stats.max_batch = stats.max_batch.max(fired);

        next += interval;
        let now = Instant::now();
        if next + interval < now {
            stats.overruns += 1;
            next = now + interval;
        }
    }

    kdebug!(
        "clock stopped after {} ticks ({} timeouts, {} overruns)",
        stats.ticks,
        stats.timeouts,
        stats.overruns
    );
    stats
}
