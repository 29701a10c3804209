//! Flush-order demo
//!
//! A counting semaphore built on a priority thread queue. Waiters block in
//! a scrambled priority order and are released most important first; a
//! second round shows timeouts firing from the clock thread.
//!
//! # Environment Variables
//!
//! - `TQ_LOG_LEVEL=debug` - Log level (off, error, warn, info, debug, trace)
//! - `TQ_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `TQ_TICK_INTERVAL_US=500` - Clock period for the timeout round

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tqueue::prelude::*;
use tqueue::{init_logging, kdebug, kinfo};

/// Counting semaphore; the count is only touched under the queue lock
struct Semaphore {
    queue: ThreadQueue,
    count: AtomicU32,
}

impl Semaphore {
    fn new(system: &System, count: u32) -> Self {
        Semaphore {
            queue: ThreadQueue::new(system, Discipline::Priority),
            count: AtomicU32::new(count),
        }
    }

    /// Take a unit, waiting at most `ticks` (0 = forever)
    fn obtain(&self, me: &Arc<Thread>, ticks: u64) -> WaitStatus {
        let guard = self.queue.acquire();
        let count = self.count.load(Ordering::Relaxed);
        if count > 0 {
            self.count.store(count - 1, Ordering::Relaxed);
            return WaitStatus::Successful;
        }
        guard.enqueue(me, &EnqueueContext::new().timeout(ticks, WaitStatus::Timeout))
    }

    /// Hand a unit to the first waiter, or bank it
    fn release(&self) -> Option<Arc<Thread>> {
        let guard = self.queue.acquire();
        match guard.first() {
            Some(first) => {
                guard.extract_critical(&first, WaitStatus::Successful);
                Some(first)
            }
            None => {
                self.count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

fn wait_all_blocked(threads: &[Arc<Thread>]) {
    for t in threads {
        if !t.wait_until_blocked(Duration::from_secs(5)) {
            eprintln!("{} never blocked", t.name());
            std::process::exit(1);
        }
    }
}

fn main() -> TqResult<()> {
    init_logging();
    println!("=== tqueue Flush Order ===\n");

    let waiters: u32 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(6)
        .max(1);

    let system = System::new(SystemConfig::from_env())?;
    let sem = Arc::new(Semaphore::new(&system, 0));

    // Round 1: priority release order
    let mut threads = Vec::new();
    let mut handles = Vec::new();
    for i in 0..waiters {
        let priority = Priority((i * 7) % waiters + 1);
        let thread = system.create_thread(&format!("w{}", i), priority)?;
        let s = Arc::clone(&sem);
        handles.push(system.spawn(&thread, move |me| s.obtain(me, 0))?);
        println!("blocked {} at priority {}", thread.name(), priority);
        threads.push(thread);
    }
    wait_all_blocked(&threads);
    kinfo!("{} waiters on the semaphore", sem.queue.waiters());

    println!();
    let mut last = Priority::HIGHEST;
    while let Some(t) = sem.release() {
        println!("released {} (priority {})", t.name(), t.priority());
        assert!(!t.priority().is_more_important_than(last), "release order broken");
        last = t.priority();
    }
    for h in handles {
        let status = h.join().unwrap_or(WaitStatus::Unsatisfied);
        kdebug!("waiter finished: {}", status);
    }

    // Round 2: timeouts from the clock thread, one waiter released early
    println!();
    let clock = system.start_clock()?;
    let mut handles = Vec::new();
    let mut threads = Vec::new();
    for i in 0..3u32 {
        let thread = system.create_thread(&format!("t{}", i), Priority(10 + i))?;
        let s = Arc::clone(&sem);
        let ticks = 20 * (i as u64 + 1);
        handles.push(system.spawn(&thread, move |me| s.obtain(me, ticks))?);
        threads.push(thread);
    }
    wait_all_blocked(&threads);
    if let Some(t) = sem.release() {
        println!("released {} before its deadline", t.name());
    }
    for (t, h) in threads.iter().zip(handles) {
        let status = h.join().unwrap_or(WaitStatus::Unsatisfied);
        println!("{} -> {}", t.name(), status);
    }
    let stats = clock.shutdown();
    println!(
        "\nclock: {} ticks, {} timeouts, {} overruns",
        stats.ticks, stats.timeouts, stats.overruns
    );

    sem.queue.clone().destroy();
    println!("\n=== Flush Order Complete ===");
    Ok(())
}
