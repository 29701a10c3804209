//! Stress test - many threads on few queues
//!
//! Waiter threads block on a handful of shared queues with short timeouts
//! while releaser threads dequeue from them and the clock thread expires
//! the rest. Every wait must end exactly once.
//!
//! Usage: `tq-stress [waiters] [seconds]`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tqueue::prelude::*;
use tqueue::{init_logging, kinfo};

const QUEUES: usize = 4;
const RELEASERS: usize = 2;

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    successful: AtomicU64,
    timeout: AtomicU64,
    deleted: AtomicU64,
    released: AtomicU64,
}

/// xorshift; good enough to scatter waiters
fn next(seed: &mut u64) -> u64 {
    *seed ^= *seed << 13;
    *seed ^= *seed >> 7;
    *seed ^= *seed << 17;
    *seed
}

fn main() -> TqResult<()> {
    init_logging();
    println!("=== tqueue Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let waiters: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(32);
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(2);

    let instances = 4;
    let config = SystemConfig::from_env()
        .smp(true)
        .scheduler_count(instances)
        .max_nonempty_queues(QUEUES)
        .max_threads(waiters + 16)
        .tick_interval(Duration::from_micros(200));
    config.print();
    let system = System::new(config)?;

    let queues: Arc<Vec<ThreadQueue>> = Arc::new(
        (0..QUEUES)
            .map(|i| {
                let discipline = if i % 2 == 0 { Discipline::Priority } else { Discipline::Fifo };
                ThreadQueue::new(&system, discipline)
            })
            .collect(),
    );
    let counters = Arc::new(Counters::default());
    let stop = Arc::new(AtomicBool::new(false));

    println!("Spawning {} waiters on {} queues for {}s...", waiters, QUEUES, seconds);
    let clock = system.start_clock()?;
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..waiters {
        let priority = Priority((i % 16) as u32 + 1);
        let thread = system.create_thread_on(&format!("w{}", i), priority, i % instances)?;
        let queues = Arc::clone(&queues);
        let counters = Arc::clone(&counters);
        let stop = Arc::clone(&stop);
        handles.push(system.spawn(&thread, move |me| {
            let mut seed = 0x9E37_79B9_7F4A_7C15 ^ (i as u64 + 1);
            while !stop.load(Ordering::Relaxed) {
                let q = &queues[next(&mut seed) as usize % QUEUES];
                let ticks = next(&mut seed) % 8;
                counters.enqueued.fetch_add(1, Ordering::Relaxed);
                let status = q.enqueue(me, &EnqueueContext::new().timeout(ticks, WaitStatus::Timeout));
                let slot = match status {
                    WaitStatus::Successful => &counters.successful,
                    WaitStatus::Timeout => &counters.timeout,
                    _ => &counters.deleted,
                };
                slot.fetch_add(1, Ordering::Relaxed);
            }
        })?);
    }

    let mut releasers = Vec::new();
    for r in 0..RELEASERS {
        let queues = Arc::clone(&queues);
        let counters = Arc::clone(&counters);
        let stop = Arc::clone(&stop);
        releasers.push(std::thread::spawn(move || {
            let mut n = r;
            while !stop.load(Ordering::Relaxed) {
                if queues[n % QUEUES].dequeue(WaitStatus::Successful).is_some() {
                    counters.released.fetch_add(1, Ordering::Relaxed);
                }
                n += 1;
                std::thread::yield_now();
            }
        }));
    }

    std::thread::sleep(Duration::from_secs(seconds));
    stop.store(true, Ordering::Relaxed);
    for r in releasers {
        let _ = r.join();
    }

    // Waiters still blocked without a timeout are released as deleted
    let mut handles = handles.into_iter().peekable();
    while let Some(h) = handles.peek() {
        if h.is_finished() {
            let _ = handles.next().map(|h| h.join());
            continue;
        }
        for q in queues.iter() {
            q.flush(WaitStatus::ObjectDeleted);
        }
        std::thread::yield_now();
    }
    let elapsed = start.elapsed();
    let clock_stats = clock.shutdown();

    let enqueued = counters.enqueued.load(Ordering::Relaxed);
    let successful = counters.successful.load(Ordering::Relaxed);
    let timeout = counters.timeout.load(Ordering::Relaxed);
    let deleted = counters.deleted.load(Ordering::Relaxed);
    kinfo!("released by dequeue: {}", counters.released.load(Ordering::Relaxed));

    println!("\n=== Results ===");
    println!("Waits:           {}", enqueued);
    println!("Successful:      {}", successful);
    println!("Timeout:         {}", timeout);
    println!("Deleted:         {}", deleted);
    println!("Clock ticks:     {} ({} overruns)", clock_stats.ticks, clock_stats.overruns);
    println!("Elapsed:         {:?}", elapsed);
    println!("Throughput:      {:.0} waits/sec", enqueued as f64 / elapsed.as_secs_f64());
    for (i, q) in queues.iter().enumerate() {
        let stats = q.lock_stats();
        println!(
            "Queue {} lock:    {} acquisitions, {} contended, max distance {}",
            i, stats.acquisitions, stats.contended, stats.max_ticket_distance
        );
    }
    if let Some(arena) = system.arena() {
        println!("Arena:           {}/{} slots free", arena.available(), arena.capacity());
    }

    let ended = successful + timeout + deleted;
    if ended != enqueued {
        eprintln!("MISMATCH: {} waits, {} ended", enqueued, ended);
        std::process::exit(1);
    }
    println!("\n=== Stress Test Complete ===");
    Ok(())
}
