//! Shared helpers for the unit tests

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tqueue_core::{Priority, ThreadId, WaitStatus};

use crate::config::SystemConfig;
use crate::queue::{EnqueueContext, ThreadQueue};
use crate::scheduler::HostScheduler;
use crate::system::System;
use crate::thread::{Thread, ThreadKind};
use crate::wait::BLOCKED;

const LIMIT: Duration = Duration::from_secs(5);

/// A thread outside any system, for container-level tests
pub(crate) fn bare_thread(priority: u32, instance: usize) -> Thread {
    Thread::new(
        ThreadId::new(priority),
        format!("bare-{}", priority),
        ThreadKind::Local,
        instance,
        Priority(priority),
    )
}

/// System on a host scheduler the test can inspect
pub(crate) fn system(config: SystemConfig) -> (System, Arc<HostScheduler>) {
    let sched = Arc::new(HostScheduler::new(config.scheduler_count));
    let system = System::builder(config)
        .scheduler(sched.clone())
        .build()
        .expect("test system");
    (system, sched)
}

/// Spin until `cond` holds; false after the limit
pub(crate) fn spin_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + LIMIT;
    while !cond() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::yield_now();
    }
    true
}

/// Wait until `thread` has committed to blocking and parked
pub(crate) fn wait_blocked(thread: &Thread) {
    assert!(
        spin_until(|| thread.wait.flags.load(Ordering::Acquire) == BLOCKED && thread.is_suspended()),
        "{} never blocked",
        thread.name()
    );
}

/// Block `thread` on `queue` from its own OS thread
pub(crate) fn spawn_waiter(system: &System, queue: &ThreadQueue, thread: &Arc<Thread>) -> JoinHandle<WaitStatus> {
    spawn_waiter_with(system, queue, thread, None, None)
}

/// As `spawn_waiter`, with a timeout in ticks and a resource owner to boost
pub(crate) fn spawn_waiter_with(
    system: &System,
    queue: &ThreadQueue,
    thread: &Arc<Thread>,
    timeout: Option<u64>,
    owner: Option<Arc<Thread>>,
) -> JoinHandle<WaitStatus> {
    let queue = queue.clone();
    let handle = system
        .spawn(thread, move |me| {
            let mut ctx = EnqueueContext::new();
            if let Some(ticks) = timeout {
                ctx = ctx.timeout(ticks, WaitStatus::Timeout);
            }
            if let Some(owner) = &owner {
                ctx = ctx.boost_owner(owner);
            }
            queue.enqueue(me, &ctx)
        })
        .expect("spawn waiter");
    wait_blocked(thread);
    handle
}
