//! The system context
//!
//! Bundles what every queue of one configuration shares: the scheduler,
//! the heads arena (multiprocessor only), the watchdog, the thread-id
//! space and the optional multiprocessing hooks. Cloning a `System` is
//! cheap; queues and the clock thread each keep a clone.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tqueue_core::{kinfo, ktrace, ObjectId, Priority, ThreadId, TqError, TqResult};

use crate::config::SystemConfig;
use crate::heads::HeadsArena;
use crate::mp::MpHooks;
use crate::queue;
use crate::scheduler::{HostScheduler, Scheduler};
use crate::thread::{Thread, ThreadKind};
use crate::watchdog::{spawn_clock, ClockHandle, Watchdog};

struct SystemInner {
    config: SystemConfig,
    scheduler: Arc<dyn Scheduler>,
    arena: Option<HeadsArena>,
    watchdog: Watchdog,
    mp_hooks: Option<Arc<dyn MpHooks>>,
    next_thread_id: AtomicU32,
    clock_running: AtomicBool,
}

#[derive(Clone)]
pub struct System {
    inner: Arc<SystemInner>,
}

/// Builder for a [`System`] with a custom scheduler or hooks
pub struct SystemBuilder {
    config: SystemConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    mp_hooks: Option<Arc<dyn MpHooks>>,
}

impl SystemBuilder {
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn mp_hooks(mut self, hooks: Arc<dyn MpHooks>) -> Self {
        self.mp_hooks = Some(hooks);
        self
    }

    pub fn build(self) -> TqResult<System> {
        let config = self.config;
        config.validate()?;

        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(HostScheduler::new(config.scheduler_count)) as Arc<dyn Scheduler>);
        if scheduler.instance_count() != config.scheduler_count {
            return Err(TqError::InvalidConfig(
                "scheduler instance count differs from scheduler_count",
            ));
        }

        let arena = config
            .smp
            .then(|| HeadsArena::new(config.max_nonempty_queues, config.scheduler_count));

        if config.debug_logging {
            config.print();
            kinfo!(
                "system up: {} scheduler, {} instances, heads {}",
                scheduler.name(),
                config.scheduler_count,
                if arena.is_some() { "pooled" } else { "embedded" }
            );
        }

        Ok(System {
            inner: Arc::new(SystemInner {
                config,
                scheduler,
                arena,
                watchdog: Watchdog::new(),
                mp_hooks: self.mp_hooks,
                next_thread_id: AtomicU32::new(0),
                clock_running: AtomicBool::new(false),
            }),
        })
    }
}

impl System {
    /// System with the host scheduler
    pub fn new(config: SystemConfig) -> TqResult<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: SystemConfig) -> SystemBuilder {
        SystemBuilder {
            config,
            scheduler: None,
            mp_hooks: None,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        &*self.inner.scheduler
    }

    /// The heads arena; `None` on a uniprocessor
    pub fn arena(&self) -> Option<&HeadsArena> {
        self.inner.arena.as_ref()
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.inner.watchdog
    }

    pub fn mp_hooks(&self) -> Option<&dyn MpHooks> {
        self.inner.mp_hooks.as_deref()
    }

    pub fn is_smp(&self) -> bool {
        self.inner.config.smp
    }

    fn next_id(&self) -> TqResult<ThreadId> {
        let max = self.inner.config.max_threads as u32;
        self.inner
            .next_thread_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| (id < max).then_some(id + 1))
            .map(ThreadId::new)
            .map_err(|_| TqError::NoThreadIds)
    }

    /// New thread on scheduler instance 0
    pub fn create_thread(&self, name: &str, priority: Priority) -> TqResult<Arc<Thread>> {
        self.create_thread_on(name, priority, 0)
    }

    /// New thread assigned to scheduler `instance`
    pub fn create_thread_on(&self, name: &str, priority: Priority, instance: usize) -> TqResult<Arc<Thread>> {
        if instance >= self.inner.config.scheduler_count {
            return Err(TqError::InvalidConfig("scheduler instance out of range"));
        }
        let id = self.next_id()?;
        Ok(Arc::new(Thread::new(id, name.to_string(), ThreadKind::Local, instance, priority)))
    }

    /// New proxy standing in for the remote thread `remote`
    pub fn create_proxy(&self, remote: ObjectId, priority: Priority) -> TqResult<Arc<Thread>> {
        if remote.is_local(self.inner.config.local_node) {
            return Err(TqError::InvalidConfig("proxy for a local thread"));
        }
        let id = self.next_id()?;
        Ok(Arc::new(Thread::new(
            id,
            format!("proxy-{}", remote),
            ThreadKind::Proxy { remote },
            0,
            priority,
        )))
    }

    /// Run `f` on a new OS thread that executes `thread`
    pub fn spawn<F, R>(&self, thread: &Arc<Thread>, f: F) -> TqResult<JoinHandle<R>>
    where
        F: FnOnce(&Arc<Thread>) -> R + Send + 'static,
        R: Send + 'static,
    {
        if thread.is_proxy() {
            return Err(TqError::InvalidConfig("proxies never execute"));
        }
        let thread = Arc::clone(thread);
        std::thread::Builder::new()
            .name(thread.name().to_string())
            .spawn(move || {
                // A fresh OS thread has nothing attached yet
                let _ = thread.attach();
                let result = f(&thread);
                let _ = Thread::detach();
                result
            })
            .map_err(|_| TqError::SpawnFailed)
    }

    /// Advance the clock by one tick; returns the timeouts that fired
    pub fn tick(&self) -> usize {
        self.advance(1)
    }

    /// Advance the clock by `ticks` and run every timeout that came due
    pub fn advance(&self, ticks: u64) -> usize {
        let expired = self.inner.watchdog.advance(ticks);
        let mut fired = 0;
        for entry in expired {
            ktrace!("timeout of {} at tick {}", entry.thread.id(), entry.handle.deadline());
            if queue::timeout(entry) {
                fired += 1;
            }
        }
        fired
    }

    /// Current tick
    pub fn now(&self) -> u64 {
        self.inner.watchdog.now()
    }

    /// Start a clock thread ticking at the configured interval
    pub fn start_clock(&self) -> TqResult<ClockHandle> {
        if self.inner.clock_running.swap(true, Ordering::AcqRel) {
            return Err(TqError::ClockAlreadyRunning);
        }
        spawn_clock(self.clone(), self.inner.config.tick_interval).inspect_err(|_| {
            self.inner.clock_running.store(false, Ordering::Release);
        })
    }

    pub(crate) fn clock_stopped(&self) {
        self.inner.clock_running.store(false, Ordering::Release);
    }

    pub fn is_clock_running(&self) -> bool {
        self.inner.clock_running.load(Ordering::Acquire)
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("config", &self.inner.config)
            .field("scheduler", &self.inner.scheduler.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_uniprocessor() {
        let sys = System::new(SystemConfig::new()).unwrap();
        assert!(!sys.is_smp());
        assert!(sys.arena().is_none());
        assert_eq!(sys.scheduler().instance_count(), 1);
        assert_eq!(sys.now(), 0);
    }

    #[test]
    fn test_new_smp_has_arena() {
        let sys = System::new(SystemConfig::multiprocessor(2).max_nonempty_queues(3)).unwrap();
        let arena = sys.arena().unwrap();
        assert_eq!(arena.capacity(), 3);
        assert_eq!(arena.available(), 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = System::new(SystemConfig::new().scheduler_count(2)).unwrap_err();
        assert!(matches!(err, TqError::InvalidConfig(_)));
    }

    #[test]
    fn test_scheduler_mismatch_rejected() {
        let err = System::builder(SystemConfig::multiprocessor(2))
            .scheduler(Arc::new(HostScheduler::new(3)))
            .build()
            .unwrap_err();
        assert!(matches!(err, TqError::InvalidConfig(_)));
    }

    #[test]
    fn test_thread_ids_exhaust() {
        let sys = System::new(SystemConfig::new().max_threads(2)).unwrap();
        let a = sys.create_thread("a", Priority(1)).unwrap();
        let b = sys.create_thread("b", Priority(1)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(sys.create_thread("c", Priority(1)).unwrap_err(), TqError::NoThreadIds);
    }

    #[test]
    fn test_create_thread_on_checks_instance() {
        let sys = System::new(SystemConfig::multiprocessor(2)).unwrap();
        assert_eq!(sys.create_thread_on("b", Priority(1), 1).unwrap().scheduler_index(), 1);
        assert!(sys.create_thread_on("c", Priority(1), 2).is_err());
    }

    #[test]
    fn test_proxy_must_be_remote() {
        let sys = System::new(SystemConfig::new()).unwrap();
        assert!(sys.create_proxy(ObjectId::new(1, 3), Priority(1)).is_err());
        let proxy = sys.create_proxy(ObjectId::new(2, 3), Priority(1)).unwrap();
        assert!(proxy.is_proxy());
        assert!(sys.spawn(&proxy, |_| ()).is_err());
    }

    #[test]
    fn test_spawn_attaches() {
        let sys = System::new(SystemConfig::new()).unwrap();
        let t = sys.create_thread("worker", Priority(3)).unwrap();
        let seen = sys
            .spawn(&t, |me| {
                let current = Thread::current().unwrap();
                (Arc::ptr_eq(&current, me), std::thread::current().name().map(String::from))
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(seen, (true, Some("worker".to_string())));
    }

    #[test]
    fn test_tick_advances() {
        let sys = System::new(SystemConfig::new()).unwrap();
        assert_eq!(sys.tick(), 0);
        assert_eq!(sys.advance(4), 0);
        assert_eq!(sys.now(), 5);
    }

    #[test]
    fn test_clock_single_instance() {
        let sys = System::new(SystemConfig::new().tick_interval(Duration::from_micros(200))).unwrap();
        let clock = sys.start_clock().unwrap();
        assert!(matches!(sys.start_clock(), Err(TqError::ClockAlreadyRunning)));

        while sys.now() < 3 {
            std::thread::yield_now();
        }
        let stats = clock.shutdown();
        assert!(stats.ticks >= 3);
        assert!(!sys.is_clock_running());
        assert!(sys.start_clock().is_ok());
    }
}
