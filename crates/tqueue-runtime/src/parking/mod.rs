//! Per-thread parking
//!
//! A blocked kernel thread is an OS thread parked on its own parker until
//! the scheduler makes it ready again. Parkers carry a single wake token:
//! an `unpark` that arrives before `park` is not lost, the next `park`
//! consumes it and returns at once.
//!
//! Callers always re-check their wake condition in a loop; a return from
//! `park` is a hint, not a guarantee.

use std::time::Duration;

/// Sleep/wake primitive owned by one thread
pub trait Parker: Send + Sync {
    /// Sleep until unparked or until `timeout` elapses
    ///
    /// Returns `true` if a wake token was consumed.
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Deposit the wake token and wake the owner if it sleeps
    fn unpark(&self);

    /// Whether the owner is inside `park` right now (hint, may be stale)
    fn is_parked(&self) -> bool;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParker as PlatformParker;
    } else {
        mod fallback;
        pub use fallback::CondvarParker as PlatformParker;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_park_timeout() {
        let parker = PlatformParker::new();
        let start = Instant::now();
        let woken = parker.park(Some(Duration::from_millis(50)));
        assert!(!woken);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_token_before_park() {
        let parker = PlatformParker::new();
        parker.unpark();
        assert!(parker.park(Some(Duration::from_secs(5))));
        // Token consumed
        assert!(!parker.park(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_unpark_wakes_sleeper() {
        let parker = Arc::new(PlatformParker::new());
        let sleeper = Arc::clone(&parker);

        let handle = thread::spawn(move || sleeper.park(Some(Duration::from_secs(10))));

        while !parker.is_parked() {
            thread::yield_now();
        }
        parker.unpark();

        let start = Instant::now();
        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
