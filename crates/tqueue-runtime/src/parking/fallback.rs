//! Portable parker on `std::sync::Condvar`
//!
//! Used where futexes are unavailable.

use super::Parker;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub struct CondvarParker {
    /// true = wake token deposited
    token: Mutex<bool>,
    condvar: Condvar,
    parked: AtomicU32,
}

impl CondvarParker {
    pub fn new() -> Self {
        Self {
            token: Mutex::new(false),
            condvar: Condvar::new(),
            parked: AtomicU32::new(0),
        }
    }
}

impl Default for CondvarParker {
    fn default() -> Self {
        Self::new()
    }
}

impl Parker for CondvarParker {
    fn park(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        self.parked.fetch_add(1, Ordering::SeqCst);

        while !*token {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    token = self
                        .condvar
                        .wait_timeout(token, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                None => {
                    token = self
                        .condvar
                        .wait(token)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        self.parked.fetch_sub(1, Ordering::SeqCst);
        std::mem::replace(&mut *token, false)
    }

    fn unpark(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.condvar.notify_one();
    }

    fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Relaxed) != 0
    }
}
