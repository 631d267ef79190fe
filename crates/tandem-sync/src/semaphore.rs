//! Bounded counting semaphore built on [`Mutex`] and [`Condition`].

use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use tandem_core::SyncError;

use crate::condition::Condition;
use crate::mutex::Mutex;

/// A counting semaphore with an optional upper bound.
///
/// Constructed with an initial count and a maximum; a maximum of zero
/// means unbounded. A semaphore constructed with inconsistent counts
/// (`initial > max` when `max > 0`) is invalid: `is_ok()` is false and
/// every operation fails with [`SyncError::InvalidCount`].
///
/// The scheduler uses one of these to bound concurrent action dispatch:
/// permits are acquired before an action is handed to a worker and
/// released on completion.
#[derive(Debug)]
pub struct Semaphore {
    mutex: Mutex,
    cond: Condition,
    /// Current permit count. Only mutated while `mutex` is held; the
    /// atomic exists for interior mutability, not for lock-free access.
    count: AtomicU64,
    max: u64,
    valid: bool,
}

impl Semaphore {
    /// Create a semaphore with `initial` permits and an upper bound of
    /// `max` (zero = unbounded).
    pub fn new(initial: u64, max: u64) -> Self {
        let valid = max == 0 || initial <= max;
        if !valid {
            warn!("semaphore created with initial={initial} > max={max}; marked invalid");
        }
        let mutex = Mutex::new();
        let cond = Condition::for_mutex(&mutex);
        Self {
            mutex,
            cond,
            count: AtomicU64::new(initial),
            max,
            valid,
        }
    }

    /// Whether the primitive is valid and unpoisoned.
    pub fn is_ok(&self) -> bool {
        self.valid && self.mutex.is_ok()
    }

    fn check_valid(&self) -> Result<(), SyncError> {
        if !self.valid {
            return Err(SyncError::InvalidCount);
        }
        Ok(())
    }

    /// Acquire one permit, blocking while the count is zero.
    pub fn acquire(&self) -> Result<(), SyncError> {
        self.check_valid()?;
        self.mutex.lock()?;
        while self.count.load(Ordering::Relaxed) == 0 {
            if let Err(e) = self.cond.wait() {
                let _ = self.mutex.unlock();
                return Err(e);
            }
        }
        self.count.fetch_sub(1, Ordering::Relaxed);
        self.mutex.unlock()
    }

    /// Acquire one permit without blocking.
    ///
    /// `Ok(false)` means no permit was available.
    pub fn try_acquire(&self) -> Result<bool, SyncError> {
        self.check_valid()?;
        self.mutex.lock()?;
        if self.count.load(Ordering::Relaxed) == 0 {
            self.mutex.unlock()?;
            return Ok(false);
        }
        self.count.fetch_sub(1, Ordering::Relaxed);
        self.mutex.unlock()?;
        Ok(true)
    }

    /// Return one permit and wake one blocked waiter.
    ///
    /// `Ok(false)` means the count was already at the configured
    /// maximum; the call has no effect in that case.
    pub fn release(&self) -> Result<bool, SyncError> {
        self.check_valid()?;
        self.mutex.lock()?;
        if self.max > 0 && self.count.load(Ordering::Relaxed) == self.max {
            self.mutex.unlock()?;
            return Ok(false);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        self.cond.signal()?;
        self.mutex.unlock()?;
        Ok(true)
    }

    /// Permits currently available (racy snapshot, for diagnostics).
    pub fn available(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn bounded_semaphore_scenario() {
        let sem = Semaphore::new(2, 2);
        assert!(sem.is_ok());

        sem.acquire().unwrap();
        sem.acquire().unwrap();
        assert_eq!(sem.available(), 0);

        // Exhausted: try_acquire reports failure without blocking.
        assert_eq!(sem.try_acquire(), Ok(false));

        // One release restores one permit.
        assert_eq!(sem.release(), Ok(true));
        assert_eq!(sem.try_acquire(), Ok(true));

        // Back to max: further release has no effect.
        assert_eq!(sem.release(), Ok(true));
        assert_eq!(sem.release(), Ok(true));
        assert_eq!(sem.release(), Ok(false));
        assert_eq!(sem.available(), 2);
    }

    #[test]
    fn release_wakes_a_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0, 1));
        let (tx, rx) = mpsc::channel();

        let sem2 = Arc::clone(&sem);
        let waiter = std::thread::spawn(move || {
            sem2.acquire().unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(sem.release(), Ok(true));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        waiter.join().unwrap();
    }

    #[test]
    fn inconsistent_counts_fail_closed() {
        let sem = Semaphore::new(3, 2);
        assert!(!sem.is_ok());
        assert_eq!(sem.acquire(), Err(SyncError::InvalidCount));
        assert_eq!(sem.try_acquire(), Err(SyncError::InvalidCount));
        assert_eq!(sem.release(), Err(SyncError::InvalidCount));
    }

    #[test]
    fn unbounded_semaphore_accepts_any_release() {
        let sem = Semaphore::new(0, 0);
        for _ in 0..100 {
            assert_eq!(sem.release(), Ok(true));
        }
        assert_eq!(sem.available(), 100);
    }
}
