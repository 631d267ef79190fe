//! Condition variable bound to a [`Mutex`] at construction.

use std::sync::{Arc, Condvar};
use std::thread;

use tandem_core::SyncError;

use crate::mutex::{Mutex, MutexCore, HOLDER_CHECK_INTERVAL};

/// A condition variable permanently bound to one [`Mutex`].
///
/// # Wait protocol
///
/// Wakeups are not guaranteed to be spurious-free, and a signal sent
/// between a predicate check and the wait is only visible if the
/// signaler held the bound mutex while changing the predicate. Callers
/// therefore always use the retry loop:
///
/// ```
/// # use tandem_sync::{Condition, Mutex};
/// # let m = Mutex::new();
/// # let cond = Condition::for_mutex(&m);
/// # let predicate = || true;
/// m.lock()?;
/// while !predicate() {
///     cond.wait()?;
/// }
/// // ... act on the predicate ...
/// m.unlock()?;
/// # Ok::<(), tandem_core::SyncError>(())
/// ```
///
/// Replacing this loop with a single check reintroduces lost-wakeup
/// bugs; the scheduler relies on every waiter re-checking.
#[derive(Clone, Debug)]
pub struct Condition {
    core: Arc<MutexCore>,
    cv: Arc<Condvar>,
}

impl Condition {
    /// Create a condition variable bound to `mutex`.
    ///
    /// The binding is permanent; all waits release and reacquire that
    /// mutex.
    pub fn for_mutex(mutex: &Mutex) -> Self {
        Self {
            core: Arc::clone(mutex.core()),
            cv: Arc::new(Condvar::new()),
        }
    }

    /// Whether the primitive (and its bound mutex) is still valid.
    pub fn is_ok(&self) -> bool {
        !self.core.poisoned.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Atomically release the bound mutex and wait for a wakeup,
    /// reacquiring the mutex before returning.
    ///
    /// The calling thread must hold the bound mutex;
    /// [`SyncError::NotOwner`] is returned otherwise. On success the
    /// caller holds the mutex again and must re-check its predicate.
    pub fn wait(&self) -> Result<(), SyncError> {
        let me = thread::current().id();
        let mut st = self.core.state_guard()?;
        if st.owner != Some(me) {
            return Err(SyncError::NotOwner);
        }

        // Release the logical lock and let a blocked lock() proceed.
        st.release_ownership();
        self.core.lock_cv.notify_one();

        // The std wait releases the state mutex atomically, so no
        // signal sent by a mutex holder can slip between the release
        // above and the wait below.
        st = self.cv.wait(st).map_err(|_| self.core.mark_poisoned())?;

        // Reacquire the logical lock before returning to the caller. A
        // holder that died without unlocking fails the wait instead of
        // stranding the waiter.
        while st.locked {
            if st.holder_gone() {
                return Err(self.core.mark_abandoned());
            }
            let (guard, _timed_out) = self
                .core
                .lock_cv
                .wait_timeout(st, HOLDER_CHECK_INTERVAL)
                .map_err(|_| self.core.mark_poisoned())?;
            st = guard;
        }
        st.take_ownership(me);
        Ok(())
    }

    /// Wake one waiter, if any.
    pub fn signal(&self) -> Result<(), SyncError> {
        let _st = self.core.state_guard()?;
        self.cv.notify_one();
        Ok(())
    }

    /// Wake all waiters.
    pub fn broadcast(&self) -> Result<(), SyncError> {
        let _st = self.core.state_guard()?;
        self.cv.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn wait_requires_holding_the_mutex() {
        let m = Mutex::new();
        let cond = Condition::for_mutex(&m);
        assert_eq!(cond.wait(), Err(SyncError::NotOwner));
    }

    #[test]
    fn signal_wakes_a_waiter() {
        let m = Mutex::new();
        let cond = Condition::for_mutex(&m);
        let flag = Arc::new(AtomicBool::new(false));

        let (m2, cond2, flag2) = (m.clone(), cond.clone(), Arc::clone(&flag));
        let waiter = std::thread::spawn(move || {
            m2.lock().unwrap();
            while !flag2.load(Ordering::SeqCst) {
                cond2.wait().unwrap();
            }
            m2.unlock().unwrap();
        });

        // Let the waiter reach its wait, then flip the predicate under
        // the mutex and signal.
        std::thread::sleep(Duration::from_millis(50));
        m.lock().unwrap();
        flag.store(true, Ordering::SeqCst);
        m.unlock().unwrap();
        cond.signal().unwrap();

        waiter.join().unwrap();
    }

    #[test]
    fn broadcast_wakes_all_waiters() {
        let m = Mutex::new();
        let cond = Condition::for_mutex(&m);
        let flag = Arc::new(AtomicBool::new(false));
        let woken = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let (m2, cond2) = (m.clone(), cond.clone());
            let (flag2, woken2) = (Arc::clone(&flag), Arc::clone(&woken));
            handles.push(std::thread::spawn(move || {
                m2.lock().unwrap();
                while !flag2.load(Ordering::SeqCst) {
                    cond2.wait().unwrap();
                }
                woken2.fetch_add(1, Ordering::SeqCst);
                m2.unlock().unwrap();
            }));
        }

        std::thread::sleep(Duration::from_millis(50));
        m.lock().unwrap();
        flag.store(true, Ordering::SeqCst);
        m.unlock().unwrap();
        cond.broadcast().unwrap();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn wait_reacquires_the_mutex() {
        let m = Mutex::new();
        let cond = Condition::for_mutex(&m);
        let flag = Arc::new(AtomicBool::new(false));

        let (m2, cond2, flag2) = (m.clone(), cond.clone(), Arc::clone(&flag));
        let waiter = std::thread::spawn(move || {
            m2.lock().unwrap();
            while !flag2.load(Ordering::SeqCst) {
                cond2.wait().unwrap();
            }
            // Holding the mutex again: unlock must succeed.
            m2.unlock().unwrap()
        });

        std::thread::sleep(Duration::from_millis(50));
        m.lock().unwrap();
        flag.store(true, Ordering::SeqCst);
        m.unlock().unwrap();
        cond.broadcast().unwrap();

        waiter.join().unwrap();
    }
}
