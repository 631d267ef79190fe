//! Owner-tracked mutual-exclusion lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex as StdMutex, MutexGuard, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::warn;
use tandem_core::SyncError;

thread_local! {
    /// Dropped when the owning thread exits, whether it returned or
    /// panicked. Other handles detect a holder that died without
    /// unlocking by upgrading the [`Weak`] stored in [`LockState`].
    static LIVENESS: Arc<()> = Arc::new(());
}

/// How often a blocked acquirer re-checks whether the current holder is
/// still alive.
pub(crate) const HOLDER_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Logical lock state, guarded by the core's std mutex.
#[derive(Debug, Default)]
pub(crate) struct LockState {
    pub(crate) locked: bool,
    pub(crate) owner: Option<ThreadId>,
    owner_liveness: Option<Weak<()>>,
}

impl LockState {
    /// Record `me` as the holder, with a liveness token for abandonment
    /// detection.
    pub(crate) fn take_ownership(&mut self, me: ThreadId) {
        self.locked = true;
        self.owner = Some(me);
        self.owner_liveness = Some(LIVENESS.with(Arc::downgrade));
    }

    pub(crate) fn release_ownership(&mut self) {
        self.locked = false;
        self.owner = None;
        self.owner_liveness = None;
    }

    /// Whether the lock is held by a thread that has since exited.
    pub(crate) fn holder_gone(&self) -> bool {
        self.locked
            && self
                .owner_liveness
                .as_ref()
                .is_some_and(|w| w.strong_count() == 0)
    }
}

/// Shared core between a [`Mutex`] and the [`Condition`](crate::Condition)
/// variables bound to it.
#[derive(Debug)]
pub(crate) struct MutexCore {
    /// The logical lock state. All primitives serialize on this.
    pub(crate) state: StdMutex<LockState>,
    /// Wakes threads blocked in `lock()` (or reacquiring after a wait).
    pub(crate) lock_cv: Condvar,
    /// Set once any operation observes std poisoning; all subsequent
    /// operations fail closed.
    pub(crate) poisoned: AtomicBool,
}

impl MutexCore {
    /// Take the state lock, converting std poisoning into a status.
    pub(crate) fn state_guard(&self) -> Result<MutexGuard<'_, LockState>, SyncError> {
        if self.poisoned.load(Ordering::Acquire) {
            return Err(SyncError::Poisoned);
        }
        self.state.lock().map_err(|_| {
            self.poisoned.store(true, Ordering::Release);
            warn!("mutex state poisoned by a panicked holder");
            SyncError::Poisoned
        })
    }

    /// Mark the core poisoned after a failed condvar wait.
    pub(crate) fn mark_poisoned(&self) -> SyncError {
        self.poisoned.store(true, Ordering::Release);
        warn!("mutex state poisoned during a condition wait");
        SyncError::Poisoned
    }

    /// Mark the core poisoned after observing a holder that exited
    /// without unlocking.
    pub(crate) fn mark_abandoned(&self) -> SyncError {
        self.poisoned.store(true, Ordering::Release);
        warn!("mutex holder exited without unlocking; failing closed");
        SyncError::Poisoned
    }
}

/// A mutual-exclusion lock with explicit lock/unlock operations and
/// owner tracking.
///
/// Cloning yields another handle to the same lock (the scheduler's
/// control loop and its workers share one). The lock is not reentrant:
/// `lock()` while already owning it fails with
/// [`SyncError::WouldDeadlock`] instead of deadlocking.
///
/// A holder that exits without unlocking, including by panic, abandons
/// the lock. Blocked and later acquirers detect this, mark the lock
/// poisoned, and fail with [`SyncError::Poisoned`] instead of blocking
/// forever on a dead owner.
#[derive(Clone, Debug)]
pub struct Mutex {
    core: Arc<MutexCore>,
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutex {
    /// Create an unlocked mutex.
    pub fn new() -> Self {
        Self {
            core: Arc::new(MutexCore {
                state: StdMutex::new(LockState::default()),
                lock_cv: Condvar::new(),
                poisoned: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn core(&self) -> &Arc<MutexCore> {
        &self.core
    }

    /// Whether the primitive is still valid (not poisoned).
    pub fn is_ok(&self) -> bool {
        !self.core.poisoned.load(Ordering::Acquire)
    }

    /// Acquire the lock, blocking until it is free.
    pub fn lock(&self) -> Result<(), SyncError> {
        let me = thread::current().id();
        let mut st = self.core.state_guard()?;
        if st.owner == Some(me) {
            warn!("mutex relock by owning thread prevented");
            return Err(SyncError::WouldDeadlock);
        }
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

    /// Acquire the lock if it is free; never blocks.
    ///
    /// `Ok(false)` means the lock was busy (including when held by the
    /// calling thread).
    pub fn try_lock(&self) -> Result<bool, SyncError> {
        let mut st = self.core.state_guard()?;
        if st.locked {
            if st.holder_gone() {
                return Err(self.core.mark_abandoned());
            }
            return Ok(false);
        }
        st.take_ownership(thread::current().id());
        Ok(true)
    }

    /// Release the lock.
    ///
    /// Fails with [`SyncError::NotOwner`] when the calling thread does
    /// not hold it; the lock state is left untouched in that case.
    pub fn unlock(&self) -> Result<(), SyncError> {
        let me = thread::current().id();
        let mut st = self.core.state_guard()?;
        if st.owner != Some(me) {
            return Err(SyncError::NotOwner);
        }
        st.release_ownership();
        self.core.lock_cv.notify_one();
        Ok(())
    }
}
