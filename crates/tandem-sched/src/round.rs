//! Shared per-round bookkeeping.
//!
//! Workers post [`Completion`]s here; the control loop blocks on the
//! condition variable until one arrives. The lock is held only for the
//! bookkeeping update, never across an action's computation, so a
//! long-running action body cannot serialize unrelated scheduling
//! decisions.
//!
//! Abort protocol: on the first failure the control loop flags the
//! abort and broadcasts. A worker holding a job dispatched before the
//! failure re-checks the flag under the lock and posts a cancelled
//! completion instead of starting the work; nothing is left blocked.

use indexmap::IndexMap;
use tandem_core::{ActionError, AttrRef, AttrValue, SyncError};
use tandem_sync::{Condition, Mutex};

/// Outcome of one dispatched action.
pub(crate) enum CompletionResult {
    /// The action ran and staged these outputs.
    Done(IndexMap<AttrRef, AttrValue>),
    /// The action ran and failed.
    Failed(ActionError),
    /// The round was aborted before the action started; it never ran.
    Cancelled,
}

/// A finished (or cancelled) dispatch, posted by a worker.
pub(crate) struct Completion {
    /// Index of the action in the scheduler's arena.
    pub(crate) index: usize,
    /// What happened.
    pub(crate) result: CompletionResult,
    /// Wall-clock execution time of the action body, in microseconds.
    pub(crate) elapsed_us: u64,
}

#[derive(Default)]
struct Board {
    completions: Vec<Completion>,
    aborted: bool,
}

/// Round state shared between the control loop and its workers.
///
/// `gate` and `cond` are the coordination primitives. The inner std
/// mutex is a data cell only — mutual exclusion comes from `gate`, so
/// the cell is never contended; it exists because the gate itself
/// carries no payload.
pub(crate) struct RoundShared {
    gate: Mutex,
    cond: Condition,
    cell: std::sync::Mutex<Board>,
}

impl RoundShared {
    pub(crate) fn new() -> Self {
        let gate = Mutex::new();
        let cond = Condition::for_mutex(&gate);
        Self {
            gate,
            cond,
            cell: std::sync::Mutex::new(Board::default()),
        }
    }

    /// Access the board. Caller must hold `gate`.
    fn with<R>(&self, f: impl FnOnce(&mut Board) -> R) -> Result<R, SyncError> {
        let mut board = self.cell.lock().map_err(|_| SyncError::Poisoned)?;
        Ok(f(&mut board))
    }

    /// Worker side: post a completion and wake the control loop.
    pub(crate) fn post(&self, completion: Completion) -> Result<(), SyncError> {
        self.gate.lock()?;
        let posted = self.with(|b| b.completions.push(completion));
        let woken = self.cond.broadcast();
        self.gate.unlock()?;
        posted?;
        woken
    }

    /// Flag the round as aborted and wake every waiter so none is left
    /// blocked.
    pub(crate) fn flag_abort(&self) -> Result<(), SyncError> {
        self.gate.lock()?;
        let flagged = self.with(|b| b.aborted = true);
        let woken = self.cond.broadcast();
        self.gate.unlock()?;
        flagged?;
        woken
    }

    /// Whether the round has been aborted. Checked by workers under the
    /// lock before starting a job that was dispatched before the abort.
    pub(crate) fn is_aborted(&self) -> Result<bool, SyncError> {
        self.gate.lock()?;
        let aborted = self.with(|b| b.aborted);
        self.gate.unlock()?;
        aborted
    }

    /// Control side: block until at least one completion is available,
    /// then drain them all.
    ///
    /// The caller guarantees work is in flight, so a completion always
    /// arrives (aborted dispatches come back as
    /// [`CompletionResult::Cancelled`]). Wakeups may be spurious; the
    /// predicate is re-checked after every one.
    pub(crate) fn next_completions(&self) -> Result<Vec<Completion>, SyncError> {
        self.gate.lock()?;
        loop {
            let batch = self.with(|b| std::mem::take(&mut b.completions))?;
            if !batch.is_empty() {
                self.gate.unlock()?;
                return Ok(batch);
            }
            if let Err(e) = self.cond.wait() {
                let _ = self.gate.unlock();
                return Err(e);
            }
        }
    }
}
