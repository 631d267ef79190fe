//! Fail-closed synchronization primitives for the Tandem scheduler.
//!
//! Three primitives: a mutual-exclusion [`Mutex`], a [`Condition`]
//! variable bound to one mutex at construction, and a bounded counting
//! [`Semaphore`]. Scheduling correctness depends on these never
//! deadlocking silently, so all of them follow the same fail-closed
//! policy: every primitive exposes [`is_ok`](Mutex::is_ok), and every
//! operation on an invalid or poisoned primitive returns a
//! [`SyncError`](tandem_core::SyncError) instead of blocking or
//! corrupting state.
//!
//! Unlike the `std::sync` types these wrap, the mutex tracks its owning
//! thread: `unlock()` by a non-owner and `lock()` by the current owner
//! both fail with a status rather than corrupting state or deadlocking.
//!
//! Teardown is silent — by the time a coupling is dropped the
//! surrounding runtime may already be gone, and diagnostic noise there
//! helps nobody. Failures during live operation are logged at the
//! failure site and returned as statuses.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod condition;
mod mutex;
mod semaphore;

pub use condition::Condition;
pub use mutex::Mutex;
pub use semaphore::Semaphore;
