//! Event sets: the rendezvous point for in-flight asynchronous operations.
//!
//! An [`EventSet`] owns two intrusive lists of [`OpRecord`]s (active and
//! failed), a monotonically increasing operation counter, a latched error
//! flag, optional user hooks, and the asynchronous runtime the operations
//! were issued against. Issuing APIs append fully-populated records; the
//! wait engine (`wait.rs`) drives them to completion; the error-info
//! extractor (`err_info.rs`) drains failure diagnostics.
//!
//! Scheduling model: single-threaded cooperative. Nothing here is shared
//! across threads, and the only blocking point is the runtime poll inside
//! the wait engine.

use std::mem::ManuallyDrop;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, HookError};
use crate::list::EventList;
use crate::record::{OpInfo, OpRecord, OpStatus};
use crate::runtime::OpRuntime;

/// Hook fired before a record becomes visible in the active list.
/// Failure propagates as an append failure and the record is not added.
pub type InsertFn = Box<dyn FnMut(&OpInfo<'_>) -> Result<(), HookError>>;

/// Hook fired after a completed record has been freed (success) or
/// transplanted into the failed list (failure/cancellation). Failure is
/// logged and does not abort the sweep.
pub type CompleteFn = Box<dyn FnMut(&OpInfo<'_>, OpStatus) -> Result<(), HookError>>;

/// Container tracking in-flight asynchronous operations against runtime `R`.
///
/// Records are exclusively owned by exactly one of the two lists at a time;
/// only the set frees them. Dropping a set with live active operations is a
/// logic error and panics; drive [`wait`](Self::wait) to completion and use
/// [`close`](Self::close).
pub struct EventSet<R: OpRuntime> {
    pub(crate) runtime: R,

    /// Records still in progress, in insertion order.
    pub(crate) active: EventList,
    /// Records that completed with `Fail`/`Cancel`, in insertion order.
    pub(crate) failed: EventList,

    /// Counter the next appended record will be assigned. Never decreases.
    pub(crate) op_counter: u64,
    /// Latched the first time a record transplants into `failed`; cleared
    /// only by a full drain in `err_info`.
    pub(crate) err_occurred: bool,

    pub(crate) insert_fn: Option<InsertFn>,
    pub(crate) complete_fn: Option<CompleteFn>,
}

impl<R: OpRuntime> EventSet<R> {
    /// Creates an empty event set owning `runtime`.
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            active: EventList::init(),
            failed: EventList::init(),
            op_counter: 0,
            err_occurred: false,
            insert_fn: None,
            complete_fn: None,
        }
    }

    /// Appends a record, assigning it the next operation counter and the
    /// current wall-clock timestamp. Returns the assigned counter.
    ///
    /// The insert hook (if any) fires before the record is linked; if it
    /// rejects the operation, the record is not added, its token is
    /// released, and the counter is not consumed.
    ///
    /// # Panics
    ///
    /// Panics if `rec` is already linked or not `InProgress`.
    pub fn append(&mut self, mut rec: Box<OpRecord>) -> Result<u64, Error> {
        assert!(!rec.linked, "append: record already linked");
        assert!(
            rec.status == OpStatus::InProgress,
            "append: record already completed"
        );

        let counter = self.op_counter;
        rec.counter = counter;
        rec.timestamp = unix_now_ns();

        if let Some(hook) = self.insert_fn.as_mut() {
            if let Err(err) = hook(&rec.op_info()) {
                self.runtime.release(rec.token);
                return Err(Error::CantInsert(err));
            }
        }

        self.active.push_back(rec);
        self.op_counter += 1;

        tracing::trace!(counter, "operation appended to event set");
        Ok(counter)
    }

    /// Number of operations still in progress. Failed records are not
    /// counted here; see [`err_count`](Self::err_count).
    #[inline]
    pub fn count(&self) -> usize {
        self.active.len()
    }

    /// Counter that will be assigned to the next appended operation.
    ///
    /// For wrapper libraries that need to pre-correlate a logged call with
    /// the counter the next insertion will receive.
    #[inline]
    pub fn op_counter(&self) -> u64 {
        self.op_counter
    }

    /// True if any operation has failed or been cancelled and its
    /// diagnostics have not yet been fully drained.
    #[inline]
    pub fn err_status(&self) -> bool {
        self.err_occurred
    }

    /// Number of failed operations awaiting extraction.
    ///
    /// May underreport: operations that have not been polled yet have not
    /// had the chance to fail.
    #[inline]
    pub fn err_count(&self) -> usize {
        if self.err_occurred {
            self.failed.len()
        } else {
            0
        }
    }

    /// Installs the insert hook. Replaces any previous one.
    pub fn register_insert_fn<F>(&mut self, hook: F)
    where
        F: FnMut(&OpInfo<'_>) -> Result<(), HookError> + 'static,
    {
        self.insert_fn = Some(Box::new(hook));
    }

    /// Installs the completion hook. Replaces any previous one.
    pub fn register_complete_fn<F>(&mut self, hook: F)
    where
        F: FnMut(&OpInfo<'_>, OpStatus) -> Result<(), HookError> + 'static,
    {
        self.complete_fn = Some(Box::new(hook));
    }

    /// Access to the owned runtime, e.g. for issuing APIs that mint tokens.
    #[inline]
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    #[inline]
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Closes the set, releasing every failed record and its token, and
    /// returns the runtime.
    ///
    /// Refuses with [`Error::Busy`] while operations are active, handing
    /// the set back untouched: silently dropping live work would leak
    /// tokens and diagnostics. Drive [`wait`](Self::wait) to completion
    /// first.
    pub fn close(mut self) -> Result<R, (Self, Error)> {
        if !self.active.is_empty() {
            let live = self.active.len();
            return Err((self, Error::Busy(live)));
        }

        self.drain_failed();
        assert!(self.active.is_empty());
        assert!(self.failed.is_empty());

        tracing::debug!(op_counter = self.op_counter, "event set closed");

        // Hooks drop here; the lists are empty and hold no allocations.
        self.insert_fn = None;
        self.complete_fn = None;

        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so `runtime` is moved out exactly
        // once and no other field owns heap state at this point.
        let runtime = unsafe { std::ptr::read(&this.runtime) };
        Ok(runtime)
    }

    /// Frees every failed record, releasing its token.
    pub(crate) fn drain_failed(&mut self) {
        while let Some(rec) = self.failed.pop_front() {
            self.runtime.release(rec.token);
        }
    }
}

impl<R: OpRuntime + std::fmt::Debug> std::fmt::Debug for EventSet<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Hooks are opaque closures; report everything else.
        f.debug_struct("EventSet")
            .field("runtime", &self.runtime)
            .field("active", &self.active.len())
            .field("failed", &self.failed.len())
            .field("op_counter", &self.op_counter)
            .field("err_occurred", &self.err_occurred)
            .finish_non_exhaustive()
    }
}

impl<R: OpRuntime> Drop for EventSet<R> {
    fn drop(&mut self) {
        // It is a logic error to drop a set with in-flight operations:
        // their tokens and diagnostics would be unrecoverable.
        assert!(
            self.active.is_empty(),
            "event set dropped with {} active operation(s)",
            self.active.len()
        );
        self.drain_failed();
    }
}

/// Wall-clock nanoseconds since the Unix epoch.
pub(crate) fn unix_now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
