//! Deadline-driven wait engine.
//!
//! `wait` drives progress on the active list by sweeping it in insertion
//! order and asking the runtime for each record's status. The timeout is a
//! shared budget consumed across ALL records, not per operation: once it
//! reaches zero, remaining records are only checked, not waited on.
//!
//! Stop conditions, checked after each sweep:
//! 1. the active list is empty,
//! 2. the sweep observed at least one `Fail`/`Cancel` transition (fast-fail),
//! 3. the budget is exhausted and the sweep saw no transition out of
//!    `InProgress`.
//!
//! Condition 3 keeps polling while progress is being made even at zero
//! budget, which handles runtimes that only advance when asked repeatedly.

use std::time::Instant;

use crate::constants::WAIT_FOREVER;
use crate::error::Error;
use crate::record::{OpRecord, OpStatus};
use crate::runtime::OpRuntime;
use crate::set::{CompleteFn, EventSet};

/// Outcome of one `wait` call.
///
/// Per-operation failures are data, not control flow: `wait` succeeds even
/// when every operation failed, and returns an error only when the engine
/// itself could not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStatus {
    /// Operations still in progress when the engine stopped. On a fast-fail
    /// stop this is a snapshot and may already be stale.
    pub in_progress: usize,
    /// True if any operation has failed or been cancelled and not yet been
    /// drained via [`EventSet::err_info`](crate::EventSet::err_info).
    pub op_failed: bool,
}

/// What one sweep of the active list observed.
#[derive(Debug, Clone, Copy, Default)]
struct SweepOutcome {
    succeeded: usize,
    failed: usize,
}

impl<R: OpRuntime> EventSet<R> {
    /// Waits up to `timeout_ns` for the active operations to complete.
    ///
    /// [`WAIT_NONE`](crate::constants::WAIT_NONE) polls every operation once
    /// without blocking; [`WAIT_FOREVER`](crate::constants::WAIT_FOREVER)
    /// blocks until the set drains or an operation fails. The engine stops
    /// early on the first sweep that observes a failure; transitions already
    /// observed in that sweep are still finalized.
    ///
    /// # Errors
    ///
    /// [`Error::CantWait`] if the runtime reported a structural fault. The
    /// record being polled stays in the active list.
    pub fn wait(&mut self, timeout_ns: u64) -> Result<WaitStatus, Error> {
        let start = Instant::now();
        let mut any_failed = false;

        loop {
            let outcome = self.sweep(timeout_ns, start)?;

            #[cfg(debug_assertions)]
            {
                self.active.check_invariants();
                self.failed.check_invariants();
            }

            if outcome.failed > 0 {
                any_failed = true;
                tracing::debug!(
                    failed = outcome.failed,
                    still_active = self.active.len(),
                    "sweep observed failures; stopping early"
                );
                break;
            }
            if self.active.is_empty() {
                break;
            }
            if remaining_budget(timeout_ns, start) == 0 && outcome.succeeded == 0 {
                break;
            }
        }

        let status = WaitStatus {
            in_progress: self.active.len(),
            op_failed: any_failed || (self.err_occurred && !self.failed.is_empty()),
        };

        tracing::debug!(
            in_progress = status.in_progress,
            op_failed = status.op_failed,
            "wait finished"
        );
        Ok(status)
    }

    /// One traversal of the active list in insertion order.
    ///
    /// Completed records leave the list mid-walk: the cursor captures `next`
    /// before each poll, and the tail captured at entry bounds the walk so
    /// records appended during it (e.g. by a hook issuing follow-on work)
    /// are not visited.
    fn sweep(&mut self, timeout_ns: u64, start: Instant) -> Result<SweepOutcome, Error> {
        // The hook leaves the set for the duration of the sweep so firing it
        // does not alias the borrow on the lists.
        let mut complete_fn = self.complete_fn.take();
        let result = self.sweep_inner(timeout_ns, start, &mut complete_fn);
        self.complete_fn = complete_fn;
        result
    }

    fn sweep_inner(
        &mut self,
        timeout_ns: u64,
        start: Instant,
        complete_fn: &mut Option<CompleteFn>,
    ) -> Result<SweepOutcome, Error> {
        let mut outcome = SweepOutcome::default();

        let mut cursor = self.active.head();
        let end = self.active.tail();

        while let Some(ptr) = cursor {
            // SAFETY: ptr is a live member of `active`; the links are only
            // mutated through the list operations below, after `next` has
            // been captured.
            let next = unsafe { ptr.as_ref().next };
            let at_end = Some(ptr) == end;
            let token = unsafe { ptr.as_ref().token };

            let budget = remaining_budget(timeout_ns, start);
            let status = self.runtime.poll(token, budget).map_err(Error::CantWait)?;

            match status {
                OpStatus::InProgress => {}
                OpStatus::Succeed => {
                    // SAFETY: ptr is a member of `active` (taken from its cursor).
                    let mut rec = unsafe { self.active.unlink(ptr) };
                    rec.status = OpStatus::Succeed;
                    self.runtime.release(rec.token);
                    outcome.succeeded += 1;

                    fire_complete(complete_fn, &rec, OpStatus::Succeed);
                    // Record freed here; `Succeed` is never observable
                    // outside the hook.
                }
                OpStatus::Fail | OpStatus::Cancel => {
                    // SAFETY: ptr is a member of `active` (taken from its cursor).
                    let mut rec = unsafe { self.active.unlink(ptr) };
                    rec.status = status;

                    tracing::debug!(
                        counter = rec.counter,
                        status = ?status,
                        "operation completed with failure"
                    );

                    let failed_ptr = self.failed.push_back(rec);
                    self.err_occurred = true;
                    outcome.failed += 1;

                    // The hook fires after the transplant: an observer
                    // already finds the record in the failed list.
                    // SAFETY: failed_ptr is the record just linked; nothing
                    // mutates the failed list while this reference is live.
                    let rec = unsafe { failed_ptr.as_ref() };
                    fire_complete(complete_fn, rec, status);
                }
            }

            if at_end {
                break;
            }
            cursor = next;
        }

        Ok(outcome)
    }
}

fn fire_complete(hook: &mut Option<CompleteFn>, rec: &OpRecord, status: OpStatus) {
    if let Some(hook) = hook.as_mut() {
        if let Err(err) = hook(&rec.op_info(), status) {
            tracing::warn!(
                counter = rec.counter,
                error = %err,
                "completion hook failed; continuing sweep"
            );
        }
    }
}

/// Budget left from `timeout_ns` after the time elapsed since `start`,
/// clamped at zero. [`WAIT_FOREVER`] never depletes.
fn remaining_budget(timeout_ns: u64, start: Instant) -> u64 {
    if timeout_ns == WAIT_FOREVER {
        return WAIT_FOREVER;
    }
    let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
    timeout_ns.saturating_sub(elapsed)
}
