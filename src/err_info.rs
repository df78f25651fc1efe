//! Extraction of failure diagnostics from an event set.
//!
//! Failed operations stay in the failed list, with their diagnostic stacks
//! preserved behind the runtime token, until the caller drains them here.
//! Each drained record is freed and its token released; the caller receives
//! self-contained owned copies.

use crate::error::Error;
use crate::record::{OpRecord, OpStatus};
use crate::runtime::{DiagStack, OpRuntime};
use crate::set::EventSet;

/// Self-contained diagnostics for one failed operation.
///
/// Every field is an owned copy: the entry outlives the event set, the
/// record, and the runtime state it was extracted from. Deallocation is
/// `Drop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrInfo {
    pub api_name: String,
    pub api_args: String,
    pub app_file: String,
    pub app_func: String,
    pub app_line: u32,
    pub app_version: String,
    /// Counter the operation was assigned at append.
    pub counter: u64,
    /// Nanoseconds since the Unix epoch at which it was appended.
    pub timestamp: u64,
    /// Final status: [`OpStatus::Fail`] or [`OpStatus::Cancel`].
    pub status: OpStatus,
    /// Diagnostic frames captured by the runtime at the moment of failure.
    pub stack: DiagStack,
}

impl ErrInfo {
    fn from_record(rec: &OpRecord, stack: DiagStack) -> Self {
        Self {
            api_name: rec.api_name.clone(),
            api_args: rec.api_args.clone(),
            app_file: rec.app_site.file.clone(),
            app_func: rec.app_site.func.clone(),
            app_line: rec.app_site.line,
            app_version: rec.app_version.clone(),
            counter: rec.counter,
            timestamp: rec.timestamp,
            status: rec.status,
            stack,
        }
    }
}

impl<R: OpRuntime> EventSet<R> {
    /// Drains up to `max` failed operations in insertion order, returning
    /// their diagnostics. The returned length is the number of records
    /// actually cleared.
    ///
    /// Drained records are freed and their tokens released. If the drain
    /// empties a previously non-empty failed list, the error flag clears;
    /// a partial drain leaves it latched.
    ///
    /// # Errors
    ///
    /// - [`Error::BadValue`] if `max == 0`.
    /// - [`Error::CantGet`] if the runtime could not snapshot a record's
    ///   diagnostics. The record is re-queued at the front of the failed
    ///   list; entries already drained by this call are lost to the caller,
    ///   but their tokens were released.
    pub fn err_info(&mut self, max: usize) -> Result<Vec<ErrInfo>, Error> {
        if max == 0 {
            return Err(Error::BadValue("err_info capacity is zero"));
        }

        let before = self.failed.len();
        let mut drained = Vec::with_capacity(before.min(max));

        while drained.len() < max {
            let Some(rec) = self.failed.pop_front() else {
                break;
            };
            assert!(
                matches!(rec.status, OpStatus::Fail | OpStatus::Cancel),
                "failed list held a record with status {:?}",
                rec.status
            );

            let stack = match self.runtime.snapshot_diagnostics(rec.token) {
                Ok(stack) => stack,
                Err(fault) => {
                    self.failed.push_front(rec);
                    return Err(Error::CantGet(fault));
                }
            };

            self.runtime.release(rec.token);
            drained.push(ErrInfo::from_record(&rec, stack));
            // Record freed here.
        }

        if before > 0 && drained.len() == before {
            assert!(self.failed.is_empty());
            self.err_occurred = false;
            tracing::debug!(cleared = drained.len(), "failed list drained; error flag cleared");
        } else if !drained.is_empty() {
            tracing::debug!(
                cleared = drained.len(),
                remaining = self.failed.len(),
                "partial drain of failed list"
            );
        }

        Ok(drained)
    }
}
