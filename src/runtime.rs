//! Contract between an event set and the asynchronous storage runtime.
//!
//! The event set never performs I/O itself. Each tracked operation carries an
//! [`OpToken`] minted by the runtime at issuance; the wait engine uses the
//! token to ask two questions ("has this completed?", "what went wrong?") and
//! to release runtime-side resources when the record is freed.

use thiserror::Error;

use crate::record::OpStatus;

/// Opaque handle into the asynchronous runtime for one in-flight operation.
///
/// Minted by the runtime when the operation is issued; meaningless to the
/// event set beyond identity. Must be released exactly once via
/// [`OpRuntime::release`] (the set does this on successful completion, on
/// diagnostics extraction, and when draining the failed list at close).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpToken(u64);

impl OpToken {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Structural fault reported by the runtime itself.
///
/// Not a per-operation failure: an operation that fails completes with
/// [`OpStatus::Fail`] and lands in the failed list. A `RuntimeFault` means
/// the runtime could not answer at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("storage runtime fault: {0}")]
pub struct RuntimeFault(pub String);

impl RuntimeFault {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// One frame of the diagnostic stack preserved for a failed operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagFrame {
    pub file: String,
    pub func: String,
    pub line: u32,
    pub desc: String,
}

/// Diagnostic stack captured by the runtime at the moment of failure.
///
/// Frames are ordered innermost-first. All strings are owned copies; the
/// stack outlives both the runtime's internal state and the record it was
/// extracted from. Deallocation is `Drop`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagStack {
    pub frames: Vec<DiagFrame>,
}

impl DiagStack {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Asynchronous runtime consumed by the wait engine and the error-info
/// extractor.
///
/// Callers poll per-operation status with a time budget, snapshot preserved
/// diagnostics on failure, and release tokens when records are freed.
pub trait OpRuntime {
    /// Polls one operation, blocking for at most `budget_ns`.
    ///
    /// A zero budget is a non-blocking status check. Returns the operation's
    /// current status, or a fault if the runtime itself could not execute
    /// (surfaced to callers as [`Error::CantWait`](crate::Error::CantWait)).
    fn poll(&mut self, token: OpToken, budget_ns: u64) -> Result<OpStatus, RuntimeFault>;

    /// Deep-copies the diagnostic stack captured when `token`'s operation
    /// failed. Ownership of the copy transfers to the caller.
    fn snapshot_diagnostics(&mut self, token: OpToken) -> Result<DiagStack, RuntimeFault>;

    /// Releases runtime-side resources for `token`. Idempotent.
    fn release(&mut self, token: OpToken);
}
