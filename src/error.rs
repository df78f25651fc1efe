//! Error kinds exposed by the event-set core.
//!
//! Per-operation failures are never surfaced here: an operation that fails is
//! data (inspect it via [`EventSet::err_status`](crate::EventSet::err_status),
//! [`err_count`](crate::EventSet::err_count) and
//! [`err_info`](crate::EventSet::err_info)), not control flow. These kinds
//! cover only the cases where the core itself could not execute.

use thiserror::Error;

use crate::runtime::RuntimeFault;

/// Failure returned by a user-installed insert or completion hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors produced by event-set operations and the handle registry.
#[derive(Debug, Error)]
pub enum Error {
    /// The supplied handle does not name a registered event set.
    #[error("not an event set handle: {0}")]
    BadHandle(u64),

    /// A required argument was invalid (e.g. a zero-capacity info request).
    #[error("invalid argument: {0}")]
    BadValue(&'static str),

    /// `close` was refused because operations are still active.
    #[error("event set has {0} active operation(s)")]
    Busy(usize),

    /// The async runtime reported a structural fault while polling.
    /// Distinct from a per-operation failure, which is recorded in the
    /// failed list instead.
    #[error("can't wait on operations")]
    CantWait(#[source] RuntimeFault),

    /// Diagnostics extraction failed for a failed operation.
    #[error("can't retrieve error info for failed operation(s)")]
    CantGet(#[source] RuntimeFault),

    /// The handle registry refused the new event set.
    #[error("can't register event set: handle space exhausted")]
    CantRegister,

    /// The insert hook rejected the operation; the record was not added.
    #[error("insert hook rejected operation")]
    CantInsert(#[source] HookError),
}
