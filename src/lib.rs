//! Event sets for tracking in-flight asynchronous storage operations.
//!
//! An [`EventSet`] is the rendezvous primitive of an otherwise synchronous
//! object-handle API: issuing code batch-submits operations against an
//! asynchronous runtime, then polls or waits on their joint completion with
//! a shared deadline and inspects per-operation failure diagnostics after
//! the fact.
//!
//! - `record`: per-operation descriptors ([`OpRecord`], [`OpStatus`])
//! - `list`: intrusive event lists owning the records
//! - `set`: the [`EventSet`] aggregate (append, counters, close)
//! - `wait`: the deadline-driven wait engine
//! - `err_info`: failure-diagnostics extraction ([`ErrInfo`])
//! - `runtime`: the [`OpRuntime`] contract and [`OpToken`]s
//! - `registry`: integer-handle registry for wrapper layers
//!
//! Per-operation failures are data, not control flow: [`EventSet::wait`]
//! succeeds even when every operation failed. Failures surface through
//! [`EventSet::err_status`], [`EventSet::err_count`] and
//! [`EventSet::err_info`].

pub mod constants;
mod err_info;
mod error;
mod list;
mod record;
mod registry;
mod runtime;
mod set;
pub mod test_utils;
mod wait;

pub use err_info::ErrInfo;
pub use error::{Error, HookError};
pub use record::{AppSite, OpInfo, OpRecord, OpStatus};
pub use registry::{EsId, SetRegistry};
pub use runtime::{DiagFrame, DiagStack, OpRuntime, OpToken, RuntimeFault};
pub use set::{CompleteFn, EventSet, InsertFn};
pub use wait::WaitStatus;
