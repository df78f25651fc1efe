//! Operation records: one entry per in-flight asynchronous operation.
//!
//! A record is fully populated by the issuing API except for `counter` and
//! `timestamp`, which the owning event set assigns at append. After that,
//! nothing mutates the record except the status transition and the transplant
//! between the active and failed lists.

use core::ptr::NonNull;

use crate::runtime::OpToken;

/// Completion status of one operation.
///
/// State machine: `InProgress` is the only non-terminal state. `Succeed` is
/// transient (the record is freed in the same sweep that observes it and is
/// never externally visible outside the completion hook); `Fail` and
/// `Cancel` are terminal in the failed list. No back-transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    /// Issued, not yet complete. Set iff the record is in the active list.
    InProgress,
    /// Completed successfully.
    Succeed,
    /// Completed with a failure; diagnostics preserved behind the token.
    Fail,
    /// Cancelled by the runtime. Treated like `Fail` for bookkeeping.
    Cancel,
}

/// Caller provenance: where in the issuing application the operation was
/// enqueued. Captured at the call site of the issuing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSite {
    pub file: String,
    pub func: String,
    pub line: u32,
}

impl AppSite {
    pub fn new(file: impl Into<String>, func: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            func: func.into(),
            line,
        }
    }
}

/// Borrowed view of one record's identity, handed to insert/completion hooks.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo<'a> {
    pub api_name: &'a str,
    pub api_args: &'a str,
    pub app_file: &'a str,
    pub app_func: &'a str,
    pub app_line: u32,
    pub app_version: &'a str,
    pub counter: u64,
    /// Nanoseconds since the Unix epoch at which the record was appended.
    pub timestamp: u64,
}

/// Descriptor for a single in-flight asynchronous operation.
///
/// An intrusive-list node: lives in exactly one [`EventList`](crate::list)
/// at a time, owned by the event set it was appended to. The `linked` flag
/// disambiguates an unlinked record from a head/tail node whose neighbour
/// pointers are `None`.
#[derive(Debug)]
pub struct OpRecord {
    pub(crate) counter: u64,
    pub(crate) api_name: String,
    pub(crate) api_args: String,
    pub(crate) app_site: AppSite,
    pub(crate) app_version: String,
    /// Nanoseconds since the Unix epoch; stamped at append.
    pub(crate) timestamp: u64,
    pub(crate) token: OpToken,
    pub(crate) status: OpStatus,

    pub(crate) prev: Option<NonNull<OpRecord>>,
    pub(crate) next: Option<NonNull<OpRecord>>,
    pub(crate) linked: bool,
}

impl OpRecord {
    /// Creates an unlinked record ready for
    /// [`EventSet::append`](crate::EventSet::append).
    ///
    /// `counter` and `timestamp` are placeholders until the set assigns them.
    pub fn new(
        api_name: impl Into<String>,
        api_args: impl Into<String>,
        app_site: AppSite,
        app_version: impl Into<String>,
        token: OpToken,
    ) -> Box<Self> {
        Box::new(Self {
            counter: 0,
            api_name: api_name.into(),
            api_args: api_args.into(),
            app_site,
            app_version: app_version.into(),
            timestamp: 0,
            token,
            status: OpStatus::InProgress,
            prev: None,
            next: None,
            linked: false,
        })
    }

    /// Counter assigned by the owning event set at append.
    #[inline]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    #[inline]
    pub fn status(&self) -> OpStatus {
        self.status
    }

    #[inline]
    pub fn token(&self) -> OpToken {
        self.token
    }

    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Borrowed identity view for hooks and diagnostics.
    pub fn op_info(&self) -> OpInfo<'_> {
        OpInfo {
            api_name: &self.api_name,
            api_args: &self.api_args,
            app_file: &self.app_site.file,
            app_func: &self.app_site.func,
            app_line: self.app_site.line,
            app_version: &self.app_version,
            counter: self.counter,
            timestamp: self.timestamp,
        }
    }
}
