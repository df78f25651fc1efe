//! Wait-budget sentinels and handle-space constants for event sets.
//!
//! All invariants verified at compile time via `const` assertions.

/// Poll once, never block. Passing this to [`EventSet::wait`](crate::EventSet::wait)
/// performs a single non-blocking status check of every active operation.
pub const WAIT_NONE: u64 = 0;

/// Block until every active operation completes or one fails.
/// The budget is never exhausted.
pub const WAIT_FOREVER: u64 = u64::MAX;

/// Registry handle reserved as "no event set". Never assigned.
pub const HANDLE_INVALID: u64 = 0;

/// First handle a registry hands out.
pub const HANDLE_FIRST: u64 = 1;

// Sentinel integrity
const _: () = assert!(WAIT_NONE < WAIT_FOREVER);
const _: () = assert!(HANDLE_INVALID < HANDLE_FIRST);
