//! Integer-handle registry for event sets.
//!
//! Wrapper layers that expose event sets across an FFI-style boundary need a
//! public integer identifier instead of an owned value. The registry maps
//! non-zero handles to sets and mediates close: a set that refuses to close
//! (live operations) is re-inserted under its handle, so the caller can
//! drive it to completion and retry.

use std::collections::HashMap;

use crate::constants::{HANDLE_FIRST, HANDLE_INVALID};
use crate::error::Error;
use crate::runtime::OpRuntime;
use crate::set::EventSet;

/// Public identifier for a registered event set. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EsId(u64);

impl EsId {
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps public handles to owned event sets.
pub struct SetRegistry<R: OpRuntime> {
    sets: HashMap<u64, EventSet<R>>,
    next_id: u64,
}

impl<R: OpRuntime> SetRegistry<R> {
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
            next_id: HANDLE_FIRST,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Registers `set` and returns its new handle.
    ///
    /// # Errors
    ///
    /// [`Error::CantRegister`] when the handle space is exhausted.
    pub fn register(&mut self, set: EventSet<R>) -> Result<EsId, Error> {
        if self.next_id == u64::MAX {
            return Err(Error::CantRegister);
        }

        let id = self.next_id;
        assert!(id != HANDLE_INVALID);
        self.next_id += 1;

        let previous = self.sets.insert(id, set);
        assert!(previous.is_none(), "handle {id} already registered");

        tracing::debug!(id, "event set registered");
        Ok(EsId(id))
    }

    /// Resolves a handle to its event set.
    pub fn get(&self, id: EsId) -> Result<&EventSet<R>, Error> {
        self.sets.get(&id.0).ok_or(Error::BadHandle(id.0))
    }

    pub fn get_mut(&mut self, id: EsId) -> Result<&mut EventSet<R>, Error> {
        self.sets.get_mut(&id.0).ok_or(Error::BadHandle(id.0))
    }

    /// Unregisters and closes the set behind `id`, dropping its runtime.
    ///
    /// On [`Error::Busy`] the set is re-inserted under the same handle:
    /// drive [`EventSet::wait`] to completion and retry.
    pub fn close(&mut self, id: EsId) -> Result<(), Error> {
        let set = self.sets.remove(&id.0).ok_or(Error::BadHandle(id.0))?;

        match set.close() {
            Ok(_runtime) => {
                tracing::debug!(id = id.0, "event set closed and unregistered");
                Ok(())
            }
            Err((set, err)) => {
                self.sets.insert(id.0, set);
                Err(err)
            }
        }
    }
}

impl<R: OpRuntime> Default for SetRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}
