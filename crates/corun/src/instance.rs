//! # Volatile Instance Table
//!
//! Keeps suspended executions resident when they cannot be serialized.
//!
//! ## Invariants
//! - **One lock**: every operation takes the table mutex once and releases
//!   it before returning. Callers get an `Arc` and resume it unlocked, so
//!   the lock is never held across a suspension point.
//! - **Random ids**: ids come from an [`IdGenerator`] seeded at a random
//!   point, like correlation ids.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::ids::IdGenerator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    NotFound(u64),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "instance {} not found", id),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Something that can live in the table.
pub trait Resident: Send + Sync {
    /// Forcibly stops the resident. Called by [`InstanceTable::close`].
    fn terminate(&self);
}

pub struct InstanceTable<T: Resident> {
    ids: Arc<IdGenerator>,
    entries: Mutex<HashMap<u64, Arc<T>>>,
}

impl<T: Resident> InstanceTable<T> {
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self { ids, entries: Mutex::new(HashMap::new()) }
    }

    /// A poisoned table is still consistent: no operation panics halfway
    /// through a mutation.
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `resident` and returns its id.
    pub fn register(&self, resident: Arc<T>) -> u64 {
        let mut entries = self.lock();
        let mut id = self.ids.next();
        while entries.contains_key(&id) {
            id = self.ids.next();
        }
        entries.insert(id, resident);
        tracing::debug!(instance = id, resident = entries.len(), "registered instance");
        id
    }

    pub fn find(&self, id: u64) -> Result<Arc<T>> {
        self.lock().get(&id).cloned().ok_or(Error::NotFound(id))
    }

    /// Removes the entry, returning it if it was present.
    pub fn delete(&self, id: u64) -> Option<Arc<T>> {
        let removed = self.lock().remove(&id);
        if removed.is_some() {
            tracing::debug!(instance = id, "removed instance");
        }
        removed
    }

    /// Terminates and discards every resident.
    pub fn close(&self) {
        let drained: Vec<(u64, Arc<T>)> = self.lock().drain().collect();
        for (id, resident) in drained {
            tracing::debug!(instance = id, "terminating instance");
            resident.terminate();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
