//! Identifier generation for correlation and instance ids.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Hands out identifiers from a random starting point, incrementing per id.
///
/// Results may be redelivered long after the operation that asked for them
/// has finished, so ids must not restart at small numbers: a stale result
/// would land in the slot of an unrelated call. The seed is drawn once, when
/// the generator is built.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// A generator seeded from the thread-local random source.
    pub fn new() -> Self {
        Self::starting_at(rand::random::<u64>())
    }

    /// A generator whose first id is `seed`.
    pub fn starting_at(seed: u64) -> Self {
        Self { next: AtomicU64::new(seed) }
    }

    /// The next id. Wraps around at `u64::MAX`.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
