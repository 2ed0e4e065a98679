//! # Runtime Builder
//!
//! Fluent configuration for a [`Runtime`].

use std::sync::Arc;
use std::time::Duration;

use crate::correlator::DEFAULT_MAX_WAIT;
use crate::ids::IdGenerator;
use crate::runtime::Runtime;

pub struct RuntimeBuilder {
    endpoint: String,
    max_wait: Duration,
    seed: Option<u64>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self { endpoint: String::new(), max_wait: DEFAULT_MAX_WAIT, seed: None }
    }

    /// The endpoint outbound calls are addressed to.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The longest a single poll may wait before the execution is woken.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Fixes the first correlation and instance id. Random when unset.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Runtime {
        let ids = match self.seed {
            Some(seed) => IdGenerator::starting_at(seed),
            None => IdGenerator::new(),
        };
        Runtime::from_parts(self.endpoint, self.max_wait, Arc::new(ids))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
