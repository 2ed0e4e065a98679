//! # Suspension Directives
//!
//! A `Poll` asks the orchestrator to park the execution until enough call
//! results arrive; a `PollResult` is what it hands back on resume.

use std::time::Duration;

use crate::any::Any;
use crate::call::Call;
use crate::call::CallResult;
use crate::call::RemoteError;

/// Block until `min_results` results arrive, deliver at most `max_results`,
/// and wake up after `max_wait` regardless.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Poll {
    min_results: u32,
    max_results: u32,
    max_wait: Duration,
    calls: Vec<Call>,
    coroutine_state: Any,
}

impl Poll {
    pub fn new(min_results: u32, max_results: u32, max_wait: Duration) -> Self {
        Self { min_results, max_results, max_wait, ..Self::default() }
    }

    /// Returns a copy that dispatches `calls`.
    pub fn with_calls(&self, calls: Vec<Call>) -> Self {
        Self { calls, ..self.clone() }
    }

    /// Returns a copy that preserves `state` until resume.
    pub fn with_coroutine_state(&self, state: Any) -> Self {
        Self { coroutine_state: state, ..self.clone() }
    }

    pub fn min_results(&self) -> u32 {
        self.min_results
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn coroutine_state(&self) -> &Any {
        &self.coroutine_state
    }
}

/// The content delivered when a suspended execution resumes.
///
/// A poll-level `error` means no call was dispatched at all; the whole
/// operation must be retried, not individual calls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollResult {
    results: Vec<CallResult>,
    coroutine_state: Any,
    error: Option<RemoteError>,
}

impl PollResult {
    pub fn new(coroutine_state: Any) -> Self {
        Self { coroutine_state, ..Self::default() }
    }

    pub fn with_results(mut self, results: Vec<CallResult>) -> Self {
        self.results = results;
        self
    }

    pub fn with_error(mut self, error: RemoteError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn results(&self) -> &[CallResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<CallResult> {
        self.results
    }

    pub fn coroutine_state(&self) -> &Any {
        &self.coroutine_state
    }

    pub fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }
}
