//! # Call Correlation
//!
//! Fans a set of calls out through a single suspension and maps the results
//! that come back onto the calls that asked for them.
//!
//! ## Invariants
//! - **Correlation by id**: results are matched strictly by correlation id,
//!   never by arrival order or position. Ids come from a shared
//!   [`IdGenerator`], so they never repeat across operations.
//! - **Dispatch once**: calls ride on the first `Poll` of an operation only.
//!   Later polls for the same operation carry none.
//! - **At-least-once tolerance**: a result whose id is not pending belongs
//!   to some other, finished operation. It is dropped and logged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use callproto::Any;
use callproto::Call;
use callproto::CallOption;
use callproto::CallResult;
use callproto::Joined;
use callproto::Poll;
use callproto::RemoteError;
use callproto::RequestDirective;
use callproto::Response;
use callproto::Unboxable;

use crate::ids::IdGenerator;
use crate::suspend;
use crate::suspend::Suspend;

/// Upper bound on a single wait, so the orchestrator re-evaluates
/// periodically even when no result arrives.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(5 * 60);

/// Results in call order; `None` for calls that have not reported.
pub type Slots = Vec<Option<CallResult>>;

/// When an await operation is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every call succeeds, or the first failure is seen.
    All,
    /// The first success is seen, or every call has failed.
    Any,
}

#[derive(Debug)]
pub enum AwaitError {
    /// One or more calls failed. `cause` holds every failure seen: the
    /// failing call's own error when there is one, a [`Joined`] otherwise.
    Failed {
        results: Slots,
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The orchestrator dispatched none of the calls; retry the whole
    /// operation.
    Dispatch { results: Slots, error: RemoteError },
    /// The suspension itself failed.
    Suspend(suspend::Error),
    /// The execution was resumed with fresh input instead of poll results.
    UnexpectedRequest,
    /// A successful output could not be unboxed into the requested type.
    Decode { index: usize, error: callproto::Error },
}

impl AwaitError {
    /// The results gathered before the operation stopped, if any.
    pub fn results(&self) -> Option<&[Option<CallResult>]> {
        match self {
            Self::Failed { results, .. } | Self::Dispatch { results, .. } => Some(results),
            _ => None,
        }
    }
}

impl std::fmt::Display for AwaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { cause, .. } => write!(f, "call failed: {}", cause),
            Self::Dispatch { error, .. } => write!(f, "calls were not dispatched: {}", error),
            Self::Suspend(e) => write!(f, "suspend error: {}", e),
            Self::UnexpectedRequest => write!(f, "resumed with input instead of poll results"),
            Self::Decode { index, error } => write!(f, "cannot decode result {}: {}", index, error),
        }
    }
}

impl std::error::Error for AwaitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed { cause, .. } => Some(cause.as_ref()),
            Self::Dispatch { error, .. } => Some(error),
            Self::Suspend(e) => Some(e),
            Self::UnexpectedRequest => None,
            Self::Decode { error, .. } => Some(error),
        }
    }
}

impl From<suspend::Error> for AwaitError {
    fn from(e: suspend::Error) -> Self {
        Self::Suspend(e)
    }
}

pub type Result<T> = std::result::Result<T, AwaitError>;

/// Awaits calls on behalf of one execution.
pub struct Correlator {
    ids: Arc<IdGenerator>,
    suspend: Arc<dyn Suspend>,
    max_wait: Duration,
}

impl Correlator {
    pub fn new(ids: Arc<IdGenerator>, suspend: Arc<dyn Suspend>) -> Self {
        Self { ids, suspend, max_wait: DEFAULT_MAX_WAIT }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Waits for every call to succeed, stopping at the first failure.
    pub async fn await_all(&self, calls: Vec<Call>) -> Result<Slots> {
        self.await_calls(Strategy::All, calls).await
    }

    /// Waits for the first success, or for every call to fail.
    pub async fn await_any(&self, calls: Vec<Call>) -> Result<Slots> {
        self.await_calls(Strategy::Any, calls).await
    }

    /// Awaits every call and unboxes each output into `T`.
    pub async fn gather<T: Unboxable>(&self, calls: Vec<Call>) -> Result<Vec<T>> {
        let results = self.await_all(calls).await?;
        results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                let output = slot.and_then(|r| r.output_value().cloned()).unwrap_or_default();
                output.unbox::<T>().map_err(|error| AwaitError::Decode { index, error })
            })
            .collect()
    }

    /// Dispatches `calls` and suspends until `strategy` is satisfied.
    pub async fn await_calls(&self, strategy: Strategy, calls: Vec<Call>) -> Result<Slots> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let mut pending = HashMap::with_capacity(calls.len());
        let mut outgoing: Vec<Call> = calls
            .iter()
            .enumerate()
            .map(|(index, call)| {
                let id = self.ids.next();
                pending.insert(id, index);
                call.with([CallOption::CorrelationId(id)])
            })
            .collect();

        // A single suspended execution has nothing to do with a partial
        // wake-up, so ask for everything at once.
        let count = u32::try_from(calls.len()).unwrap_or(u32::MAX);
        let poll = Poll::new(count, count, self.max_wait);
        let mut results: Slots = vec![None; calls.len()];

        while !pending.is_empty() {
            let directive = poll.with_calls(std::mem::take(&mut outgoing));
            tracing::trace!(calls = directive.calls().len(), pending = pending.len(), "suspending");

            let request = self.suspend.suspend(Response::poll(directive)).await?;
            let RequestDirective::PollResult(poll_result) = request.into_directive() else {
                return Err(AwaitError::UnexpectedRequest);
            };
            if let Some(error) = poll_result.error() {
                return Err(AwaitError::Dispatch { error: error.clone(), results });
            }

            let mut succeeded = false;
            let mut failed = false;
            for result in poll_result.into_results() {
                let id = result.correlation_id();
                let Some(index) = pending.remove(&id) else {
                    tracing::debug!(correlation_id = id, "discarding result for unknown call");
                    continue;
                };
                if result.is_failure() {
                    failed = true;
                } else {
                    succeeded = true;
                }
                results[index] = Some(result);
            }

            match strategy {
                Strategy::All if failed => return Err(failure(results)),
                Strategy::Any if succeeded => return Ok(results),
                _ => {}
            }
        }

        match strategy {
            Strategy::All => Ok(results),
            // Reaching here under Any means no call succeeded.
            Strategy::Any => Err(failure(results)),
        }
    }
}

fn failure(results: Slots) -> AwaitError {
    let causes: Vec<RemoteError> = results
        .iter()
        .flatten()
        .filter_map(|r| r.error_value().cloned())
        .collect();
    AwaitError::Failed { cause: Joined::join(causes), results }
}

/// Boxes `input` into a call of `function` at `endpoint`.
pub fn build_call<T: callproto::Boxable + ?Sized>(
    endpoint: &str,
    function: &str,
    input: &T,
) -> callproto::Result<Call> {
    Ok(Call::new(endpoint, function, Any::new(input)?))
}
