//! # corun
//!
//! Client-side runtime for remotely orchestrated functions.
//!
//! ## Architecture
//!
//! The orchestrator invokes a function by sending a `Request`; the function
//! answers with a `Response` that either exits or polls. A poll suspends the
//! execution until the orchestrator resumes it with the results of the calls
//! the poll dispatched.
//!
//! - [`correlator`] fans calls out through one suspension and maps results
//!   back by correlation id.
//! - [`coroutine`] runs an execution on its own task, parked on a channel
//!   while suspended.
//! - [`instance`] keeps suspended executions resident between requests.
//! - [`runtime`] dispatches requests to [`function`]s by name.

pub mod builder;
pub mod context;
pub mod coroutine;
pub mod correlator;
pub mod function;
pub mod ids;
pub mod instance;
pub mod runtime;
pub mod suspend;

#[cfg(test)]
mod mock_suspend;

pub use builder::RuntimeBuilder;
pub use context::Context;
pub use correlator::AwaitError;
pub use correlator::Correlator;
pub use correlator::Strategy;
pub use function::Func;
pub use function::Function;
pub use ids::IdGenerator;
pub use runtime::Runtime;
pub use suspend::Suspend;
