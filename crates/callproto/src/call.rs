//! # Calls and Call Results
//!
//! Outbound invocations and the results the remote side reports for them.
//!
//! ## Invariants
//! - **Copy-on-write**: `with` clones the record and applies options to the
//!   clone; a shared record is never mutated in place.
//! - **Partial results**: a `CallResult` may hold an output and an error at
//!   the same time. Only the error decides failure.

use std::time::Duration;

use crate::any::Any;

/// One outbound invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Call {
    endpoint: String,
    function: String,
    input: Any,
    correlation_id: u64,
    expiration: Duration,
    version: String,
}

/// An amendment applied by [`Call::with`].
#[derive(Debug, Clone, PartialEq)]
pub enum CallOption {
    CorrelationId(u64),
    /// Zero means the remote side applies its own default.
    Expiration(Duration),
    Version(String),
    Endpoint(String),
}

impl Call {
    pub fn new(endpoint: impl Into<String>, function: impl Into<String>, input: Any) -> Self {
        Self {
            endpoint: endpoint.into(),
            function: function.into(),
            input,
            ..Self::default()
        }
    }

    /// Returns a copy with `options` applied in order.
    pub fn with(&self, options: impl IntoIterator<Item = CallOption>) -> Self {
        let mut call = self.clone();
        for option in options {
            match option {
                CallOption::CorrelationId(id) => call.correlation_id = id,
                CallOption::Expiration(d) => call.expiration = d,
                CallOption::Version(v) => call.version = v,
                CallOption::Endpoint(e) => call.endpoint = e,
            }
        }
        call
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn input(&self) -> &Any {
        &self.input
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// The outcome of one call, as reported by the remote side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResult {
    correlation_id: u64,
    output: Option<Any>,
    error: Option<RemoteError>,
    dispatch_id: String,
}

/// An amendment applied by [`CallResult::with`].
#[derive(Debug, Clone, PartialEq)]
pub enum CallResultOption {
    Output(Any),
    Error(RemoteError),
    DispatchId(String),
    CorrelationId(u64),
}

impl CallResult {
    /// A successful result.
    pub fn output(output: Any) -> Self {
        Self { output: Some(output), ..Self::default() }
    }

    /// A failed result.
    pub fn error(error: RemoteError) -> Self {
        Self { error: Some(error), ..Self::default() }
    }

    /// Returns a copy with `options` applied in order.
    pub fn with(&self, options: impl IntoIterator<Item = CallResultOption>) -> Self {
        let mut result = self.clone();
        for option in options {
            match option {
                CallResultOption::Output(o) => result.output = Some(o),
                CallResultOption::Error(e) => result.error = Some(e),
                CallResultOption::DispatchId(d) => result.dispatch_id = d,
                CallResultOption::CorrelationId(id) => result.correlation_id = id,
            }
        }
        result
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    pub fn output_value(&self) -> Option<&Any> {
        self.output.as_ref()
    }

    pub fn error_value(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }

    pub fn dispatch_id(&self) -> &str {
        &self.dispatch_id
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// A failure that crossed a process boundary.
///
/// Carries enough to reconstruct the error on the other side: a type name,
/// a message and optional opaque serialized value and traceback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteError {
    kind: String,
    message: String,
    value: Option<Vec<u8>>,
    traceback: Option<Vec<u8>>,
}

impl RemoteError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), value: None, traceback: None }
    }

    /// Captures a typed error, named after its Rust type.
    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> Self {
        let erased: &(dyn std::error::Error + 'static) = err;
        if let Some(remote) = erased.downcast_ref::<RemoteError>() {
            return remote.clone();
        }
        Self::new(std::any::type_name::<E>(), err.to_string())
    }

    /// Captures a type-erased error.
    ///
    /// A `RemoteError` is returned as-is so that failures relayed through
    /// several hops keep their original kind.
    pub fn from_dyn(err: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(remote) = err.downcast_ref::<RemoteError>() {
            return remote.clone();
        }
        Self::new(error_kind(err), err.to_string())
    }

    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_traceback(mut self, traceback: Vec<u8>) -> Self {
        self.traceback = Some(traceback);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn traceback(&self) -> Option<&[u8]> {
        self.traceback.as_deref()
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.kind.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for RemoteError {}

/// Names the concrete type behind `err` for the types this crate knows.
fn error_kind(err: &(dyn std::error::Error + 'static)) -> &'static str {
    if err.is::<crate::error::Error>() {
        "callproto::Error"
    } else if err.is::<crate::status::StatusError>() {
        "callproto::StatusError"
    } else if err.is::<crate::status::Condition>() {
        "callproto::Condition"
    } else if err.is::<crate::status::Joined>() {
        "callproto::Joined"
    } else if err.is::<std::io::Error>() {
        "std::io::Error"
    } else if err.is::<serde_json::Error>() {
        "serde_json::Error"
    } else {
        "error"
    }
}
