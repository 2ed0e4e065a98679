//! Per-execution handle passed to functions.

use std::sync::Arc;

use callproto::Boxable;
use callproto::Call;
use callproto::Request;
use callproto::Unboxable;

use crate::correlator;
use crate::correlator::Correlator;
use crate::correlator::Slots;
use crate::correlator::Strategy;

/// What a running function knows about its invocation, and how it calls
/// other functions.
///
/// Cheap to clone; clones share the correlator.
#[derive(Clone)]
pub struct Context {
    function: String,
    dispatch_id: String,
    parent_dispatch_id: String,
    root_dispatch_id: String,
    endpoint: String,
    correlator: Arc<Correlator>,
}

impl Context {
    pub fn new(request: &Request, endpoint: impl Into<String>, correlator: Correlator) -> Self {
        Self {
            function: request.function().to_string(),
            dispatch_id: request.dispatch_id().to_string(),
            parent_dispatch_id: request.parent_dispatch_id().to_string(),
            root_dispatch_id: request.root_dispatch_id().to_string(),
            endpoint: endpoint.into(),
            correlator: Arc::new(correlator),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn dispatch_id(&self) -> &str {
        &self.dispatch_id
    }

    pub fn parent_dispatch_id(&self) -> &str {
        &self.parent_dispatch_id
    }

    pub fn root_dispatch_id(&self) -> &str {
        &self.root_dispatch_id
    }

    /// The endpoint calls built through this context are addressed to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Boxes `input` into a call of `function` on this context's endpoint.
    pub fn call<T: Boxable + ?Sized>(&self, function: &str, input: &T) -> callproto::Result<Call> {
        correlator::build_call(&self.endpoint, function, input)
    }

    pub async fn await_calls(&self, strategy: Strategy, calls: Vec<Call>) -> correlator::Result<Slots> {
        self.correlator.await_calls(strategy, calls).await
    }

    pub async fn await_all(&self, calls: Vec<Call>) -> correlator::Result<Slots> {
        self.correlator.await_all(calls).await
    }

    pub async fn await_any(&self, calls: Vec<Call>) -> correlator::Result<Slots> {
        self.correlator.await_any(calls).await
    }

    pub async fn gather<T: Unboxable>(&self, calls: Vec<Call>) -> correlator::Result<Vec<T>> {
        self.correlator.gather(calls).await
    }
}
