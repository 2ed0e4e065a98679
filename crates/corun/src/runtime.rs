//! # Runtime Registry
//!
//! Dispatches requests to registered functions by name and keeps their
//! suspended executions resident between requests.
//!
//! Uses DashMap for the function registry so registration and lookup never
//! contend with running executions.
//!
//! ## Request Flow
//!
//! - **Input**: start a new [`Execution`]. If it suspends, it is registered
//!   in the instance table and the `Poll` carries the boxed instance id as
//!   its coroutine state.
//! - **PollResult**: unbox the instance id from the coroutine state, find
//!   the execution and resume it. An `Exit` removes it from the table.
//!
//! Every failure becomes a `Response`; `run` never panics.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;

use callproto::Any;
use callproto::Request;
use callproto::RequestDirective;
use callproto::Response;
use callproto::ResponseDirective;
use callproto::Status;
use callproto::StatusError;

use crate::builder::RuntimeBuilder;
use crate::context::Context;
use crate::coroutine::Execution;
use crate::correlator::Correlator;
use crate::function::Function;
use crate::ids::IdGenerator;
use crate::instance::InstanceTable;
use crate::suspend;

#[derive(Debug)]
pub enum Error {
    FunctionNotFound(String),
    DuplicateFunction(String),
    InstanceNotFound(u64),
    /// The coroutine state of a resume request does not name an instance.
    InvalidState(callproto::Error),
    /// The execution went away while it was being driven.
    Execution(suspend::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FunctionNotFound(name) => write!(f, "function not found: {}", name),
            Self::DuplicateFunction(name) => write!(f, "function already registered: {}", name),
            Self::InstanceNotFound(id) => write!(f, "instance not found: {}", id),
            Self::InvalidState(e) => write!(f, "invalid coroutine state: {}", e),
            Self::Execution(e) => write!(f, "execution error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidState(e) => Some(e),
            Self::Execution(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct Runtime {
    functions: DashMap<String, Arc<dyn Function>>,
    instances: InstanceTable<Execution>,
    ids: Arc<IdGenerator>,
    endpoint: String,
    max_wait: Duration,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub(crate) fn from_parts(endpoint: String, max_wait: Duration, ids: Arc<IdGenerator>) -> Self {
        Self {
            functions: DashMap::new(),
            instances: InstanceTable::new(ids.clone()),
            ids,
            endpoint,
            max_wait,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Registers `function` under its own name.
    pub fn register(&self, function: impl Function) -> Result<()> {
        let name = function.name().to_string();
        match self.functions.entry(name) {
            Entry::Occupied(entry) => Err(Error::DuplicateFunction(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(function = entry.key().as_str(), "registered function");
                entry.insert(Arc::new(function));
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Function>> {
        self.functions
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))
    }

    /// Number of suspended executions held in memory.
    pub fn resident(&self) -> usize {
        self.instances.len()
    }

    /// Handles one request from the orchestrator.
    pub async fn run(&self, request: Request) -> Response {
        let function = match self.lookup(request.function()) {
            Ok(function) => function,
            Err(e) => {
                tracing::warn!(function = request.function(), "no such function");
                return failure(Status::NotFound, e);
            }
        };

        match request.directive() {
            RequestDirective::Input(input) => {
                let input = input.clone();
                self.start(function, request, input).await
            }
            RequestDirective::PollResult(_) => self.resume(request).await,
        }
    }

    /// Terminates every resident execution.
    pub fn close(&self) {
        self.instances.close();
    }

    async fn start(&self, function: Arc<dyn Function>, request: Request, input: Any) -> Response {
        let ids = self.ids.clone();
        let endpoint = self.endpoint.clone();
        let max_wait = self.max_wait;

        let execution = Execution::spawn(move |suspend| {
            let correlator = Correlator::new(ids, suspend).with_max_wait(max_wait);
            let ctx = Context::new(&request, endpoint, correlator);
            async move { function.run(ctx, input).await }.boxed()
        });

        let response = execution.next().await;
        self.settle(Arc::new(execution), None, response)
    }

    async fn resume(&self, request: Request) -> Response {
        let Some(result) = request.as_poll_result() else {
            return failure(Status::InvalidArgument, Error::InvalidState(
                callproto::Error::ProtocolViolation("expected poll result".into()),
            ));
        };

        let id = match result.coroutine_state().unbox::<u64>() {
            Ok(id) => id,
            Err(e) => return failure(Status::IncompatibleState, Error::InvalidState(e)),
        };
        let execution = match self.instances.find(id) {
            Ok(execution) => execution,
            Err(_) => return failure(Status::IncompatibleState, Error::InstanceNotFound(id)),
        };

        let response = execution.resume(request).await;
        self.settle(execution, Some(id), response)
    }

    /// Turns an execution's next response into what the orchestrator sees,
    /// keeping the instance table in step.
    fn settle(
        &self,
        execution: Arc<Execution>,
        known: Option<u64>,
        response: suspend::Result<Response>,
    ) -> Response {
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                if let Some(id) = known {
                    self.instances.delete(id);
                }
                execution.terminate();
                return failure(Status::TemporaryError, Error::Execution(e));
            }
        };

        let status = response.status();
        match response.into_directive() {
            ResponseDirective::Exit(exit) => {
                if let Some(id) = known {
                    self.instances.delete(id);
                }
                Response::exit(status, exit)
            }
            ResponseDirective::Poll(poll) => {
                let id = known.unwrap_or_else(|| self.instances.register(execution.clone()));
                match Any::new(&id) {
                    Ok(state) => Response::poll(poll.with_coroutine_state(state)).with_status(status),
                    Err(e) => {
                        self.instances.delete(id);
                        execution.terminate();
                        Response::error(&e)
                    }
                }
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        RuntimeBuilder::new().build()
    }
}

fn failure(status: Status, error: Error) -> Response {
    Response::error(&StatusError::new(status, error))
}
