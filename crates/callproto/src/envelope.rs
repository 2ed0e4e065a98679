//! # Request and Response Envelopes
//!
//! The outer records exchanged with the orchestrator. A `Request` starts an
//! execution with fresh input or resumes one with a `PollResult`; a
//! `Response` either terminates it (`Exit`) or suspends it (`Poll`).

use std::time::SystemTime;

use crate::any::Any;
use crate::call::Call;
use crate::call::CallResult;
use crate::call::RemoteError;
use crate::poll::Poll;
use crate::poll::PollResult;
use crate::status::Status;
use crate::status::classify;

/// What a `Request` asks the function to do.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestDirective {
    /// Start with this input.
    Input(Any),
    /// Resume with these results.
    PollResult(PollResult),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    function: String,
    directive: RequestDirective,
    dispatch_id: String,
    parent_dispatch_id: String,
    root_dispatch_id: String,
    creation_time: Option<SystemTime>,
    expiration_time: Option<SystemTime>,
}

impl Request {
    pub fn new(function: impl Into<String>, directive: RequestDirective) -> Self {
        Self {
            function: function.into(),
            directive,
            dispatch_id: String::new(),
            parent_dispatch_id: String::new(),
            root_dispatch_id: String::new(),
            creation_time: None,
            expiration_time: None,
        }
    }

    /// A request starting `function` with `input`.
    pub fn input(function: impl Into<String>, input: Any) -> Self {
        Self::new(function, RequestDirective::Input(input))
    }

    /// A request resuming `function` with `result`.
    pub fn poll_result(function: impl Into<String>, result: PollResult) -> Self {
        Self::new(function, RequestDirective::PollResult(result))
    }

    pub fn with_dispatch_id(mut self, id: impl Into<String>) -> Self {
        self.dispatch_id = id.into();
        self
    }

    pub fn with_parent_dispatch_id(mut self, id: impl Into<String>) -> Self {
        self.parent_dispatch_id = id.into();
        self
    }

    pub fn with_root_dispatch_id(mut self, id: impl Into<String>) -> Self {
        self.root_dispatch_id = id.into();
        self
    }

    pub fn with_creation_time(mut self, t: SystemTime) -> Self {
        self.creation_time = Some(t);
        self
    }

    pub fn with_expiration_time(mut self, t: SystemTime) -> Self {
        self.expiration_time = Some(t);
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn directive(&self) -> &RequestDirective {
        &self.directive
    }

    pub fn into_directive(self) -> RequestDirective {
        self.directive
    }

    pub fn as_input(&self) -> Option<&Any> {
        match &self.directive {
            RequestDirective::Input(input) => Some(input),
            RequestDirective::PollResult(_) => None,
        }
    }

    pub fn as_poll_result(&self) -> Option<&PollResult> {
        match &self.directive {
            RequestDirective::PollResult(result) => Some(result),
            RequestDirective::Input(_) => None,
        }
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

    pub fn creation_time(&self) -> Option<SystemTime> {
        self.creation_time
    }

    pub fn expiration_time(&self) -> Option<SystemTime> {
        self.expiration_time
    }
}

/// Terminates an execution with a result, optionally chaining into a call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Exit {
    result: CallResult,
    tail_call: Option<Call>,
}

impl Exit {
    pub fn new(result: CallResult) -> Self {
        Self { result, tail_call: None }
    }

    /// Returns a copy that hands off to `call` once this execution ends.
    pub fn with_tail_call(&self, call: Call) -> Self {
        Self { tail_call: Some(call), ..self.clone() }
    }

    pub fn result(&self) -> &CallResult {
        &self.result
    }

    pub fn tail_call(&self) -> Option<&Call> {
        self.tail_call.as_ref()
    }
}

/// What a `Response` asks the orchestrator to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseDirective {
    Exit(Exit),
    Poll(Poll),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: Status,
    directive: ResponseDirective,
}

impl Response {
    pub fn new(status: Status, directive: ResponseDirective) -> Self {
        Self { status, directive }
    }

    /// Terminates successfully with `output`.
    pub fn output(output: Any) -> Self {
        Self::exit(Status::OK, Exit::new(CallResult::output(output)))
    }

    /// Terminates with `err`, classified into a status.
    pub fn error(err: &(dyn std::error::Error + 'static)) -> Self {
        let status = classify(err);
        Self::exit(status, Exit::new(CallResult::error(RemoteError::from_dyn(err))))
    }

    /// Suspends with `poll`.
    pub fn poll(poll: Poll) -> Self {
        Self::new(Status::OK, ResponseDirective::Poll(poll))
    }

    pub fn exit(status: Status, exit: Exit) -> Self {
        Self::new(status, ResponseDirective::Exit(exit))
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn directive(&self) -> &ResponseDirective {
        &self.directive
    }

    pub fn into_directive(self) -> ResponseDirective {
        self.directive
    }

    pub fn as_exit(&self) -> Option<&Exit> {
        match &self.directive {
            ResponseDirective::Exit(exit) => Some(exit),
            ResponseDirective::Poll(_) => None,
        }
    }

    pub fn as_poll(&self) -> Option<&Poll> {
        match &self.directive {
            ResponseDirective::Poll(poll) => Some(poll),
            ResponseDirective::Exit(_) => None,
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.directive, ResponseDirective::Exit(_))
    }
}
