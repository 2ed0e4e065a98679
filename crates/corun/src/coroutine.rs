//! # Volatile Executions
//!
//! An execution whose suspended state lives in memory: the function runs on
//! its own tokio task and parks on a [`ChannelSuspend`] whenever it polls.
//! The driver steps it with [`Execution::next`] and [`Execution::resume`].

use std::any::Any as PanicPayload;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use callproto::CallResult;
use callproto::Exit;
use callproto::RemoteError;
use callproto::Request;
use callproto::Response;
use callproto::Status;

use crate::instance::Resident;
use crate::suspend::ChannelSuspend;
use crate::suspend::Resumer;
use crate::suspend::Result;
use crate::suspend::Suspend;

pub struct Execution {
    resumer: Mutex<Resumer>,
    task: JoinHandle<()>,
}

impl Execution {
    /// Starts `body` on a new task.
    ///
    /// `body` receives the suspension handle it must poll through. Its
    /// output becomes the final response; a panic becomes an `Exit` with
    /// `PermanentError` status.
    pub fn spawn<F>(body: F) -> Self
    where
        F: FnOnce(Arc<dyn Suspend>) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let (suspend, resumer) = ChannelSuspend::channel();
        let suspend = Arc::new(suspend);

        let task = tokio::spawn(async move {
            let handle: Arc<dyn Suspend> = suspend.clone();
            let response = match AssertUnwindSafe(body(handle)).catch_unwind().await {
                Ok(response) => response,
                Err(payload) => panicked(payload),
            };
            if suspend.exit(response).await.is_err() {
                tracing::debug!("execution finished after its driver went away");
            }
        });

        Self { resumer: Mutex::new(resumer), task }
    }

    /// Waits for the next response: a `Poll` while suspended, an `Exit` at
    /// the end.
    pub async fn next(&self) -> Result<Response> {
        self.resumer.lock().await.next().await
    }

    /// Delivers `request` and waits for the next response.
    pub async fn resume(&self, request: Request) -> Result<Response> {
        self.resumer.lock().await.resume(request).await
    }

    /// Aborts the task.
    pub fn terminate(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Resident for Execution {
    fn terminate(&self) {
        Execution::terminate(self);
    }
}

fn panicked(payload: Box<dyn PanicPayload + Send>) -> Response {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "function panicked".to_string());
    tracing::warn!(%message, "function panicked");

    let error = RemoteError::new("panic", message);
    Response::exit(Status::PermanentError, Exit::new(CallResult::error(error)))
}
