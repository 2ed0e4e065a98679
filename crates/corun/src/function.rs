//! # Functions
//!
//! The unit the orchestrator invokes by name. [`Function`] is the untyped
//! boundary (`Any` in, `Response` out); [`Func`] adapts a typed async
//! closure to it.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::BoxFuture;

use callproto::Any;
use callproto::Boxable;
use callproto::Call;
use callproto::CallResult;
use callproto::Exit;
use callproto::RemoteError;
use callproto::Response;
use callproto::Status;
use callproto::Unboxable;
use callproto::classify;

use crate::context::Context;
use crate::correlator;
use crate::correlator::AwaitError;
use crate::runtime;
use crate::suspend;

/// A named function the runtime can dispatch to.
///
/// This trait is designed to be object-safe (`Arc<dyn Function>`).
#[async_trait::async_trait]
pub trait Function: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Runs to completion, suspending through `ctx` as often as needed.
    ///
    /// Never fails: errors are reported as an `Exit` response.
    async fn run(&self, ctx: Context, input: Any) -> Response;
}

type Handler<I, O> = dyn Fn(Context, I) -> BoxFuture<'static, anyhow::Result<O>> + Send + Sync;

/// A typed function: unboxes its input into `I` and boxes its output from
/// `O`.
///
/// An input that does not unbox exits with `InvalidArgument`. A handler
/// error exits with the status the error classifies as; see
/// [`handler_error`] for how its kind is named.
pub struct Func<I, O> {
    name: String,
    handler: Arc<Handler<I, O>>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> Clone for Func<I, O> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), handler: self.handler.clone(), _marker: PhantomData }
    }
}

impl<I, O> Func<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    {
        let handler: Arc<Handler<I, O>> =
            Arc::new(move |ctx: Context, input: I| -> BoxFuture<'static, anyhow::Result<O>> {
                Box::pin(f(ctx, input))
            });
        Self { name: name.into(), handler, _marker: PhantomData }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<I, O> Func<I, O>
where
    I: Boxable,
    O: Unboxable,
{
    /// A call of this function at `endpoint`.
    pub fn build_call(&self, endpoint: &str, input: &I) -> callproto::Result<Call> {
        correlator::build_call(endpoint, &self.name, input)
    }

    /// Calls this function from inside another one and waits for its output.
    pub async fn await_call(&self, ctx: &Context, input: &I) -> anyhow::Result<O> {
        let call = self.build_call(ctx.endpoint(), input)?;
        let mut results = ctx.await_all(vec![call]).await?;
        let result = results
            .pop()
            .flatten()
            .ok_or_else(|| anyhow!("no result for call of {}", self.name))?;
        if let Some(error) = result.error_value() {
            return Err(error.clone().into());
        }
        Ok(result.output_value().cloned().unwrap_or_default().unbox::<O>()?)
    }

    /// Calls this function once per input, concurrently, and waits for every
    /// output.
    pub async fn gather(&self, ctx: &Context, inputs: &[I]) -> anyhow::Result<Vec<O>> {
        let calls = inputs
            .iter()
            .map(|input| self.build_call(ctx.endpoint(), input))
            .collect::<callproto::Result<Vec<_>>>()?;
        Ok(ctx.gather(calls).await?)
    }
}

#[async_trait::async_trait]
impl<I, O> Function for Func<I, O>
where
    I: Unboxable + Send + 'static,
    O: Boxable + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: Context, input: Any) -> Response {
        let input = match input.unbox::<I>() {
            Ok(input) => input,
            Err(e) => return Response::error(&e).with_status(Status::InvalidArgument),
        };

        match (self.handler)(ctx, input).await {
            Ok(output) => match Any::new(&output) {
                Ok(boxed) => Response::output(boxed),
                Err(e) => Response::error(&e),
            },
            Err(e) => Response::exit(classify(&*e), Exit::new(CallResult::error(handler_error(&e)))),
        }
    }
}

/// Builds the error a failed handler exits with.
///
/// A `RemoteError` relayed from a callee is kept as-is. Otherwise the kind
/// names the first error in the chain whose type this crate or `callproto`
/// knows, and the message carries the whole chain. A chain made only of
/// foreign types is named `"error"`.
pub fn handler_error(e: &anyhow::Error) -> RemoteError {
    if let Some(remote) = e.downcast_ref::<RemoteError>() {
        return remote.clone();
    }
    let kind = e.chain().find_map(known_kind).unwrap_or_else(|| "error".to_string());
    RemoteError::new(kind, format!("{:#}", e))
}

fn known_kind(err: &(dyn std::error::Error + 'static)) -> Option<String> {
    let kind = if err.is::<AwaitError>() {
        "corun::AwaitError"
    } else if err.is::<suspend::Error>() {
        "corun::suspend::Error"
    } else if err.is::<runtime::Error>() {
        "corun::runtime::Error"
    } else {
        let remote = RemoteError::from_dyn(err);
        return Some(remote.kind().to_string()).filter(|k| !k.is_empty() && k != "error");
    };
    Some(kind.to_string())
}
