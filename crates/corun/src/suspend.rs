//! # Suspension Boundary
//!
//! The single blocking point of an execution: hand a `Response` carrying a
//! `Poll` to whoever drives the execution, and get back the `Request` that
//! resumes it.
//!
//! ## Philosophy
//!
//! - **Opaque**: how the execution is frozen and restored is not visible
//!   here. The correlator only sees `suspend(Response) -> Request`.
//! - **In-process by default**: [`ChannelSuspend`] parks the execution's
//!   task on a channel; a [`Resumer`] on the other end feeds it requests.

use tokio::sync::Mutex;
use tokio::sync::mpsc;

use callproto::Request;
use callproto::Response;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The other end of the suspension went away.
    Detached,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detached => write!(f, "execution detached from its driver"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Parks an execution until it is resumed.
///
/// This trait is designed to be object-safe (`Arc<dyn Suspend>`).
#[async_trait::async_trait]
pub trait Suspend: Send + Sync + 'static {
    /// Hands `response` to the driver and waits for the resuming request.
    async fn suspend(&self, response: Response) -> Result<Request>;
}

/// The execution side of an in-process suspension channel.
pub struct ChannelSuspend {
    tx: mpsc::Sender<Response>,
    rx: Mutex<mpsc::Receiver<Request>>,
}

/// The driver side of an in-process suspension channel.
pub struct Resumer {
    tx: mpsc::Sender<Request>,
    rx: mpsc::Receiver<Response>,
}

impl ChannelSuspend {
    /// Creates a connected pair.
    pub fn channel() -> (Self, Resumer) {
        // One message in flight each way: a suspended execution never sends
        // a second response before it is resumed.
        let (res_tx, res_rx) = mpsc::channel(1);
        let (req_tx, req_rx) = mpsc::channel(1);
        let suspend = Self { tx: res_tx, rx: Mutex::new(req_rx) };
        let resumer = Resumer { tx: req_tx, rx: res_rx };
        (suspend, resumer)
    }

    /// Delivers the final response of the execution.
    pub async fn exit(&self, response: Response) -> Result<()> {
        self.tx.send(response).await.map_err(|_| Error::Detached)
    }
}

#[async_trait::async_trait]
impl Suspend for ChannelSuspend {
    async fn suspend(&self, response: Response) -> Result<Request> {
        self.tx.send(response).await.map_err(|_| Error::Detached)?;
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(Error::Detached)
    }
}

impl Resumer {
    /// Waits for the next response: a `Poll` while suspended, an `Exit` at
    /// the end.
    pub async fn next(&mut self) -> Result<Response> {
        self.rx.recv().await.ok_or(Error::Detached)
    }

    /// Resumes the execution with `request` and waits for its next response.
    pub async fn resume(&mut self, request: Request) -> Result<Response> {
        self.tx.send(request).await.map_err(|_| Error::Detached)?;
        self.next().await
    }
}
