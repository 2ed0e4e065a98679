//! Scripted suspension for testing.
//!
//! Used by the test suite only; not part of the public API.

use std::collections::VecDeque;
use std::sync::Mutex;

use callproto::Request;
use callproto::Response;

use crate::suspend;
use crate::suspend::Suspend;

/// Answers each suspension with the next scripted request and records what
/// was suspended on. Detaches once the script runs out.
pub struct ScriptedSuspend {
    script: Mutex<VecDeque<Request>>,
    seen: Mutex<Vec<Response>>,
}

impl ScriptedSuspend {
    pub fn new(script: impl IntoIterator<Item = Request>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every response suspended on so far, in order.
    pub fn seen(&self) -> Vec<Response> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Suspend for ScriptedSuspend {
    async fn suspend(&self, response: Response) -> suspend::Result<Request> {
        self.seen.lock().unwrap().push(response);
        self.script.lock().unwrap().pop_front().ok_or(suspend::Error::Detached)
    }
}
