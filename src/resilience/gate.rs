//! Single-writer arbitration for one request's response.
//!
//! Every producer of a response (the wrapped handler and the timeout guard)
//! commits through the same [`ResponseWriter`], which consults one shared
//! [`ResponseGate`]. The first commit wins; later commits are dropped.

use std::sync::{Arc, Mutex, PoisonError};

use axum::response::Response;
use tokio::sync::oneshot;

/// Tracks whether a response has been started for a request.
#[derive(Debug, Default)]
pub struct ResponseGate {
    started: Mutex<bool>,
}

impl ResponseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition unstarted → started. Returns `true` only for the caller
    /// that performed the transition.
    pub fn try_start(&self) -> bool {
        let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
        if *started {
            return false;
        }
        *started = true;
        true
    }

    pub fn is_started(&self) -> bool {
        *self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of a request's committed response.
pub type CommittedResponse = oneshot::Receiver<Response>;

/// Gate-aware handle used to commit the response for one request.
///
/// The guard inserts a clone into request extensions, so handlers that want
/// to commit early (before returning) can extract it.
#[derive(Clone)]
pub struct ResponseWriter {
    gate: Arc<ResponseGate>,
    sink: Arc<Mutex<Option<oneshot::Sender<Response>>>>,
}

impl ResponseWriter {
    /// Create a writer together with the receiver that observes its commit.
    pub fn channel() -> (Self, CommittedResponse) {
        let (tx, rx) = oneshot::channel();
        let writer = Self {
            gate: Arc::new(ResponseGate::new()),
            sink: Arc::new(Mutex::new(Some(tx))),
        };
        (writer, rx)
    }

    /// Commit `response` if no response has been started yet.
    ///
    /// Returns `false` and drops the response when another writer won.
    pub fn write(&self, response: Response) -> bool {
        if !self.gate.try_start() {
            tracing::trace!(status = %response.status(), "Response already started, discarding write");
            return false;
        }

        let sender = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // The receiver may already be gone if the client disconnected.
        if let Some(sender) = sender {
            let _ = sender.send(response);
        }
        true
    }

    /// Whether any writer has started the response.
    pub fn is_started(&self) -> bool {
        self.gate.is_started()
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("started", &self.is_started())
            .finish()
    }
}
