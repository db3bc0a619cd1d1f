//! Request timeout enforcement.
//!
//! # Responsibilities
//! - Race the downstream handler against a per-request deadline
//! - Emit a 503 problem response when the deadline wins
//! - Keep exactly one response per request, whatever the timing
//! - Re-raise handler panics on the calling task
//!
//! # Design Decisions
//! - The handler runs on its own Tokio task and is never aborted; it observes
//!   the expired [`Deadline`] through request extensions
//! - Both the handler and the guard commit through one [`ResponseWriter`], so
//!   late handler output is dropped by the shared gate
//! - A zero duration leaves the inner service untouched

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::{BoxFuture, Either};
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tower::{Layer, Service};

use crate::http::problem::ProblemDetail;
use crate::observability::metrics;
use crate::resilience::deadline::{duration_from_millis, Deadline};
use crate::resilience::gate::ResponseWriter;

/// Detail text of the synthetic timeout response.
pub const TIMEOUT_DETAIL: &str = "request timeout exceeded";

/// How the handler task ended.
pub enum HandlerOutcome {
    Ok,
    Faulted(Box<dyn Any + Send + 'static>),
}

/// Which side of the race resolved first.
pub enum TimeoutOutcome {
    Completed(HandlerOutcome),
    DeadlineExceeded,
}

/// Layer applying [`RequestTimeout`] to a service.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    duration: Option<Duration>,
}

impl TimeoutLayer {
    /// A zero duration disables the guard.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: (!duration.is_zero()).then_some(duration),
        }
    }

    /// Build from a signed millisecond setting; values ≤ 0 disable the guard.
    pub fn from_millis(ms: i64) -> Self {
        Self {
            duration: duration_from_millis(ms),
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = RequestTimeout<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTimeout {
            inner,
            duration: self.duration,
        }
    }
}

/// Service enforcing a deadline on every request.
#[derive(Debug, Clone)]
pub struct RequestTimeout<S> {
    inner: S,
    duration: Option<Duration>,
}

impl<S> Service<Request<Body>> for RequestTimeout<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Either<S::Future, BoxFuture<'static, Result<Response, Infallible>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let Some(duration) = self.duration else {
            return Either::Left(self.inner.call(request));
        };

        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        Either::Right(Box::pin(guard(inner, request, duration)))
    }
}

async fn guard<S>(inner: S, mut request: Request<Body>, duration: Duration) -> Result<Response, Infallible>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    let deadline = Deadline::after(duration);
    let (writer, committed) = ResponseWriter::channel();

    request.extensions_mut().insert(deadline.clone());
    request.extensions_mut().insert(writer.clone());

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let done = spawn_handler(inner, request, writer.clone());

    let outcome = race(done, &deadline).await;
    deadline.cancel();

    match outcome {
        TimeoutOutcome::Completed(HandlerOutcome::Faulted(payload)) => std::panic::resume_unwind(payload),
        TimeoutOutcome::Completed(HandlerOutcome::Ok) => {}
        TimeoutOutcome::DeadlineExceeded => {
            metrics::record_request_timeout();
            let synthetic = ProblemDetail::service_unavailable(TIMEOUT_DETAIL).into_response();
            if writer.write(synthetic) {
                tracing::warn!(method = %method, path = %path, timeout = ?duration, "Request timed out");
            } else {
                tracing::debug!(method = %method, path = %path, "Deadline fired after response started; keeping handler response");
            }
        }
    }

    Ok(committed.await.unwrap_or_else(|_| {
        tracing::error!(method = %method, path = %path, "Handler finished without committing a response");
        ProblemDetail::internal_server_error("no response produced").into_response()
    }))
}

/// Run the handler on its own task. Its return value is committed through the
/// shared writer; the outcome is reported over a one-slot channel.
fn spawn_handler<S>(mut inner: S, request: Request<Body>, writer: ResponseWriter) -> oneshot::Receiver<HandlerOutcome>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let result = AssertUnwindSafe(async move {
            match inner.call(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        })
        .catch_unwind()
        .await;

        let outcome = match result {
            Ok(response) => {
                writer.write(response);
                HandlerOutcome::Ok
            }
            Err(payload) => HandlerOutcome::Faulted(payload),
        };

        if let Err(HandlerOutcome::Faulted(_)) = done_tx.send(outcome) {
            tracing::error!("Handler panicked after its request timed out");
        }
    });

    done_rx
}

/// Race handler completion against the deadline. A handler that finishes at
/// the same time as the deadline counts as completed.
async fn race(done: oneshot::Receiver<HandlerOutcome>, deadline: &Deadline) -> TimeoutOutcome {
    tokio::select! {
        biased;
        outcome = done => match outcome {
            Ok(outcome) => TimeoutOutcome::Completed(outcome),
            // The task was torn down with the runtime before reporting.
            Err(_) => TimeoutOutcome::Completed(HandlerOutcome::Faulted(Box::new("handler task dropped"))),
        },
        _ = deadline.done() => TimeoutOutcome::DeadlineExceeded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_disabled_for_zero_and_negative() {
        assert_eq!(TimeoutLayer::new(Duration::ZERO).duration(), None);
        assert_eq!(TimeoutLayer::from_millis(0).duration(), None);
        assert_eq!(TimeoutLayer::from_millis(-1000).duration(), None);
        assert_eq!(
            TimeoutLayer::from_millis(1500).duration(),
            Some(Duration::from_millis(1500))
        );
    }

    #[tokio::test]
    async fn test_race_prefers_completion_when_both_ready() {
        let deadline = Deadline::after(Duration::ZERO);
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(HandlerOutcome::Ok);

        assert!(matches!(
            race(rx, &deadline).await,
            TimeoutOutcome::Completed(HandlerOutcome::Ok)
        ));
    }

    #[tokio::test]
    async fn test_race_reports_deadline() {
        let deadline = Deadline::after(Duration::from_millis(5));
        let (_tx, rx) = oneshot::channel::<HandlerOutcome>();

        assert!(matches!(
            race(rx, &deadline).await,
            TimeoutOutcome::DeadlineExceeded
        ));
    }
}
