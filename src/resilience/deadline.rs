//! Deadline-bearing cancellation context.
//!
//! # Responsibilities
//! - Carry an optional expiry instant and a cancellation token
//! - Let cooperative work observe expiry (`done`) or poll it (`err`)
//! - Derive children that inherit the parent's expiry and cancellation
//!
//! # Design Decisions
//! - Expiry is evaluated lazily against the clock; no timer task is spawned
//! - The first observed cause sticks (`Exceeded` vs `Canceled`)
//! - Uses Tokio's clock so paused-time tests stay consistent

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reason a deadline is no longer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeadlineError {
    #[error("deadline exceeded")]
    Exceeded,
    #[error("canceled")]
    Canceled,
}

/// Converts a signed millisecond setting into an optional duration.
///
/// Zero and negative values mean "disabled".
pub fn duration_from_millis(ms: i64) -> Option<Duration> {
    u64::try_from(ms)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// A cancellable context with an optional expiry.
///
/// Cloning is cheap and clones share state: cancelling one clone cancels all.
#[derive(Debug, Clone)]
pub struct Deadline {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    token: CancellationToken,
    expires_at: Option<Instant>,
    cause: OnceLock<DeadlineError>,
    parent: Option<Deadline>,
}

impl Deadline {
    /// A context that never expires on its own; it can still be cancelled.
    pub fn unbounded() -> Self {
        Self::from_parts(CancellationToken::new(), None, None)
    }

    /// A context expiring `timeout` from now.
    ///
    /// A timeout too large to represent as an instant yields an unbounded context.
    pub fn after(timeout: Duration) -> Self {
        Self::from_parts(CancellationToken::new(), expiry_after(timeout), None)
    }

    /// Derive a child context.
    ///
    /// With `Some(timeout)` the child expires at the earlier of the parent's
    /// expiry and `now + timeout`; with `None` it keeps the parent's expiry.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.and_then(expiry_after);
        let expires_at = match (self.inner.expires_at, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };

        Self::from_parts(self.inner.token.child_token(), expires_at, Some(self.clone()))
    }

    fn from_parts(token: CancellationToken, expires_at: Option<Instant>, parent: Option<Deadline>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                expires_at,
                cause: OnceLock::new(),
                parent,
            }),
        }
    }

    /// The instant this context expires, if bounded.
    pub fn expires_at(&self) -> Option<Instant> {
        self.inner.expires_at
    }

    /// Time left before expiry. `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Why the context is no longer live, or `None` while it still is.
    pub fn err(&self) -> Option<DeadlineError> {
        if let Some(cause) = self.inner.cause.get() {
            return Some(*cause);
        }

        if let Some(parent_cause) = self.inner.parent.as_ref().and_then(Deadline::err) {
            return Some(*self.inner.cause.get_or_init(|| parent_cause));
        }

        if self.is_past_expiry() {
            return Some(*self.inner.cause.get_or_init(|| DeadlineError::Exceeded));
        }

        if self.inner.token.is_cancelled() {
            return Some(*self.inner.cause.get_or_init(|| DeadlineError::Canceled));
        }

        None
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        let cause = if self.is_past_expiry() {
            DeadlineError::Exceeded
        } else {
            DeadlineError::Canceled
        };
        let _ = self.inner.cause.set(cause);
        self.inner.token.cancel();
    }

    /// Resolve once the context expires or is cancelled.
    pub async fn done(&self) -> DeadlineError {
        match self.inner.expires_at {
            Some(at) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(at) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }

        self.err().unwrap_or(DeadlineError::Canceled)
    }

    fn is_past_expiry(&self) -> bool {
        self.inner
            .expires_at
            .is_some_and(|at| Instant::now() >= at)
    }
}

fn expiry_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}
