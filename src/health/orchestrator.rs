//! Concurrent readiness evaluation.
//!
//! Every probe runs on its own task. The orchestrator waits for all of them,
//! including those that outlive the overall deadline: the deadline only drives
//! what probes observe and the Ok→Error downgrade. A probe that ignores its
//! deadline therefore delays the readiness response; probes must be
//! cancellation-aware for the overall timeout to bound latency.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::Instrument;

use crate::config::ReadinessConfig;
use crate::health::probe::{CheckResult, Probe, Status};
use crate::health::task::run_probe;
use crate::observability::metrics;
use crate::resilience::deadline::{duration_from_millis, Deadline};

/// Default bound on a whole readiness evaluation.
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bound on a single probe.
pub const DEFAULT_PER_PROBE_TIMEOUT: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessOrchestrator {
    overall_timeout: Option<Duration>,
    per_probe_timeout: Option<Duration>,
}

impl ReadinessOrchestrator {
    /// `None` or a zero duration disables the corresponding bound.
    pub fn new(overall_timeout: Option<Duration>, per_probe_timeout: Option<Duration>) -> Self {
        Self {
            overall_timeout: overall_timeout.filter(|d| !d.is_zero()),
            per_probe_timeout: per_probe_timeout.filter(|d| !d.is_zero()),
        }
    }

    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self::new(
            duration_from_millis(config.overall_timeout_ms),
            duration_from_millis(config.per_probe_timeout_ms),
        )
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout
    }

    pub fn per_probe_timeout(&self) -> Option<Duration> {
        self.per_probe_timeout
    }

    /// Run every probe concurrently and return results in registration order.
    pub async fn run_all(&self, probes: &[Arc<dyn Probe>], parent: &Deadline) -> Vec<CheckResult> {
        let deadline = parent.child(self.overall_timeout);
        let per_probe_timeout = self.per_probe_timeout;

        let handles: Vec<_> = probes
            .iter()
            .map(|probe| {
                let probe = Arc::clone(probe);
                let deadline = deadline.clone();
                let span = tracing::debug_span!("probe", name = %probe.name());
                let started = Instant::now();

                let handle = tokio::spawn(
                    async move { run_probe(probe.as_ref(), &deadline, per_probe_timeout).await }.instrument(span),
                );
                (handle, started)
            })
            .collect();

        // join_all yields in input order, which is registration order.
        let joined = join_all(handles.into_iter().map(|(handle, started)| async move { (handle.await, started) })).await;

        let results: Vec<CheckResult> = joined
            .into_iter()
            .zip(probes)
            .map(|((joined, started), probe)| match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(probe = %probe.name(), error = %e, "Probe task failed");
                    CheckResult {
                        name: probe.name().to_string(),
                        status: Status::Error,
                        message: "probe panicked".to_string(),
                        duration: started.elapsed(),
                    }
                }
            })
            .collect();

        for result in &results {
            metrics::record_probe(result);
            if !result.status.is_ok() {
                tracing::warn!(probe = %result.name, message = %result.message, duration = ?result.duration, "Readiness probe failed");
            }
        }

        results
    }
}

impl Default for ReadinessOrchestrator {
    fn default() -> Self {
        Self::new(Some(DEFAULT_OVERALL_TIMEOUT), Some(DEFAULT_PER_PROBE_TIMEOUT))
    }
}

/// `Error` if any result is not Ok; `Ok` otherwise, including for no results.
pub fn overall_status(results: &[CheckResult]) -> Status {
    if results.iter().all(|r| r.status.is_ok()) {
        Status::Ok
    } else {
        Status::Error
    }
}
