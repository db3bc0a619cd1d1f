//! Single probe execution.

use std::time::{Duration, Instant};

use crate::health::probe::{CheckResult, Probe, Status};
use crate::resilience::deadline::Deadline;

/// Run one probe under `parent`, optionally narrowed by `per_probe_timeout`.
///
/// A probe that reports Ok after its deadline has passed is downgraded to
/// Error, with the deadline reason appended to its message.
pub async fn run_probe(probe: &dyn Probe, parent: &Deadline, per_probe_timeout: Option<Duration>) -> CheckResult {
    let start = Instant::now();

    let deadline = match per_probe_timeout {
        Some(timeout) => parent.child(Some(timeout)),
        None => parent.clone(),
    };

    let (mut status, mut message) = probe.check(&deadline).await;

    if let Some(reason) = deadline.err() {
        if status == Status::Ok {
            status = Status::Error;
            message = if message.is_empty() {
                reason.to_string()
            } else {
                format!("{message}; {reason}")
            };
        }
    }

    CheckResult {
        name: probe.name().to_string(),
        status,
        message,
        duration: start.elapsed(),
    }
}
