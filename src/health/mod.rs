//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health/ready (handlers.rs)
//!     → orchestrator.rs (one task per probe, overall deadline, join all)
//!     → task.rs (per-probe deadline, late Ok → Error)
//!     → ReadinessReport (registration order, aggregated status)
//!
//! GET /health/live
//!     → {"status":"ok"}
//! ```
//!
//! # Design Decisions
//! - Probes are caller-supplied trait objects; the subsystem never builds them
//! - Slow probes are joined, never abandoned
//! - Probe failures and panics become Error results, never errors

pub mod handlers;
pub mod orchestrator;
pub mod probe;
pub mod task;

pub use handlers::{router, HealthState, ReadinessReport};
pub use orchestrator::{overall_status, ReadinessOrchestrator};
pub use probe::{CheckResult, Probe, Status};
pub use task::run_probe;
