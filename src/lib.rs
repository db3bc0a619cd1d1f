//! Request lifecycle guards and readiness probes for axum services.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ServiceConfig;
pub use health::{CheckResult, Probe, ReadinessOrchestrator, Status};
pub use http::{HttpServer, ProblemDetail};
pub use lifecycle::Shutdown;
pub use resilience::{Deadline, ResponseWriter, TimeoutLayer};
