//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request in:
//!     → timeouts.rs (derive deadline.rs context, spawn handler, race)
//!     → gate.rs (first commit wins: handler response or 503 problem)
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative; handlers are never aborted
//! - One response gate per request, shared by every writer
//! - Handler panics are re-raised, not converted into responses here

pub mod deadline;
pub mod gate;
pub mod timeouts;

pub use deadline::{Deadline, DeadlineError};
pub use gate::{ResponseGate, ResponseWriter};
pub use timeouts::{RequestTimeout, TimeoutLayer, TIMEOUT_DETAIL};
