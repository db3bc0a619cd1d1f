//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → recovery.rs (panic boundary)
//!     → resilience::timeouts (deadline race)
//!     → auth.rs (Basic auth on health routes, when configured)
//!     → application handler / health endpoints
//!     → problem.rs (RFC 9457 error bodies)
//! ```

pub mod auth;
pub mod problem;
pub mod recovery;
pub mod request;
pub mod server;

pub use auth::{basic_auth_layer, BasicAuth};
pub use problem::{ProblemDetail, ProblemError, PROBLEM_JSON};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
