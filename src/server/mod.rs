//! HTTP server for the chat page.
//!
//! - [`api`]: Request/response types and route handlers
//! - [`metrics`]: Prometheus counters exposed at `/metrics`

pub mod api;
pub mod metrics;
