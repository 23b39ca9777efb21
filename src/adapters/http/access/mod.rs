//! HTTP adapter for access endpoints.
//!
//! - `GET /api/subscription/access` - Gate decision for the caller
//! - `POST /api/agents/:agent/usage` - Per-agent daily usage metering

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::UsageResponse;
pub use handlers::AccessAppState;
pub use routes::access_router;
