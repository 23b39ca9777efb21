//! HTTP middleware for axum.
//!
//! - `auth` - Authentication middleware and extractors
//! - `access_gate` - Subscription gate in front of protected pages

pub mod access_gate;
pub mod auth;

pub use access_gate::{access_gate, GatePaths, GateState};
pub use auth::{auth_middleware, AuthRejection, AuthState, OptionalAuth, RequireAuth};
