//! HTTP adapters - REST API and page gate.
//!
//! Each area has its own adapter for endpoint exposure:
//! - `billing` - Stripe webhooks, pull sync, checkout
//! - `access` - Gate decision and agent usage metering
//! - `middleware` - Authentication and the protected-page gate

pub mod access;
pub mod billing;
pub mod error;
pub mod middleware;
mod router;

pub use access::{access_router, AccessAppState};
pub use billing::{billing_router, BillingAppState};
pub use error::{ErrorResponse, SubscriptionApiError, WebhookApiError};
pub use middleware::{AuthState, GatePaths, GateState};
pub use router::{app_router, AppState, RouterSettings};
