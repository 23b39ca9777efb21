//! HTTP adapter for billing endpoints.
//!
//! - `POST /api/webhooks/stripe` - Stripe webhook deliveries
//! - `POST /api/subscription/sync` - Pull-sync from Stripe
//! - `POST /api/subscription/checkout` - Start checkout (signed-in or registering)

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{BillingAppState, STRIPE_SIGNATURE_HEADER};
pub use routes::billing_router;
