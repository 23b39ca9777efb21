//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port for Stripe: customers, checkout
//! sessions, subscription listing and metadata updates. Webhook verification
//! lives in the domain since it needs no I/O.
//!
//! # Configuration
//!
//! Required settings:
//! - `payment.stripe_api_key`: Stripe secret API key
//! - `payment.stripe_webhook_secret`: Webhook signing secret (whsec_...)

mod api_types;
mod mock_billing_provider;
mod stripe_adapter;

pub use api_types::{StripeCreatedCheckoutSession, StripeCustomer, StripeList};
pub use mock_billing_provider::{MethodCall, MockBillingProvider};
pub use stripe_adapter::{StripeBillingAdapter, StripeConfig};
