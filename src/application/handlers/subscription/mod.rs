//! Subscription handlers.
//!
//! Command handlers for the subscription lifecycle:
//!
//! ## Commands
//! - Opening checkout sessions (known users and new registrations)
//! - Processing Stripe webhooks
//! - Pull-syncing a user's subscription
//!
//! Webhooks and sync share `SubscriptionReconciler`, so both paths compute
//! the same row for the same provider state.

mod create_checkout;
mod handle_billing_webhook;
mod reconcile;
mod sync_subscription;

pub use create_checkout::{
    CheckoutCustomer, CheckoutSettings, CreateCheckoutCommand, CreateCheckoutHandler,
    CreateCheckoutResult,
};
pub use handle_billing_webhook::{
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, HandleBillingWebhookResult,
    WebhookOutcome,
};
pub use reconcile::{ReconcileOutcome, ReconcileRequest, SubscriptionHint, SubscriptionReconciler};
pub use sync_subscription::{
    SyncRetryPolicy, SyncSubscriptionCommand, SyncSubscriptionHandler, SyncSubscriptionResult,
};
