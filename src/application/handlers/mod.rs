//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod access;
pub mod registration;
pub mod subscription;

pub use access::{CheckAccessHandler, CheckAccessQuery, CheckUsageHandler, CheckUsageQuery};
pub use registration::{CompleteRegistrationCommand, CompleteRegistrationHandler};
pub use subscription::{
    CheckoutCustomer, CheckoutSettings, CreateCheckoutCommand, CreateCheckoutHandler,
    CreateCheckoutResult, HandleBillingWebhookCommand, HandleBillingWebhookHandler,
    HandleBillingWebhookResult, ReconcileOutcome, ReconcileRequest, SubscriptionHint,
    SubscriptionReconciler, SyncRetryPolicy, SyncSubscriptionCommand, SyncSubscriptionHandler,
    SyncSubscriptionResult, WebhookOutcome,
};
