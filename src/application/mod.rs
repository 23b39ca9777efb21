//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers write (checkout, webhooks, sync, registration); query
//! handlers read persisted state only (access gate, usage metering).

pub mod handlers;

pub use handlers::{
    CheckAccessHandler, CheckAccessQuery, CheckUsageHandler, CheckUsageQuery,
    CompleteRegistrationCommand, CompleteRegistrationHandler, CreateCheckoutCommand,
    CreateCheckoutHandler, HandleBillingWebhookCommand, HandleBillingWebhookHandler,
    SubscriptionReconciler, SyncSubscriptionCommand, SyncSubscriptionHandler, WebhookOutcome,
};
