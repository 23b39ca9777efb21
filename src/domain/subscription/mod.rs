//! Subscription domain - billing state and its reconciliation rules.
//!
//! # Module Structure
//!
//! - `status` - Local status and provider status mapping
//! - `plan` - Plan type, agent personas, trial caps
//! - `billing` - Provider subscription snapshot and metadata
//! - `plan_resolution` - `resolve_plan_type` and premium determination
//! - `canonical` - Choosing one subscription among several
//! - `record` - The persisted per-user row
//! - `errors` - Subscription-specific errors
//! - `stripe_event` - Stripe webhook payload types
//! - `webhook_verifier` - Signature verification
//! - `webhook_errors` - Webhook rejection errors

mod billing;
mod canonical;
mod errors;
mod plan;
mod plan_resolution;
mod record;
mod status;
pub mod stripe_event;
pub mod webhook_errors;
pub mod webhook_verifier;

pub use billing::{metadata_keys, BillingSubscription, SubscriptionMetadata};
pub use canonical::{select_canonical, CanonicalSelection};
pub use errors::SubscriptionError;
pub use plan::{AgentType, PlanType, TrialLimitations};
pub use plan_resolution::{is_premium, resolve_plan_type, PlanResolution, PlanSource};
pub use record::SubscriptionRecord;
pub use status::{BillingStatus, SubscriptionStatus};
pub use stripe_event::{
    StripeCheckoutSession, StripeEvent, StripeEventType, StripeInvoice, StripeSubscription,
};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{sign_payload, SignatureHeader, StripeWebhookVerifier};
