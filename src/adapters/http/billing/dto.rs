//! Request and response bodies for the billing endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::subscription::{
    CreateCheckoutResult, HandleBillingWebhookResult, SyncSubscriptionResult, WebhookOutcome,
};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{PlanSource, PlanType, SubscriptionStatus, TrialLimitations};

/// Acknowledgement sent to Stripe.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub event_id: String,
    pub outcome: WebhookOutcome,
}

impl From<HandleBillingWebhookResult> for WebhookAckResponse {
    fn from(result: HandleBillingWebhookResult) -> Self {
        Self {
            received: true,
            event_id: result.event_id,
            outcome: result.outcome,
        }
    }
}

/// Body of `POST /api/subscription/sync`. Empty means "the caller".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Subscription summary returned after a sync.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSummaryResponse {
    pub user_id: String,
    pub status: SubscriptionStatus,
    pub plan_type: PlanType,
    pub plan_source: PlanSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_limitations: Option<TrialLimitations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_ends_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_subscription_id: Option<String>,
}

impl From<SyncSubscriptionResult> for SubscriptionSummaryResponse {
    fn from(result: SyncSubscriptionResult) -> Self {
        let record = result.subscription;
        Self {
            user_id: record.user_id.to_string(),
            status: record.status,
            plan_type: record.plan_type,
            plan_source: result.plan_source,
            trial_limitations: record.trial_limitations,
            trial_ends_at: record.trial_ends_at,
            current_period_end: record.current_period_end,
            billing_subscription_id: record.billing_subscription_id,
        }
    }
}

/// Body of `POST /api/subscription/checkout`.
///
/// Signed-in callers send only the plan. Anonymous callers register through
/// checkout and must also send email, password and phone verification.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub plan_type: String,
    #[serde(default)]
    pub is_upgrade: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub phone_verification_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
}

impl From<CreateCheckoutResult> for CheckoutResponse {
    fn from(result: CreateCheckoutResult) -> Self {
        Self {
            session_id: result.session_id,
            checkout_url: result.checkout_url,
        }
    }
}
