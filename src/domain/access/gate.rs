//! Page access decision over persisted subscription and profile state.

use serde::Serialize;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{PlanType, SubscriptionRecord, SubscriptionStatus};
use crate::domain::user::Profile;

/// Days of the secondary trial window used when no trial end is stored.
pub const FALLBACK_TRIAL_DAYS: i64 = 3;

/// Where a denied request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Login,
    PlanSelection,
}

/// Which row of the decision table matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum GateReason {
    Unauthenticated,
    NoBillingRelationship,
    /// No subscription row yet, but checkout produced a customer.
    CheckoutPendingWebhook,
    SubscriptionInactive,
    TrialExpired,
    /// Trial plan without a stored trial end. The in-page check enforces
    /// `fallback_trial_end` instead.
    TrialExpiryUnknown { fallback_trial_end: Timestamp },
    /// `pending` row that already points at a provider subscription.
    PaymentPendingSync,
    Active,
    /// Evaluation itself failed; access is denied.
    EvaluationFailed,
}

/// Outcome of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub redirect: Option<RedirectTarget>,
    #[serde(flatten)]
    pub reason: GateReason,
}

impl AccessDecision {
    pub fn allow(reason: GateReason) -> Self {
        Self {
            allowed: true,
            redirect: None,
            reason,
        }
    }

    pub fn deny(target: RedirectTarget, reason: GateReason) -> Self {
        Self {
            allowed: false,
            redirect: Some(target),
            reason,
        }
    }

    /// Decision used when the inputs could not be loaded or evaluated.
    pub fn fail_closed() -> Self {
        Self::deny(RedirectTarget::PlanSelection, GateReason::EvaluationFailed)
    }
}

/// Evaluates the access table. First match wins:
///
/// 1. no user → login
/// 2. no row, no customer on the profile → plan selection
/// 3. no row, customer known → allow (webhook in flight)
/// 4. canceled / past_due → plan selection; pending is allowed only with a
///    provider subscription id
/// 5. trialing with `trial_ends_at <= now` → plan selection
/// 6. trial plan without a trial end → allow, secondary window
/// 7. allow
pub fn evaluate_gate(
    user: Option<&UserId>,
    subscription: Option<&SubscriptionRecord>,
    profile: Option<&Profile>,
    now: &Timestamp,
) -> AccessDecision {
    if user.is_none() {
        return AccessDecision::deny(RedirectTarget::Login, GateReason::Unauthenticated);
    }

    let sub = match subscription {
        Some(sub) => sub,
        None => {
            let has_customer = profile.map(Profile::has_billing_relationship).unwrap_or(false);
            return if has_customer {
                AccessDecision::allow(GateReason::CheckoutPendingWebhook)
            } else {
                AccessDecision::deny(
                    RedirectTarget::PlanSelection,
                    GateReason::NoBillingRelationship,
                )
            };
        }
    };

    match sub.status {
        SubscriptionStatus::Canceled | SubscriptionStatus::PastDue => {
            return AccessDecision::deny(
                RedirectTarget::PlanSelection,
                GateReason::SubscriptionInactive,
            );
        }
        SubscriptionStatus::Pending => {
            return if sub.has_billing_subscription() {
                AccessDecision::allow(GateReason::PaymentPendingSync)
            } else {
                AccessDecision::deny(
                    RedirectTarget::PlanSelection,
                    GateReason::SubscriptionInactive,
                )
            };
        }
        SubscriptionStatus::Trialing | SubscriptionStatus::Active | SubscriptionStatus::Incomplete => {}
    }

    if sub.status == SubscriptionStatus::Trialing {
        if let Some(ends_at) = sub.trial_ends_at {
            if !ends_at.is_after(now) {
                return AccessDecision::deny(
                    RedirectTarget::PlanSelection,
                    GateReason::TrialExpired,
                );
            }
        }
    }

    if sub.plan_type == PlanType::Trial && sub.trial_ends_at.is_none() {
        return AccessDecision::allow(GateReason::TrialExpiryUnknown {
            fallback_trial_end: sub.created_at.add_days(FALLBACK_TRIAL_DAYS),
        });
    }

    AccessDecision::allow(GateReason::Active)
}
