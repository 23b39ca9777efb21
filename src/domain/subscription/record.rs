//! The persisted subscription row, one per user.

use serde::Serialize;

use super::{
    is_premium, BillingSubscription, PlanResolution, PlanType, SubscriptionStatus,
    TrialLimitations,
};
use crate::domain::foundation::{Timestamp, UserId};

/// Current billing state of one user, owned by the reconciler.
///
/// Invariants (kept by the constructors):
/// - `plan_type == Direct` ⇒ no limitations and no trial end
/// - `plan_type == Trial` ⇒ the default limitations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRecord {
    pub user_id: UserId,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub billing_price_id: Option<String>,
    pub status: SubscriptionStatus,
    pub plan_type: PlanType,
    pub trial_limitations: Option<TrialLimitations>,
    pub trial_ends_at: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SubscriptionRecord {
    /// Row written when a known user starts checkout.
    pub fn pending(
        user_id: UserId,
        customer_id: impl Into<String>,
        price_id: Option<String>,
        plan_type: PlanType,
        now: Timestamp,
    ) -> Self {
        let trial_limitations = match plan_type {
            PlanType::Trial => Some(TrialLimitations::default()),
            PlanType::Direct => None,
        };

        Self {
            user_id,
            billing_customer_id: Some(customer_id.into()),
            billing_subscription_id: None,
            billing_price_id: price_id,
            status: SubscriptionStatus::Pending,
            plan_type,
            trial_limitations,
            trial_ends_at: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the row for a provider subscription.
    ///
    /// The stored plan is `Direct` exactly when the subscription is premium.
    /// `created_at` is carried over from `existing` when there is one.
    pub fn from_billing(
        user_id: UserId,
        sub: &BillingSubscription,
        resolution: &PlanResolution,
        existing: Option<&SubscriptionRecord>,
        now: Timestamp,
    ) -> Self {
        let premium = is_premium(sub, resolution, &now);
        let (plan_type, trial_limitations, trial_ends_at) = if premium {
            (PlanType::Direct, None, None)
        } else {
            (
                PlanType::Trial,
                Some(TrialLimitations::default()),
                sub.trial_end,
            )
        };

        Self {
            user_id,
            billing_customer_id: Some(sub.customer_id.clone()),
            billing_subscription_id: Some(sub.id.clone()),
            billing_price_id: sub.price_id.clone(),
            status: sub.status.to_local(),
            plan_type,
            trial_limitations,
            trial_ends_at,
            current_period_end: sub.current_period_end,
            created_at: existing.map(|e| e.created_at).unwrap_or(now),
            updated_at: now,
        }
    }

    /// Whether the row points at a provider subscription yet.
    pub fn has_billing_subscription(&self) -> bool {
        self.billing_subscription_id.is_some()
    }

    /// Statuses that deny access, with `pending` allowed once the provider
    /// subscription exists (payment done, sync pending).
    pub fn is_inactive(&self) -> bool {
        self.status.is_terminal_for_access()
            || (self.status == SubscriptionStatus::Pending && !self.has_billing_subscription())
    }

    /// Checks the plan invariants. Used after every reconciler write in tests.
    pub fn invariants_hold(&self) -> bool {
        match self.plan_type {
            PlanType::Direct => self.trial_limitations.is_none() && self.trial_ends_at.is_none(),
            PlanType::Trial => self.trial_limitations == Some(TrialLimitations::default()),
        }
    }
}
