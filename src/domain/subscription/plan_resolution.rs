//! Plan-type resolution and premium determination.
//!
//! Both the webhook path and the pull-sync path go through
//! [`resolve_plan_type`] and [`is_premium`]; the record they write is built
//! by [`super::SubscriptionRecord::from_billing`].
//!
//! Resolution order:
//!
//! 1. `plan_type` metadata written at checkout (authoritative)
//! 2. the plan already stored locally
//! 3. a trial end still in the future → trial
//! 4. last resort: upgrade flag → direct, active without trial → direct,
//!    anything else → trial

use serde::Serialize;

use super::{BillingStatus, BillingSubscription, PlanType};
use crate::domain::foundation::Timestamp;

/// Where a resolved plan type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// `plan_type` metadata set at checkout.
    Metadata,
    /// Kept from the existing local row.
    PreservedLocal,
    /// Inferred from a trial end in the future.
    FutureTrialEnd,
    /// Fallback: `is_upgrade` metadata.
    UpgradeFlag,
    /// Fallback: provider status `active` without a running trial.
    ActiveWithoutTrial,
    /// Fallback: nothing conclusive, the limited plan is assumed.
    DefaultTrial,
}

impl PlanSource {
    /// Metadata written at checkout is the only authoritative source.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, PlanSource::Metadata)
    }

    /// The last-resort branch. Callers log when it is taken.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            PlanSource::UpgradeFlag | PlanSource::ActiveWithoutTrial | PlanSource::DefaultTrial
        )
    }
}

/// A plan type together with the reason it was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanResolution {
    pub plan_type: PlanType,
    pub source: PlanSource,
}

impl PlanResolution {
    fn new(plan_type: PlanType, source: PlanSource) -> Self {
        Self { plan_type, source }
    }
}

/// Resolves the plan type of a provider subscription.
///
/// `existing` is the plan currently stored for the user, if any.
pub fn resolve_plan_type(
    sub: &BillingSubscription,
    existing: Option<PlanType>,
    now: &Timestamp,
) -> PlanResolution {
    if let Some(plan) = sub.metadata.plan_type() {
        return PlanResolution::new(plan, PlanSource::Metadata);
    }

    if let Some(plan) = existing {
        return PlanResolution::new(plan, PlanSource::PreservedLocal);
    }

    if sub.has_future_trial(now) {
        return PlanResolution::new(PlanType::Trial, PlanSource::FutureTrialEnd);
    }

    if sub.metadata.is_upgrade {
        return PlanResolution::new(PlanType::Direct, PlanSource::UpgradeFlag);
    }

    // `incomplete` and everything else lands on the limited plan.
    if sub.status == BillingStatus::Active {
        return PlanResolution::new(PlanType::Direct, PlanSource::ActiveWithoutTrial);
    }

    PlanResolution::new(PlanType::Trial, PlanSource::DefaultTrial)
}

/// Whether the subscription grants the uncapped plan.
///
/// True when the upgrade flag is set, or when the resolved plan is direct,
/// the provider status is active and no trial is still running.
pub fn is_premium(sub: &BillingSubscription, resolution: &PlanResolution, now: &Timestamp) -> bool {
    sub.metadata.is_upgrade
        || (resolution.plan_type == PlanType::Direct
            && sub.status == BillingStatus::Active
            && !sub.has_future_trial(now))
}
