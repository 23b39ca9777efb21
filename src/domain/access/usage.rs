//! Per-agent daily usage policy.

use serde::Serialize;
use std::fmt;

use crate::domain::subscription::{AgentType, SubscriptionRecord, SubscriptionStatus};

/// Why an agent call is refused. Serialized as the code the UI switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageDenial {
    NoSubscription,
    FeatureLocked,
    LimitReached,
    SubscriptionInactive,
}

impl UsageDenial {
    pub fn code(&self) -> &'static str {
        match self {
            UsageDenial::NoSubscription => "NO_SUBSCRIPTION",
            UsageDenial::FeatureLocked => "FEATURE_LOCKED",
            UsageDenial::LimitReached => "LIMIT_REACHED",
            UsageDenial::SubscriptionInactive => "SUBSCRIPTION_INACTIVE",
        }
    }
}

impl fmt::Display for UsageDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How an agent call must be metered before any counter is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsagePolicy {
    Unlimited,
    /// Daily cap, always at least one.
    Capped(u32),
    Denied(UsageDenial),
}

/// Result of a usage check after metering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UsageOutcome {
    /// `remaining` is `None` for unlimited plans.
    Allowed { remaining: Option<u32> },
    Denied { reason: UsageDenial },
}

impl UsageOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, UsageOutcome::Allowed { .. })
    }
}

/// Decides the metering policy for `agent` under `subscription`.
pub fn usage_policy(subscription: Option<&SubscriptionRecord>, agent: AgentType) -> UsagePolicy {
    let sub = match subscription {
        Some(sub) => sub,
        None => return UsagePolicy::Denied(UsageDenial::NoSubscription),
    };

    if sub.is_inactive() {
        return UsagePolicy::Denied(UsageDenial::SubscriptionInactive);
    }

    match sub.trial_limitations {
        Some(limits) => match limits.cap_for(agent) {
            0 => UsagePolicy::Denied(UsageDenial::FeatureLocked),
            cap => UsagePolicy::Capped(cap),
        },
        None if sub.status == SubscriptionStatus::Active => UsagePolicy::Unlimited,
        None => UsagePolicy::Denied(UsageDenial::SubscriptionInactive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::domain::subscription::{PlanType, TrialLimitations};

    fn record(status: SubscriptionStatus, plan: PlanType) -> SubscriptionRecord {
        let mut rec = SubscriptionRecord::pending(
            UserId::new("user-1").unwrap(),
            "cus_1",
            None,
            plan,
            Timestamp::now(),
        );
        rec.status = status;
        rec.billing_subscription_id = Some("sub_1".into());
        rec
    }

    #[test]
    fn no_subscription_is_denied() {
        assert_eq!(
            usage_policy(None, AgentType::Chat),
            UsagePolicy::Denied(UsageDenial::NoSubscription)
        );
    }

    #[test]
    fn active_direct_is_unlimited() {
        let rec = record(SubscriptionStatus::Active, PlanType::Direct);
        for agent in AgentType::ALL {
            assert_eq!(usage_policy(Some(&rec), agent), UsagePolicy::Unlimited);
        }
    }

    #[test]
    fn trial_caps_follow_limitations() {
        let rec = record(SubscriptionStatus::Trialing, PlanType::Trial);
        assert_eq!(usage_policy(Some(&rec), AgentType::Chat), UsagePolicy::Capped(5));
        assert_eq!(usage_policy(Some(&rec), AgentType::Validator), UsagePolicy::Capped(1));
        assert_eq!(
            usage_policy(Some(&rec), AgentType::Prompt),
            UsagePolicy::Denied(UsageDenial::FeatureLocked)
        );
        assert_eq!(
            usage_policy(Some(&rec), AgentType::Builder),
            UsagePolicy::Denied(UsageDenial::FeatureLocked)
        );
    }

    #[test]
    fn active_trial_plan_keeps_caps() {
        let rec = record(SubscriptionStatus::Active, PlanType::Trial);
        assert_eq!(
            rec.trial_limitations,
            Some(TrialLimitations::default())
        );
        assert_eq!(usage_policy(Some(&rec), AgentType::Chat), UsagePolicy::Capped(5));
    }

    #[test]
    fn inactive_statuses_are_denied() {
        for status in [SubscriptionStatus::Canceled, SubscriptionStatus::PastDue] {
            let rec = record(status, PlanType::Direct);
            assert_eq!(
                usage_policy(Some(&rec), AgentType::Chat),
                UsagePolicy::Denied(UsageDenial::SubscriptionInactive)
            );
        }
    }

    #[test]
    fn uncapped_but_not_active_is_denied() {
        let rec = record(SubscriptionStatus::Incomplete, PlanType::Direct);
        assert_eq!(
            usage_policy(Some(&rec), AgentType::Chat),
            UsagePolicy::Denied(UsageDenial::SubscriptionInactive)
        );
    }

    #[test]
    fn denial_codes_serialize_as_reason_codes() {
        let json = serde_json::to_value(UsageOutcome::Denied {
            reason: UsageDenial::LimitReached,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "outcome": "denied", "reason": "LIMIT_REACHED" })
        );
    }
}
