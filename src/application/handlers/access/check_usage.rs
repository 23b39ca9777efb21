//! CheckUsageHandler - meters one agent call against the daily quota.
//!
//! Agent endpoints call this before doing any work. The counter is bumped
//! only when the call is allowed.

use std::sync::Arc;

use crate::domain::access::{usage_policy, UsageDenial, UsageOutcome, UsagePolicy};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{AgentType, SubscriptionError};
use crate::ports::{SubscriptionRepository, UsageRepository};

/// Query to meter one agent call.
#[derive(Debug, Clone)]
pub struct CheckUsageQuery {
    pub user_id: UserId,
    pub agent: AgentType,
}

/// Handler for usage metering.
pub struct CheckUsageHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    usage: Arc<dyn UsageRepository>,
}

impl CheckUsageHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        usage: Arc<dyn UsageRepository>,
    ) -> Self {
        Self {
            subscriptions,
            usage,
        }
    }

    pub async fn handle(&self, query: CheckUsageQuery) -> Result<UsageOutcome, SubscriptionError> {
        let subscription = self.subscriptions.find_by_user_id(&query.user_id).await?;
        let today = Timestamp::now().date();

        let outcome = match usage_policy(subscription.as_ref(), query.agent) {
            UsagePolicy::Denied(reason) => UsageOutcome::Denied { reason },
            UsagePolicy::Capped(cap) => {
                match self
                    .usage
                    .try_increment(&query.user_id, query.agent, today, Some(cap))
                    .await?
                {
                    Some(count) => UsageOutcome::Allowed {
                        remaining: Some(cap.saturating_sub(count)),
                    },
                    None => UsageOutcome::Denied {
                        reason: UsageDenial::LimitReached,
                    },
                }
            }
            UsagePolicy::Unlimited => {
                self.usage
                    .try_increment(&query.user_id, query.agent, today, None)
                    .await?;
                UsageOutcome::Allowed { remaining: None }
            }
        };

        if let UsageOutcome::Denied { reason } = outcome {
            tracing::info!(
                user_id = %query.user_id,
                agent = query.agent.as_str(),
                reason = reason.code(),
                "Agent call denied"
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemorySubscriptionRepository, InMemoryUsageRepository};
    use crate::domain::subscription::{PlanType, SubscriptionRecord, SubscriptionStatus};

    struct Fixture {
        subscriptions: Arc<InMemorySubscriptionRepository>,
        usage: Arc<InMemoryUsageRepository>,
        handler: CheckUsageHandler,
    }

    fn fixture() -> Fixture {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let usage = Arc::new(InMemoryUsageRepository::new());
        let handler = CheckUsageHandler::new(subscriptions.clone(), usage.clone());
        Fixture {
            subscriptions,
            usage,
            handler,
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn seed(f: &Fixture, status: SubscriptionStatus, plan: PlanType) {
        let mut row = SubscriptionRecord::pending(user(), "cus_1", None, plan, Timestamp::now());
        row.status = status;
        row.billing_subscription_id = Some("sub_1".into());
        if plan == PlanType::Direct {
            row.trial_limitations = None;
        }
        f.subscriptions.insert(row);
    }

    fn query(agent: AgentType) -> CheckUsageQuery {
        CheckUsageQuery {
            user_id: user(),
            agent,
        }
    }

    #[tokio::test]
    async fn no_subscription_is_denied() {
        let f = fixture();
        let outcome = f.handler.handle(query(AgentType::Chat)).await.unwrap();
        assert_eq!(
            outcome,
            UsageOutcome::Denied {
                reason: UsageDenial::NoSubscription
            }
        );
    }

    #[tokio::test]
    async fn trial_chat_counts_down_then_hits_limit() {
        let f = fixture();
        seed(&f, SubscriptionStatus::Trialing, PlanType::Trial);

        for expected in (0..5).rev() {
            let outcome = f.handler.handle(query(AgentType::Chat)).await.unwrap();
            assert_eq!(
                outcome,
                UsageOutcome::Allowed {
                    remaining: Some(expected)
                }
            );
        }

        let outcome = f.handler.handle(query(AgentType::Chat)).await.unwrap();
        assert_eq!(
            outcome,
            UsageOutcome::Denied {
                reason: UsageDenial::LimitReached
            }
        );
        let today = Timestamp::now().date();
        assert_eq!(
            f.usage.count_for(&user(), AgentType::Chat, today).await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn trial_builder_is_feature_locked() {
        let f = fixture();
        seed(&f, SubscriptionStatus::Trialing, PlanType::Trial);

        let outcome = f.handler.handle(query(AgentType::Builder)).await.unwrap();
        assert_eq!(
            outcome,
            UsageOutcome::Denied {
                reason: UsageDenial::FeatureLocked
            }
        );
    }

    #[tokio::test]
    async fn active_direct_is_unlimited_but_counted() {
        let f = fixture();
        seed(&f, SubscriptionStatus::Active, PlanType::Direct);

        for _ in 0..10 {
            let outcome = f.handler.handle(query(AgentType::Builder)).await.unwrap();
            assert_eq!(outcome, UsageOutcome::Allowed { remaining: None });
        }
        let today = Timestamp::now().date();
        assert_eq!(
            f.usage
                .count_for(&user(), AgentType::Builder, today)
                .await
                .unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn canceled_is_inactive() {
        let f = fixture();
        seed(&f, SubscriptionStatus::Canceled, PlanType::Direct);

        let outcome = f.handler.handle(query(AgentType::Chat)).await.unwrap();
        assert_eq!(
            outcome,
            UsageOutcome::Denied {
                reason: UsageDenial::SubscriptionInactive
            }
        );
    }
}
