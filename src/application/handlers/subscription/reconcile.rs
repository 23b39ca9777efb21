//! SubscriptionReconciler - converges a user's subscription row on the
//! provider's view of the customer.
//!
//! Shared by the webhook and pull-sync paths. Every run recomputes the full
//! row from the provider listing, so deliveries can arrive in any order.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::subscription::{
    resolve_plan_type, select_canonical, BillingSubscription, PlanSource, SubscriptionError,
    SubscriptionRecord,
};
use crate::ports::{BillingProvider, ProfileRepository, SubscriptionRepository};

/// Attempts per write: the first try plus one inline retry.
const WRITE_ATTEMPTS: u32 = 2;

/// A subscription object carried by the triggering event.
#[derive(Debug, Clone)]
pub struct SubscriptionHint {
    pub subscription: BillingSubscription,
    /// The event was `customer.subscription.deleted`.
    pub deleted: bool,
}

/// What to reconcile.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub user_id: UserId,
    pub customer_id: String,
    /// Used only when the provider cannot be listed.
    pub hint: Option<SubscriptionHint>,
}

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The row was written (and mirrored onto the profile when possible).
    Persisted {
        record: SubscriptionRecord,
        plan_source: PlanSource,
    },
    /// Both write attempts failed; the row is left as it was.
    PersistenceDeferred { subscription_id: String },
    /// The customer has no subscription at the provider.
    NothingToReconcile,
    /// The event payload could not safely replace the stored row.
    Skipped { reason: &'static str },
}

/// Reconciles one user against the billing provider.
pub struct SubscriptionReconciler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    profiles: Arc<dyn ProfileRepository>,
    billing: Arc<dyn BillingProvider>,
}

impl SubscriptionReconciler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        profiles: Arc<dyn ProfileRepository>,
        billing: Arc<dyn BillingProvider>,
    ) -> Self {
        Self {
            subscriptions,
            profiles,
            billing,
        }
    }

    /// Recomputes and persists the user's row.
    ///
    /// # Errors
    ///
    /// - `Upstream` when the provider listing fails and no hint is given
    /// - `Infrastructure` when the existing row cannot be read
    pub async fn reconcile(
        &self,
        request: ReconcileRequest,
    ) -> Result<ReconcileOutcome, SubscriptionError> {
        let now = Timestamp::now();
        let existing = self.subscriptions.find_by_user_id(&request.user_id).await?;

        let candidates = match self.billing.list_subscriptions(&request.customer_id).await {
            Ok(listed) if !listed.is_empty() => listed,
            Ok(_) => match &request.hint {
                Some(hint) => vec![hint.subscription.clone()],
                None => return Ok(ReconcileOutcome::NothingToReconcile),
            },
            Err(err) => {
                let Some(hint) = &request.hint else {
                    return Err(err.into());
                };
                tracing::warn!(
                    user_id = %request.user_id,
                    customer_id = %request.customer_id,
                    subscription_id = %hint.subscription.id,
                    error = %err,
                    "Subscription listing failed, falling back to event payload"
                );
                if !hint_may_replace(hint, existing.as_ref()) {
                    tracing::info!(
                        user_id = %request.user_id,
                        subscription_id = %hint.subscription.id,
                        "Event payload would overwrite a different subscription, skipping"
                    );
                    return Ok(ReconcileOutcome::Skipped {
                        reason: "hint_conflicts_with_stored_subscription",
                    });
                }
                vec![hint.subscription.clone()]
            }
        };

        let Some(selection) = select_canonical(&candidates) else {
            return Ok(ReconcileOutcome::NothingToReconcile);
        };
        let canonical = &selection.canonical;

        let resolution = resolve_plan_type(canonical, existing.as_ref().map(|e| e.plan_type), &now);
        if resolution.source.is_fallback() {
            tracing::warn!(
                user_id = %request.user_id,
                subscription_id = %canonical.id,
                plan_type = resolution.plan_type.as_str(),
                source = ?resolution.source,
                "Plan type inferred without checkout metadata"
            );
        }

        let record = SubscriptionRecord::from_billing(
            request.user_id.clone(),
            canonical,
            &resolution,
            existing.as_ref(),
            now,
        );

        if let Err(err) = self.write_with_retry(&record, &selection.stale_ids).await {
            tracing::error!(
                user_id = %request.user_id,
                subscription_id = %canonical.id,
                error = %err,
                "Subscription write failed after retry, deferring"
            );
            return Ok(ReconcileOutcome::PersistenceDeferred {
                subscription_id: canonical.id.clone(),
            });
        }

        if let Err(err) = self.profiles.mirror_subscription(&record).await {
            tracing::warn!(
                user_id = %request.user_id,
                error = %err,
                "Profile mirror failed"
            );
        }

        tracing::info!(
            user_id = %request.user_id,
            subscription_id = %canonical.id,
            status = record.status.as_str(),
            plan_type = record.plan_type.as_str(),
            stale = selection.stale_ids.len(),
            "Subscription reconciled"
        );

        Ok(ReconcileOutcome::Persisted {
            record,
            plan_source: resolution.source,
        })
    }

    async fn write_with_retry(
        &self,
        record: &SubscriptionRecord,
        stale_ids: &[String],
    ) -> Result<(), DomainError> {
        let mut attempt = 1;
        loop {
            match self.subscriptions.upsert_exclusive(record, stale_ids).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < WRITE_ATTEMPTS => {
                    tracing::warn!(
                        user_id = %record.user_id,
                        attempt,
                        error = %err,
                        "Subscription write failed, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Whether an event payload may stand in for the provider listing.
///
/// A payload for another subscription than the stored one only wins when it
/// is a live upgrade; a deletion only applies to the stored subscription.
fn hint_may_replace(hint: &SubscriptionHint, existing: Option<&SubscriptionRecord>) -> bool {
    let stored_id = existing.and_then(|e| e.billing_subscription_id.as_deref());

    match stored_id {
        Some(id) if id == hint.subscription.id => true,
        _ if hint.deleted => false,
        None => true,
        Some(_) => hint.subscription.status.is_live() && hint.subscription.is_flagged_direct(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryProfileRepository, InMemorySubscriptionRepository};
    use crate::adapters::stripe::MockBillingProvider;
    use crate::domain::subscription::{
        BillingStatus, PlanType, SubscriptionMetadata, SubscriptionStatus, TrialLimitations,
    };
    use crate::domain::user::Profile;
    use crate::ports::BillingError;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        subscriptions: Arc<InMemorySubscriptionRepository>,
        profiles: Arc<InMemoryProfileRepository>,
        billing: Arc<MockBillingProvider>,
        reconciler: SubscriptionReconciler,
    }

    fn fixture() -> Fixture {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let profiles = Arc::new(InMemoryProfileRepository::new());
        let billing = Arc::new(MockBillingProvider::new());
        let reconciler =
            SubscriptionReconciler::new(subscriptions.clone(), profiles.clone(), billing.clone());
        Fixture {
            subscriptions,
            profiles,
            billing,
            reconciler,
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn trial_sub(id: &str, created_offset: i64) -> BillingSubscription {
        let now = Timestamp::now();
        BillingSubscription {
            id: id.into(),
            customer_id: "cus_1".into(),
            status: BillingStatus::Trialing,
            price_id: Some("price_trial".into()),
            trial_end: Some(now.add_days(3)),
            current_period_end: Some(now.add_days(3)),
            created: now.add_secs(created_offset),
            metadata: SubscriptionMetadata {
                user_id: Some("user-1".into()),
                plan_type: Some("trial".into()),
                ..Default::default()
            },
        }
    }

    fn direct_sub(id: &str, created_offset: i64) -> BillingSubscription {
        let now = Timestamp::now();
        BillingSubscription {
            id: id.into(),
            customer_id: "cus_1".into(),
            status: BillingStatus::Active,
            price_id: Some("price_direct".into()),
            trial_end: None,
            current_period_end: Some(now.add_days(30)),
            created: now.add_secs(created_offset),
            metadata: SubscriptionMetadata {
                user_id: Some("user-1".into()),
                plan_type: Some("direct".into()),
                is_upgrade: true,
                ..Default::default()
            },
        }
    }

    fn request(hint: Option<SubscriptionHint>) -> ReconcileRequest {
        ReconcileRequest {
            user_id: user(),
            customer_id: "cus_1".into(),
            hint,
        }
    }

    fn stored(f: &Fixture) -> SubscriptionRecord {
        f.subscriptions.get(&user()).expect("row written")
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Happy paths
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn trial_subscription_is_persisted_with_limits() {
        let f = fixture();
        f.billing.put_subscription(trial_sub("sub_t", 0));

        let outcome = f.reconciler.reconcile(request(None)).await.unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Persisted {
                plan_source: PlanSource::Metadata,
                ..
            }
        ));
        let row = stored(&f);
        assert_eq!(row.status, SubscriptionStatus::Trialing);
        assert_eq!(row.plan_type, PlanType::Trial);
        assert_eq!(row.trial_limitations, Some(TrialLimitations::default()));
        assert!(row.trial_ends_at.is_some());
        assert!(row.invariants_hold());
    }

    #[tokio::test]
    async fn upgrade_supersedes_trial_and_purges_stale_row() {
        let f = fixture();
        f.billing.put_subscription(trial_sub("sub_t", 0));
        f.reconciler.reconcile(request(None)).await.unwrap();

        f.billing.put_subscription(direct_sub("sub_d", 60));
        f.reconciler.reconcile(request(None)).await.unwrap();

        let rows = f.subscriptions.rows();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.billing_subscription_id.as_deref(), Some("sub_d"));
        assert_eq!(row.plan_type, PlanType::Direct);
        assert_eq!(row.status, SubscriptionStatus::Active);
        assert_eq!(row.trial_limitations, None);
        assert_eq!(row.trial_ends_at, None);
    }

    #[tokio::test]
    async fn created_at_survives_reconciliation() {
        let f = fixture();
        f.billing.put_subscription(trial_sub("sub_t", 0));
        f.reconciler.reconcile(request(None)).await.unwrap();
        let first = stored(&f).created_at;

        f.reconciler.reconcile(request(None)).await.unwrap();
        assert_eq!(stored(&f).created_at, first);
    }

    #[tokio::test]
    async fn profile_mirrors_status() {
        let f = fixture();
        f.profiles
            .insert(Profile::new(user(), "a@b.fr", Timestamp::now()));
        f.billing.put_subscription(trial_sub("sub_t", 0));

        f.reconciler.reconcile(request(None)).await.unwrap();

        let profile = f.profiles.get(&user()).unwrap();
        assert_eq!(profile.subscription_status, Some(SubscriptionStatus::Trialing));
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn profile_mirror_failure_does_not_fail_reconcile() {
        let f = fixture();
        f.profiles
            .insert(Profile::new(user(), "a@b.fr", Timestamp::now()));
        f.profiles.fail_next_writes(1);
        f.billing.put_subscription(trial_sub("sub_t", 0));

        let outcome = f.reconciler.reconcile(request(None)).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Persisted { .. }));
    }

    #[tokio::test]
    async fn customer_without_subscriptions_is_nothing_to_reconcile() {
        let f = fixture();
        let outcome = f.reconciler.reconcile(request(None)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NothingToReconcile);
        assert!(f.subscriptions.rows().is_empty());
    }

    #[tokio::test]
    async fn missing_metadata_preserves_local_plan() {
        let f = fixture();
        f.subscriptions.insert(SubscriptionRecord::pending(
            user(),
            "cus_1",
            None,
            PlanType::Trial,
            Timestamp::now(),
        ));
        let mut sub = direct_sub("sub_x", 0);
        sub.metadata = SubscriptionMetadata::default();
        f.billing.put_subscription(sub);

        let outcome = f.reconciler.reconcile(request(None)).await.unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Persisted {
                plan_source: PlanSource::PreservedLocal,
                ..
            }
        ));
        assert_eq!(stored(&f).plan_type, PlanType::Trial);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Write failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn single_write_failure_is_retried() {
        let f = fixture();
        f.billing.put_subscription(trial_sub("sub_t", 0));
        f.subscriptions.fail_next_writes(1);

        let outcome = f.reconciler.reconcile(request(None)).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Persisted { .. }));
        assert_eq!(f.subscriptions.rows().len(), 1);
    }

    #[tokio::test]
    async fn double_write_failure_is_deferred() {
        let f = fixture();
        f.billing.put_subscription(trial_sub("sub_t", 0));
        f.subscriptions.fail_next_writes(2);

        let outcome = f.reconciler.reconcile(request(None)).await.unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::PersistenceDeferred {
                subscription_id: "sub_t".into()
            }
        );
        assert!(f.subscriptions.rows().is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Provider failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn listing_failure_without_hint_is_upstream_error() {
        let f = fixture();
        f.billing
            .set_method_error("list_subscriptions", BillingError::network("timeout"));

        let err = f.reconciler.reconcile(request(None)).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Upstream(_)));
    }

    #[tokio::test]
    async fn listing_failure_falls_back_to_hint_for_first_row() {
        let f = fixture();
        f.billing
            .set_method_error("list_subscriptions", BillingError::network("timeout"));

        let outcome = f
            .reconciler
            .reconcile(request(Some(SubscriptionHint {
                subscription: trial_sub("sub_t", 0),
                deleted: false,
            })))
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Persisted { .. }));
        assert_eq!(stored(&f).billing_subscription_id.as_deref(), Some("sub_t"));
    }

    #[tokio::test]
    async fn stale_trial_hint_does_not_overwrite_direct_row() {
        let f = fixture();
        f.billing.put_subscription(direct_sub("sub_d", 60));
        f.reconciler.reconcile(request(None)).await.unwrap();

        f.billing
            .set_method_error("list_subscriptions", BillingError::network("timeout"));
        let outcome = f
            .reconciler
            .reconcile(request(Some(SubscriptionHint {
                subscription: trial_sub("sub_t", 0),
                deleted: false,
            })))
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Skipped { .. }));
        assert_eq!(stored(&f).plan_type, PlanType::Direct);
    }

    #[tokio::test]
    async fn deletion_hint_applies_only_to_the_stored_subscription() {
        let f = fixture();
        f.billing.put_subscription(direct_sub("sub_d", 60));
        f.reconciler.reconcile(request(None)).await.unwrap();
        f.billing
            .set_method_error("list_subscriptions", BillingError::network("timeout"));

        let mut old_trial = trial_sub("sub_t", 0);
        old_trial.status = BillingStatus::Canceled;
        let outcome = f
            .reconciler
            .reconcile(request(Some(SubscriptionHint {
                subscription: old_trial,
                deleted: true,
            })))
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Skipped { .. }));
        assert_eq!(stored(&f).status, SubscriptionStatus::Active);

        let mut canceled_direct = direct_sub("sub_d", 60);
        canceled_direct.status = BillingStatus::Canceled;
        f.reconciler
            .reconcile(request(Some(SubscriptionHint {
                subscription: canceled_direct,
                deleted: true,
            })))
            .await
            .unwrap();
        assert_eq!(stored(&f).status, SubscriptionStatus::Canceled);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Hint policy
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn live_upgrade_hint_may_replace_other_subscription() {
        let existing = SubscriptionRecord::from_billing(
            user(),
            &trial_sub("sub_t", 0),
            &resolve_plan_type(&trial_sub("sub_t", 0), None, &Timestamp::now()),
            None,
            Timestamp::now(),
        );
        let hint = SubscriptionHint {
            subscription: direct_sub("sub_d", 60),
            deleted: false,
        };
        assert!(hint_may_replace(&hint, Some(&existing)));
    }

    #[test]
    fn deletion_without_stored_row_is_ignored() {
        let hint = SubscriptionHint {
            subscription: trial_sub("sub_t", 0),
            deleted: true,
        };
        assert!(!hint_may_replace(&hint, None));
    }
}
