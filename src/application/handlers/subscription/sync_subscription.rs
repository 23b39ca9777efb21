//! SyncSubscriptionHandler - pull-based reconciliation.
//!
//! Used by the payment-success page and as a manual repair path when a
//! webhook was missed. Finds the user's customer, then runs the same
//! reconciler as the webhook path.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{PlanSource, SubscriptionError, SubscriptionRecord};
use crate::ports::{BillingProvider, ProfileRepository, SubscriptionRepository};

use super::reconcile::{ReconcileOutcome, ReconcileRequest, SubscriptionReconciler};

/// Command to sync one user's subscription from the provider.
#[derive(Debug, Clone)]
pub struct SyncSubscriptionCommand {
    pub user_id: UserId,
}

/// Result of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSubscriptionResult {
    pub subscription: SubscriptionRecord,
    pub plan_source: PlanSource,
}

/// Retry policy for provider calls during sync.
#[derive(Debug, Clone, Copy)]
pub struct SyncRetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for SyncRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Handler for pull sync.
pub struct SyncSubscriptionHandler {
    reconciler: Arc<SubscriptionReconciler>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    profiles: Arc<dyn ProfileRepository>,
    billing: Arc<dyn BillingProvider>,
    retry: SyncRetryPolicy,
}

impl SyncSubscriptionHandler {
    pub fn new(
        reconciler: Arc<SubscriptionReconciler>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        profiles: Arc<dyn ProfileRepository>,
        billing: Arc<dyn BillingProvider>,
    ) -> Self {
        Self {
            reconciler,
            subscriptions,
            profiles,
            billing,
            retry: SyncRetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: SyncRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// # Errors
    ///
    /// - `NoBillingRelationship` when no customer exists, or the customer
    ///   has no subscription at the provider
    /// - `Upstream` when the provider stays unreachable
    /// - `Infrastructure` when the row could not be written
    pub async fn handle(
        &self,
        cmd: SyncSubscriptionCommand,
    ) -> Result<SyncSubscriptionResult, SubscriptionError> {
        let customer_id = self.find_customer(&cmd.user_id).await?;

        let mut attempt = 1;
        let outcome = loop {
            let request = ReconcileRequest {
                user_id: cmd.user_id.clone(),
                customer_id: customer_id.clone(),
                hint: None,
            };
            match self.reconciler.reconcile(request).await {
                Err(SubscriptionError::Upstream(message)) if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        user_id = %cmd.user_id,
                        customer_id = %customer_id,
                        attempt,
                        error = %message,
                        "Provider call failed during sync, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry.retry_delay).await;
                }
                other => break other?,
            }
        };

        match outcome {
            ReconcileOutcome::Persisted {
                record,
                plan_source,
            } => Ok(SyncSubscriptionResult {
                subscription: record,
                plan_source,
            }),
            ReconcileOutcome::PersistenceDeferred { subscription_id } => {
                Err(SubscriptionError::infrastructure(format!(
                    "could not persist subscription {}",
                    subscription_id
                )))
            }
            ReconcileOutcome::NothingToReconcile | ReconcileOutcome::Skipped { .. } => {
                tracing::info!(
                    user_id = %cmd.user_id,
                    customer_id = %customer_id,
                    "Customer has no subscription at the provider"
                );
                Err(SubscriptionError::no_billing_relationship(cmd.user_id))
            }
        }
    }

    /// Profile, then subscription row, then the provider by email. A
    /// customer found at the provider is persisted on the profile.
    async fn find_customer(&self, user_id: &UserId) -> Result<String, SubscriptionError> {
        let profile = self.profiles.find_by_id(user_id).await?;
        if let Some(customer_id) = profile.as_ref().and_then(|p| p.stripe_customer_id.clone()) {
            return Ok(customer_id);
        }

        if let Some(customer_id) = self
            .subscriptions
            .find_by_user_id(user_id)
            .await?
            .and_then(|row| row.billing_customer_id)
        {
            return Ok(customer_id);
        }

        let Some(profile) = profile else {
            return Err(SubscriptionError::no_billing_relationship(user_id.clone()));
        };

        let discovered = self.find_customer_by_email(user_id, &profile.email).await?;
        let Some(customer_id) = discovered else {
            return Err(SubscriptionError::no_billing_relationship(user_id.clone()));
        };

        tracing::info!(
            user_id = %user_id,
            customer_id = %customer_id,
            "Discovered provider customer by email"
        );
        self.profiles
            .set_stripe_customer_id(user_id, &customer_id)
            .await?;
        Ok(customer_id)
    }

    async fn find_customer_by_email(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<Option<String>, SubscriptionError> {
        let mut attempt = 1;
        loop {
            match self.billing.find_customer_by_email(email).await {
                Ok(found) => return Ok(found),
                Err(err) if err.retryable && attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        user_id = %user_id,
                        attempt,
                        error = %err,
                        "Customer lookup failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry.retry_delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
