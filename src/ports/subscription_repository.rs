//! Subscription repository port.
//!
//! One row per user. The reconciler is the only writer apart from the
//! `pending` row inserted when a known user starts checkout.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::SubscriptionRecord;

/// Repository port for subscription rows.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the row of a user.
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Find the row pointing at a provider customer.
    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Find the row pointing at a provider subscription.
    async fn find_by_billing_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Writes `record` as the user's only row and purges stale rows, in one
    /// transaction.
    ///
    /// Stale rows are rows of *other* users that reference one of
    /// `stale_subscription_ids`, the record's own subscription id, or the
    /// record's customer. The user's own row is replaced by the upsert.
    async fn upsert_exclusive(
        &self,
        record: &SubscriptionRecord,
        stale_subscription_ids: &[String],
    ) -> Result<(), DomainError>;

    /// Inserts `record` unless the user already has a row.
    ///
    /// Returns `true` when a row was inserted.
    async fn insert_if_absent(&self, record: &SubscriptionRecord) -> Result<bool, DomainError>;
}
