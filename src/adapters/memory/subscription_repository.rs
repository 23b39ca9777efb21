//! In-memory subscription repository.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{lock, FailureSwitch};
use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::SubscriptionRecord;
use crate::ports::SubscriptionRepository;

/// Subscription rows keyed by user, mirroring the unique `user_id` column.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionRepository {
    rows: Mutex<HashMap<UserId, SubscriptionRecord>>,
    write_failures: FailureSwitch,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row without going through the port.
    pub fn insert(&self, record: SubscriptionRecord) {
        lock(&self.rows).insert(record.user_id.clone(), record);
    }

    /// Makes the next `times` writes fail with a database error.
    pub fn fail_next_writes(&self, times: u32) {
        self.write_failures.arm(times);
    }

    pub fn rows(&self) -> Vec<SubscriptionRecord> {
        let mut rows: Vec<_> = lock(&self.rows).values().cloned().collect();
        rows.sort_by(|a, b| a.user_id.as_str().cmp(b.user_id.as_str()));
        rows
    }

    pub fn get(&self, user_id: &UserId) -> Option<SubscriptionRecord> {
        lock(&self.rows).get(user_id).cloned()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        Ok(self.get(user_id))
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        Ok(lock(&self.rows)
            .values()
            .filter(|r| r.billing_customer_id.as_deref() == Some(customer_id))
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn find_by_billing_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        Ok(lock(&self.rows)
            .values()
            .find(|r| r.billing_subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn upsert_exclusive(
        &self,
        record: &SubscriptionRecord,
        stale_subscription_ids: &[String],
    ) -> Result<(), DomainError> {
        self.write_failures.check("upsert")?;

        let mut rows = lock(&self.rows);
        rows.retain(|user_id, row| {
            if *user_id == record.user_id {
                return true;
            }
            let stale_sub = row.billing_subscription_id.as_ref().map_or(false, |id| {
                stale_subscription_ids.contains(id)
                    || record.billing_subscription_id.as_ref() == Some(id)
            });
            let same_customer = row.billing_customer_id.is_some()
                && row.billing_customer_id == record.billing_customer_id;
            !(stale_sub || same_customer)
        });
        rows.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn insert_if_absent(&self, record: &SubscriptionRecord) -> Result<bool, DomainError> {
        self.write_failures.check("insert")?;

        let mut rows = lock(&self.rows);
        if rows.contains_key(&record.user_id) {
            return Ok(false);
        }
        rows.insert(record.user_id.clone(), record.clone());
        Ok(true)
    }
}
