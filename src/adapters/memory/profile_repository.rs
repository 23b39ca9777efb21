//! In-memory profile repository.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{lock, FailureSwitch};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::subscription::SubscriptionRecord;
use crate::domain::user::Profile;
use crate::ports::ProfileRepository;

#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    profiles: Mutex<HashMap<UserId, Profile>>,
    write_failures: FailureSwitch,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.id.clone(), profile);
    }

    pub fn get(&self, id: &UserId) -> Option<Profile> {
        lock(&self.profiles).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.profiles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_next_writes(&self, times: u32) {
        self.write_failures.arm(times);
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn create(&self, profile: &Profile) -> Result<(), DomainError> {
        self.write_failures.check("profile create")?;
        lock(&self.profiles)
            .entry(profile.id.clone())
            .or_insert_with(|| profile.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, DomainError> {
        Ok(self.get(id))
    }

    async fn find_by_customer_id(&self, customer_id: &str) -> Result<Option<Profile>, DomainError> {
        Ok(lock(&self.profiles)
            .values()
            .find(|p| p.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn set_stripe_customer_id(
        &self,
        id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        self.write_failures.check("profile update")?;
        let mut profiles = lock(&self.profiles);
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| DomainError::new(ErrorCode::NotFound, format!("profile {}", id)))?;
        profile.stripe_customer_id = Some(customer_id.to_string());
        profile.updated_at = Timestamp::now();
        Ok(())
    }

    async fn mirror_subscription(&self, record: &SubscriptionRecord) -> Result<(), DomainError> {
        self.write_failures.check("profile mirror")?;
        if let Some(profile) = lock(&self.profiles).get_mut(&record.user_id) {
            profile.mirror(record, Timestamp::now());
        }
        Ok(())
    }
}
