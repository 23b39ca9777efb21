//! Profile repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::SubscriptionRecord;
use crate::domain::user::Profile;

/// Repository for user profiles and their billing mirror.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create a profile. Creating a profile that already exists is a no-op.
    async fn create(&self, profile: &Profile) -> Result<(), DomainError>;

    /// Find profile by user ID.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, DomainError>;

    /// Find the profile owning a provider customer.
    async fn find_by_customer_id(&self, customer_id: &str) -> Result<Option<Profile>, DomainError>;

    /// Record the provider customer on the profile.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the profile doesn't exist
    async fn set_stripe_customer_id(
        &self,
        id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError>;

    /// Copy status, trial end and customer from a reconciled row.
    async fn mirror_subscription(&self, record: &SubscriptionRecord) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn ProfileRepository) {}
    }
}
