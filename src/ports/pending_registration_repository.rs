//! Pending registration repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::registration::{PendingRegistration, PhoneVerification, RegistrationToken};

/// Storage for pending registrations and the phone verifications they
/// reference.
#[async_trait]
pub trait PendingRegistrationRepository: Send + Sync {
    /// Save a new pending registration. Tokens are unique.
    async fn save(&self, pending: &PendingRegistration) -> Result<(), DomainError>;

    /// Find by token. Expired rows are returned too; the caller decides.
    async fn find_by_token(
        &self,
        token: &RegistrationToken,
    ) -> Result<Option<PendingRegistration>, DomainError>;

    /// Delete by token. Deleting a missing token is not an error.
    async fn delete(&self, token: &RegistrationToken) -> Result<(), DomainError>;

    /// Delete registrations whose `expires_at` is at or before `now`.
    /// Returns how many were removed.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError>;

    async fn find_phone_verification(
        &self,
        verification_id: &str,
    ) -> Result<Option<PhoneVerification>, DomainError>;

    /// Mark a phone verification as consumed so it cannot seed another
    /// registration. Returns `false` if it was already consumed or does not
    /// exist.
    async fn consume_phone_verification(&self, verification_id: &str)
        -> Result<bool, DomainError>;
}
