//! In-memory pending registration repository.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{lock, FailureSwitch};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::registration::{PendingRegistration, PhoneVerification, RegistrationToken};
use crate::ports::PendingRegistrationRepository;

#[derive(Debug, Default)]
pub struct InMemoryPendingRegistrationRepository {
    pending: Mutex<HashMap<RegistrationToken, PendingRegistration>>,
    verifications: Mutex<HashMap<String, PhoneVerification>>,
    write_failures: FailureSwitch,
}

impl InMemoryPendingRegistrationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pending: PendingRegistration) {
        lock(&self.pending).insert(pending.token.clone(), pending);
    }

    pub fn contains(&self, token: &RegistrationToken) -> bool {
        lock(&self.pending).contains_key(token)
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seeds a completed phone check.
    pub fn verify_phone(&self, verification_id: &str) {
        lock(&self.verifications).insert(
            verification_id.to_string(),
            PhoneVerification {
                id: verification_id.to_string(),
                verified_at: Some(Timestamp::now()),
                consumed_at: None,
            },
        );
    }

    /// Seeds a phone check that was started but never confirmed.
    pub fn start_phone_verification(&self, verification_id: &str) {
        lock(&self.verifications).insert(
            verification_id.to_string(),
            PhoneVerification {
                id: verification_id.to_string(),
                verified_at: None,
                consumed_at: None,
            },
        );
    }

    pub fn is_consumed(&self, verification_id: &str) -> bool {
        lock(&self.verifications)
            .get(verification_id)
            .map_or(false, |v| v.consumed_at.is_some())
    }

    pub fn fail_next_writes(&self, times: u32) {
        self.write_failures.arm(times);
    }
}

#[async_trait]
impl PendingRegistrationRepository for InMemoryPendingRegistrationRepository {
    async fn save(&self, pending: &PendingRegistration) -> Result<(), DomainError> {
        self.write_failures.check("pending registration save")?;
        let mut map = lock(&self.pending);
        if map.contains_key(&pending.token) {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "registration token already exists",
            ));
        }
        map.insert(pending.token.clone(), pending.clone());
        Ok(())
    }

    async fn find_by_token(
        &self,
        token: &RegistrationToken,
    ) -> Result<Option<PendingRegistration>, DomainError> {
        Ok(lock(&self.pending).get(token).cloned())
    }

    async fn delete(&self, token: &RegistrationToken) -> Result<(), DomainError> {
        self.write_failures.check("pending registration delete")?;
        lock(&self.pending).remove(token);
        Ok(())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        self.write_failures.check("pending registration purge")?;
        let mut map = lock(&self.pending);
        let before = map.len();
        map.retain(|_, pending| !pending.is_expired(&now));
        Ok((before - map.len()) as u64)
    }

    async fn find_phone_verification(
        &self,
        verification_id: &str,
    ) -> Result<Option<PhoneVerification>, DomainError> {
        Ok(lock(&self.verifications).get(verification_id).cloned())
    }

    async fn consume_phone_verification(
        &self,
        verification_id: &str,
    ) -> Result<bool, DomainError> {
        self.write_failures.check("phone verification update")?;
        let mut verifications = lock(&self.verifications);
        match verifications.get_mut(verification_id) {
            Some(verification) if verification.consumed_at.is_none() => {
                verification.consumed_at = Some(Timestamp::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingRegistration {
        PendingRegistration::new(
            RegistrationToken::generate(),
            "a@b.fr",
            "cipher",
            Some("pv_1".into()),
            24,
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn save_find_delete() {
        let repo = InMemoryPendingRegistrationRepository::new();
        let p = pending();

        repo.save(&p).await.unwrap();
        assert_eq!(repo.find_by_token(&p.token).await.unwrap(), Some(p.clone()));

        repo.delete(&p.token).await.unwrap();
        assert!(repo.find_by_token(&p.token).await.unwrap().is_none());
        repo.delete(&p.token).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_token_is_rejected() {
        let repo = InMemoryPendingRegistrationRepository::new();
        let p = pending();
        repo.save(&p).await.unwrap();
        assert!(repo.save(&p).await.is_err());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_rows() {
        let repo = InMemoryPendingRegistrationRepository::new();
        let now = Timestamp::now();
        let stale = PendingRegistration::new(
            RegistrationToken::generate(),
            "old@b.fr",
            "cipher",
            None,
            24,
            now.add_hours(-25),
        );
        let fresh = pending();
        repo.insert(stale.clone());
        repo.insert(fresh.clone());

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(!repo.contains(&stale.token));
        assert!(repo.contains(&fresh.token));
    }

    #[tokio::test]
    async fn consume_succeeds_once() {
        let repo = InMemoryPendingRegistrationRepository::new();
        repo.verify_phone("pv_1");

        assert!(repo.consume_phone_verification("pv_1").await.unwrap());
        assert!(repo.is_consumed("pv_1"));
        assert!(!repo.consume_phone_verification("pv_1").await.unwrap());

        let stored = repo.find_phone_verification("pv_1").await.unwrap().unwrap();
        assert!(!stored.is_usable());
    }

    #[tokio::test]
    async fn unknown_verification_is_not_consumed() {
        let repo = InMemoryPendingRegistrationRepository::new();
        assert!(!repo.consume_phone_verification("pv_2").await.unwrap());
        assert!(repo.find_phone_verification("pv_2").await.unwrap().is_none());
        assert!(!repo.is_consumed("pv_2"));
    }
}
