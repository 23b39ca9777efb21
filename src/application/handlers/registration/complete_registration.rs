//! CompleteRegistrationHandler - exchanges a pending registration for an
//! account once checkout has completed.
//!
//! Runs from the `checkout.session.completed` webhook. Every step is safe to
//! repeat, so duplicate deliveries converge on one account.

use std::sync::Arc;

use secrecy::SecretString;

use crate::domain::foundation::{ErrorCode, Timestamp, UserId};
use crate::domain::registration::{
    PendingRegistration, RegistrationError, RegistrationOutcome, RegistrationToken,
};
use crate::domain::user::{normalize_email, Profile};
use crate::ports::{
    AccountRepository, CredentialCipher, PendingRegistrationRepository, ProfileRepository,
};

/// Command to complete a registration.
#[derive(Debug, Clone)]
pub struct CompleteRegistrationCommand {
    pub token: RegistrationToken,
    /// Email the customer paid with, used to recognize replays after the
    /// pending row is gone.
    pub email_hint: Option<String>,
    /// Provider customer that paid. Recorded on the new profile and used to
    /// tell a replay apart from someone else's account.
    pub customer_id: Option<String>,
}

/// Handler for the registration exchange.
pub struct CompleteRegistrationHandler {
    pending: Arc<dyn PendingRegistrationRepository>,
    accounts: Arc<dyn AccountRepository>,
    profiles: Arc<dyn ProfileRepository>,
    cipher: Arc<dyn CredentialCipher>,
    allow_legacy_plaintext: bool,
}

impl CompleteRegistrationHandler {
    pub fn new(
        pending: Arc<dyn PendingRegistrationRepository>,
        accounts: Arc<dyn AccountRepository>,
        profiles: Arc<dyn ProfileRepository>,
        cipher: Arc<dyn CredentialCipher>,
    ) -> Self {
        Self {
            pending,
            accounts,
            profiles,
            cipher,
            allow_legacy_plaintext: false,
        }
    }

    /// Accept stored passwords that fail to decrypt as plaintext. Only for
    /// rows written before encryption was introduced.
    pub fn with_legacy_plaintext(mut self, allow: bool) -> Self {
        self.allow_legacy_plaintext = allow;
        self
    }

    pub async fn handle(
        &self,
        cmd: CompleteRegistrationCommand,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let now = Timestamp::now();
        let customer_id = cmd.customer_id.as_deref();

        let pending = match self.pending.find_by_token(&cmd.token).await.map_err(persistence)? {
            Some(pending) => pending,
            None => return self.replayed(cmd.email_hint.as_deref(), customer_id).await,
        };

        if let Some(user_id) = self
            .accounts
            .find_by_email(&pending.email)
            .await
            .map_err(persistence)?
        {
            self.ensure_owned(&pending, &user_id)?;
            // An earlier attempt created the account and stopped short.
            tracing::info!(user_id = %user_id, "Resuming pending registration");
            self.finish(&pending, customer_id, now).await?;
            return Ok(RegistrationOutcome::AlreadyRegistered { user_id });
        }

        if pending.is_expired(&now) {
            tracing::warn!(expires_at = %pending.expires_at, "Pending registration expired");
            return Err(RegistrationError::Expired);
        }

        let password = self.decrypt(&pending.password_encrypted)?;
        let user_id = pending.user_id.clone();

        match self
            .accounts
            .create(&user_id, &pending.email, &password)
            .await
        {
            Ok(()) => {}
            Err(err) if err.code == ErrorCode::AccountExists => {
                // Lost a race with a concurrent delivery or another signup.
                let owner = self
                    .accounts
                    .find_by_email(&pending.email)
                    .await
                    .map_err(persistence)?
                    .ok_or_else(|| RegistrationError::Persistence(err.to_string()))?;
                self.ensure_owned(&pending, &owner)?;
                self.finish(&pending, customer_id, now).await?;
                return Ok(RegistrationOutcome::AlreadyRegistered { user_id });
            }
            Err(err) => return Err(persistence(err)),
        }

        self.finish(&pending, customer_id, now).await?;
        tracing::info!(user_id = %user_id, "Account created from pending registration");
        Ok(RegistrationOutcome::Created { user_id })
    }

    /// Token unknown: either a replay after success or a bogus token. A
    /// replay is recognized by the paying customer already sitting on the
    /// account's profile.
    async fn replayed(
        &self,
        email_hint: Option<&str>,
        customer_id: Option<&str>,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let Some(email) = email_hint.and_then(|e| normalize_email(e).ok()) else {
            return Err(RegistrationError::TokenNotFound);
        };
        let Some(user_id) = self.accounts.find_by_email(&email).await.map_err(persistence)? else {
            return Err(RegistrationError::TokenNotFound);
        };

        let recorded = self
            .profiles
            .find_by_id(&user_id)
            .await
            .map_err(persistence)?
            .and_then(|profile| profile.stripe_customer_id);
        match (recorded.as_deref(), customer_id) {
            (Some(recorded), Some(paying)) if recorded == paying => {
                Ok(RegistrationOutcome::AlreadyRegistered { user_id })
            }
            _ => {
                tracing::warn!(user_id = %user_id, "Unknown registration token for an existing account");
                Err(RegistrationError::AccountConflict)
            }
        }
    }

    fn ensure_owned(
        &self,
        pending: &PendingRegistration,
        user_id: &UserId,
    ) -> Result<(), RegistrationError> {
        if user_id == &pending.user_id {
            return Ok(());
        }
        tracing::warn!(user_id = %user_id, "Pending registration email belongs to another account");
        Err(RegistrationError::AccountConflict)
    }

    /// Profile, phone verification, pending row. Each step is idempotent.
    async fn finish(
        &self,
        pending: &PendingRegistration,
        customer_id: Option<&str>,
        now: Timestamp,
    ) -> Result<(), RegistrationError> {
        let mut profile = Profile::new(pending.user_id.clone(), pending.email.clone(), now);
        profile.stripe_customer_id = customer_id.map(str::to_string);
        self.profiles.create(&profile).await.map_err(persistence)?;

        if let Some(verification_id) = &pending.phone_verification_id {
            let consumed = self
                .pending
                .consume_phone_verification(verification_id)
                .await
                .map_err(persistence)?;
            if !consumed {
                tracing::warn!(
                    verification_id = %verification_id,
                    "Phone verification was already consumed"
                );
            }
        }

        self.pending
            .delete(&pending.token)
            .await
            .map_err(persistence)
    }

    fn decrypt(&self, stored: &str) -> Result<SecretString, RegistrationError> {
        match self.cipher.decrypt(stored) {
            Ok(password) => Ok(password),
            Err(err) if self.allow_legacy_plaintext => {
                tracing::warn!(error = %err, "Using stored password as legacy plaintext");
                Ok(SecretString::new(stored.to_string()))
            }
            Err(err) => Err(RegistrationError::CredentialsUnreadable(err.to_string())),
        }
    }
}

fn persistence(err: impl std::fmt::Display) -> RegistrationError {
    RegistrationError::Persistence(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::crypto::AesCredentialCipher;
    use crate::adapters::memory::{
        InMemoryAccountRepository, InMemoryPendingRegistrationRepository,
        InMemoryProfileRepository,
    };

    struct Fixture {
        pending: Arc<InMemoryPendingRegistrationRepository>,
        accounts: Arc<InMemoryAccountRepository>,
        profiles: Arc<InMemoryProfileRepository>,
        cipher: Arc<AesCredentialCipher>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                pending: Arc::new(InMemoryPendingRegistrationRepository::new()),
                accounts: Arc::new(InMemoryAccountRepository::new()),
                profiles: Arc::new(InMemoryProfileRepository::new()),
                cipher: Arc::new(AesCredentialCipher::new([3u8; 32])),
            }
        }

        fn handler(&self) -> CompleteRegistrationHandler {
            CompleteRegistrationHandler::new(
                self.pending.clone(),
                self.accounts.clone(),
                self.profiles.clone(),
                self.cipher.clone(),
            )
        }

        fn seed(&self, ttl_hours: i64) -> PendingRegistration {
            let encrypted = self
                .cipher
                .encrypt(&SecretString::new("Motdepasse!1".into()))
                .unwrap();
            let pending = PendingRegistration::new(
                RegistrationToken::generate(),
                "marie@exemple.fr",
                encrypted,
                Some("pv_1".into()),
                ttl_hours,
                Timestamp::now(),
            );
            self.pending.verify_phone("pv_1");
            self.pending.insert(pending.clone());
            pending
        }
    }

    fn cmd(pending: &PendingRegistration) -> CompleteRegistrationCommand {
        CompleteRegistrationCommand {
            token: pending.token.clone(),
            email_hint: Some("Marie@Exemple.fr".into()),
            customer_id: Some("cus_1".into()),
        }
    }

    #[tokio::test]
    async fn creates_account_profile_and_consumes_everything() {
        let f = Fixture::new();
        let pending = f.seed(24);

        let outcome = f.handler().handle(cmd(&pending)).await.unwrap();

        assert!(outcome.is_new_account());
        assert_eq!(outcome.user_id(), &pending.user_id);
        assert_eq!(f.accounts.count(), 1);
        let profile = f.profiles.get(outcome.user_id()).unwrap();
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_1"));
        assert!(f.pending.is_consumed("pv_1"));
        assert!(!f.pending.contains(&pending.token));
    }

    #[tokio::test]
    async fn replay_after_success_returns_existing_account() {
        let f = Fixture::new();
        let pending = f.seed(24);
        let first = f.handler().handle(cmd(&pending)).await.unwrap();

        let second = f.handler().handle(cmd(&pending)).await.unwrap();

        assert_eq!(
            second,
            RegistrationOutcome::AlreadyRegistered {
                user_id: first.user_id().clone()
            }
        );
        assert_eq!(f.accounts.count(), 1);
    }

    #[tokio::test]
    async fn unknown_token_without_account_is_rejected() {
        let f = Fixture::new();
        let result = f
            .handler()
            .handle(CompleteRegistrationCommand {
                token: RegistrationToken::generate(),
                email_hint: None,
                customer_id: Some("cus_1".into()),
            })
            .await;
        assert!(matches!(result, Err(RegistrationError::TokenNotFound)));
    }

    #[tokio::test]
    async fn expired_registration_is_rejected() {
        let f = Fixture::new();
        let pending = f.seed(0);

        let result = f.handler().handle(cmd(&pending)).await;

        assert!(matches!(result, Err(RegistrationError::Expired)));
        assert_eq!(f.accounts.count(), 0);
    }

    #[tokio::test]
    async fn account_created_by_this_token_is_resumed() {
        let f = Fixture::new();
        let pending = f.seed(24);
        f.accounts.insert("marie@exemple.fr", pending.user_id.clone());

        let outcome = f.handler().handle(cmd(&pending)).await.unwrap();

        assert_eq!(
            outcome,
            RegistrationOutcome::AlreadyRegistered {
                user_id: pending.user_id.clone()
            }
        );
        assert!(f.profiles.get(&pending.user_id).is_some());
        assert!(!f.pending.contains(&pending.token));
    }

    #[tokio::test]
    async fn someone_elses_account_is_never_taken_over() {
        let f = Fixture::new();
        let pending = f.seed(24);
        let victim = UserId::new("victim-user").unwrap();
        f.accounts.insert("marie@exemple.fr", victim.clone());
        let mut profile = Profile::new(victim.clone(), "marie@exemple.fr", Timestamp::now());
        profile.stripe_customer_id = Some("cus_victim".into());
        f.profiles.insert(profile);

        let mut attacker = cmd(&pending);
        attacker.customer_id = Some("cus_attacker".into());
        let result = f.handler().handle(attacker).await;

        assert!(matches!(result, Err(RegistrationError::AccountConflict)));
        assert!(result.unwrap_err().is_invalid_token());
        let profile = f.profiles.get(&victim).unwrap();
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_victim"));
        assert!(!f.pending.is_consumed("pv_1"));
    }

    #[tokio::test]
    async fn expired_token_cannot_claim_an_existing_account() {
        let f = Fixture::new();
        let pending = f.seed(0);
        f.accounts
            .insert("marie@exemple.fr", UserId::new("victim-user").unwrap());

        let result = f.handler().handle(cmd(&pending)).await;

        assert!(matches!(result, Err(RegistrationError::AccountConflict)));
    }

    #[tokio::test]
    async fn replay_from_another_customer_is_rejected() {
        let f = Fixture::new();
        let pending = f.seed(24);
        f.handler().handle(cmd(&pending)).await.unwrap();

        let mut replay = cmd(&pending);
        replay.customer_id = Some("cus_attacker".into());
        let result = f.handler().handle(replay).await;

        assert!(matches!(result, Err(RegistrationError::AccountConflict)));
    }

    #[tokio::test]
    async fn reused_phone_verification_still_completes() {
        let f = Fixture::new();
        let pending = f.seed(24);
        f.pending.consume_phone_verification("pv_1").await.unwrap();

        let outcome = f.handler().handle(cmd(&pending)).await.unwrap();

        assert!(outcome.is_new_account());
        assert!(!f.pending.contains(&pending.token));
    }

    #[tokio::test]
    async fn undecryptable_password_is_rejected_by_default() {
        let f = Fixture::new();
        let pending = PendingRegistration::new(
            RegistrationToken::generate(),
            "marie@exemple.fr",
            "plain-password",
            None,
            24,
            Timestamp::now(),
        );
        f.pending.insert(pending.clone());

        let result = f.handler().handle(cmd(&pending)).await;

        assert!(matches!(
            result,
            Err(RegistrationError::CredentialsUnreadable(_))
        ));
        assert_eq!(f.accounts.count(), 0);
    }

    #[tokio::test]
    async fn legacy_plaintext_is_accepted_when_enabled() {
        let f = Fixture::new();
        let pending = PendingRegistration::new(
            RegistrationToken::generate(),
            "marie@exemple.fr",
            "plain-password",
            None,
            24,
            Timestamp::now(),
        );
        f.pending.insert(pending.clone());

        let outcome = f
            .handler()
            .with_legacy_plaintext(true)
            .handle(cmd(&pending))
            .await
            .unwrap();
        assert!(outcome.is_new_account());
    }

    #[tokio::test]
    async fn profile_failure_is_persistence_and_retry_completes() {
        let f = Fixture::new();
        let pending = f.seed(24);
        f.profiles.fail_next_writes(1);

        let first = f.handler().handle(cmd(&pending)).await;
        assert!(matches!(first, Err(RegistrationError::Persistence(_))));
        assert!(f.pending.contains(&pending.token));

        let second = f.handler().handle(cmd(&pending)).await.unwrap();
        assert!(!second.is_new_account());
        assert_eq!(second.user_id(), &pending.user_id);
        assert!(f.profiles.get(second.user_id()).is_some());
        assert!(!f.pending.contains(&pending.token));
        assert_eq!(f.accounts.count(), 1);
    }
}
