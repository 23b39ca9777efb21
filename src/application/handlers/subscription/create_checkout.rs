//! CreateCheckoutHandler - opens a Stripe Checkout session.
//!
//! Seeds the metadata the reconciler relies on later: `user_id` for known
//! users, `registration_token` for people who do not have an account yet.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::registration::{PendingRegistration, RegistrationToken};
use crate::domain::subscription::{
    PlanType, SubscriptionError, SubscriptionMetadata, SubscriptionRecord,
};
use crate::domain::user::{normalize_email, Profile};
use crate::ports::{
    AccountRepository, BillingProvider, CheckoutSessionRequest, CredentialCipher,
    PendingRegistrationRepository, ProfileRepository, SubscriptionRepository,
};

const MIN_PASSWORD_LEN: usize = 8;

/// Prices, URLs and TTLs used when opening sessions.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub trial_price_id: String,
    pub direct_price_id: String,
    pub trial_period_days: u32,
    pub success_url: String,
    pub cancel_url: String,
    pub registration_ttl_hours: i64,
}

/// Who is checking out.
#[derive(Debug, Clone)]
pub enum CheckoutCustomer {
    /// A signed-in user.
    Existing { user_id: UserId, email: String },
    /// Someone registering; the account is created once payment completes.
    New {
        email: String,
        password: SecretString,
        phone_verification_id: String,
    },
}

/// Command to open a checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutCommand {
    pub customer: CheckoutCustomer,
    pub plan_type: PlanType,
    pub is_upgrade: bool,
}

/// The session the client should be redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutResult {
    pub session_id: String,
    pub checkout_url: String,
}

/// Handler for checkout initiation.
pub struct CreateCheckoutHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    profiles: Arc<dyn ProfileRepository>,
    accounts: Arc<dyn AccountRepository>,
    pending: Arc<dyn PendingRegistrationRepository>,
    cipher: Arc<dyn CredentialCipher>,
    billing: Arc<dyn BillingProvider>,
    settings: CheckoutSettings,
}

impl CreateCheckoutHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        profiles: Arc<dyn ProfileRepository>,
        accounts: Arc<dyn AccountRepository>,
        pending: Arc<dyn PendingRegistrationRepository>,
        cipher: Arc<dyn CredentialCipher>,
        billing: Arc<dyn BillingProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            subscriptions,
            profiles,
            accounts,
            pending,
            cipher,
            billing,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutCommand,
    ) -> Result<CreateCheckoutResult, SubscriptionError> {
        let now = Timestamp::now();
        let price_id = self.price_for(cmd.plan_type, cmd.is_upgrade).to_string();
        let trial_period_days = (cmd.plan_type == PlanType::Trial && !cmd.is_upgrade)
            .then_some(self.settings.trial_period_days);

        let mut metadata = SubscriptionMetadata {
            plan_type: Some(cmd.plan_type.as_str().to_string()),
            is_upgrade: cmd.is_upgrade,
            ..Default::default()
        };

        let request = match cmd.customer {
            CheckoutCustomer::Existing { user_id, email } => {
                let customer_id = self.ensure_customer(&user_id, &email, now).await?;

                let seeded = self
                    .subscriptions
                    .insert_if_absent(&SubscriptionRecord::pending(
                        user_id.clone(),
                        customer_id.clone(),
                        Some(price_id.clone()),
                        cmd.plan_type,
                        now,
                    ))
                    .await?;
                if seeded {
                    tracing::debug!(user_id = %user_id, "Seeded pending subscription row");
                }

                metadata.user_id = Some(user_id.to_string());
                CheckoutSessionRequest {
                    customer_id: Some(customer_id),
                    customer_email: None,
                    price_id,
                    client_reference_id: Some(user_id.to_string()),
                    metadata,
                    trial_period_days,
                    success_url: self.settings.success_url.clone(),
                    cancel_url: self.settings.cancel_url.clone(),
                }
            }
            CheckoutCustomer::New {
                email,
                password,
                phone_verification_id,
            } => {
                let email = normalize_email(&email)
                    .map_err(|e| SubscriptionError::validation("email", e.to_string()))?;
                if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
                    return Err(SubscriptionError::validation(
                        "password",
                        format!("must be at least {} characters", MIN_PASSWORD_LEN),
                    ));
                }
                self.check_phone_verification(&phone_verification_id).await?;
                if self.accounts.find_by_email(&email).await?.is_some() {
                    return Err(SubscriptionError::validation(
                        "email",
                        "an account already exists for this email, sign in to subscribe",
                    ));
                }

                let encrypted = self
                    .cipher
                    .encrypt(&password)
                    .map_err(|e| SubscriptionError::infrastructure(e.to_string()))?;
                let token = RegistrationToken::generate();
                let pending = PendingRegistration::new(
                    token.clone(),
                    email.clone(),
                    encrypted,
                    Some(phone_verification_id.trim().to_string()),
                    self.settings.registration_ttl_hours,
                    now,
                );
                self.purge_expired(now).await;
                self.pending.save(&pending).await?;
                tracing::info!(expires_at = %pending.expires_at, "Pending registration stored");

                metadata.registration_token = Some(token.as_str().to_string());
                CheckoutSessionRequest {
                    customer_id: None,
                    customer_email: Some(email),
                    price_id,
                    client_reference_id: None,
                    metadata,
                    trial_period_days,
                    success_url: self.settings.success_url.clone(),
                    cancel_url: self.settings.cancel_url.clone(),
                }
            }
        };

        let session = self.billing.create_checkout_session(request).await?;
        tracing::info!(
            session_id = %session.id,
            plan_type = cmd.plan_type.as_str(),
            is_upgrade = cmd.is_upgrade,
            "Checkout session created"
        );

        Ok(CreateCheckoutResult {
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    fn price_for(&self, plan_type: PlanType, is_upgrade: bool) -> &str {
        match plan_type {
            PlanType::Direct => &self.settings.direct_price_id,
            PlanType::Trial if is_upgrade => &self.settings.direct_price_id,
            PlanType::Trial => &self.settings.trial_price_id,
        }
    }

    /// Only a verified phone check that no registration has used yet may
    /// seed a new one.
    async fn check_phone_verification(&self, verification_id: &str) -> Result<(), SubscriptionError> {
        let verification_id = verification_id.trim();
        if verification_id.is_empty() {
            return Err(SubscriptionError::validation(
                "phone_verification_id",
                "phone verification is required",
            ));
        }

        match self.pending.find_phone_verification(verification_id).await? {
            Some(verification) if verification.is_usable() => Ok(()),
            Some(verification) if verification.consumed_at.is_some() => {
                Err(SubscriptionError::validation(
                    "phone_verification_id",
                    "phone verification has already been used",
                ))
            }
            _ => Err(SubscriptionError::validation(
                "phone_verification_id",
                "phone number has not been verified",
            )),
        }
    }

    /// Abandoned checkouts leave expired rows behind. Failure here must not
    /// block a new registration.
    async fn purge_expired(&self, now: Timestamp) {
        match self.pending.delete_expired(now).await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Purged expired pending registrations"),
            Err(err) => tracing::warn!(error = %err, "Could not purge expired pending registrations"),
        }
    }

    /// Returns the user's provider customer, creating one if needed, and
    /// records it on the profile.
    async fn ensure_customer(
        &self,
        user_id: &UserId,
        email: &str,
        now: Timestamp,
    ) -> Result<String, SubscriptionError> {
        let profile = match self.profiles.find_by_id(user_id).await? {
            Some(profile) => profile,
            None => {
                let profile = Profile::new(user_id.clone(), email, now);
                self.profiles.create(&profile).await?;
                profile
            }
        };
        if let Some(customer_id) = profile.stripe_customer_id {
            return Ok(customer_id);
        }

        let stored = self
            .subscriptions
            .find_by_user_id(user_id)
            .await?
            .and_then(|row| row.billing_customer_id);
        let customer_id = match stored {
            Some(customer_id) => customer_id,
            None => match self.billing.find_customer_by_email(email).await? {
                Some(customer_id) => customer_id,
                None => self.billing.create_customer(email, Some(user_id)).await?,
            },
        };

        self.profiles
            .set_stripe_customer_id(user_id, &customer_id)
            .await?;
        tracing::info!(user_id = %user_id, customer_id = %customer_id, "Customer attached to profile");
        Ok(customer_id)
    }
}
