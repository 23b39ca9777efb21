//! HandleBillingWebhookHandler - Command handler for Stripe webhooks.
//!
//! Verifies the signature before anything else, then routes the four handled
//! event types into the reconciler. Failures after verification are
//! acknowledged with [`WebhookOutcome::Deferred`] so the provider does not
//! hammer a degraded database; token problems are rejected outright.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::foundation::UserId;
use crate::domain::registration::{RegistrationOutcome, RegistrationToken};
use crate::domain::subscription::{
    metadata_keys, StripeCheckoutSession, StripeEvent, StripeEventType, StripeInvoice,
    StripeSubscription, StripeWebhookVerifier, SubscriptionError, WebhookError,
};
use crate::ports::{BillingProvider, ProfileRepository, SubscriptionRepository};

use super::reconcile::{
    ReconcileOutcome, ReconcileRequest, SubscriptionHint, SubscriptionReconciler,
};
use crate::application::handlers::registration::{
    CompleteRegistrationCommand, CompleteRegistrationHandler,
};

/// Every registration step is idempotent, so a failed exchange is re-run
/// from the top once before the delivery is deferred.
const REGISTRATION_ATTEMPTS: u32 = 2;

/// Command to handle a webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header, if present.
    pub signature: Option<String>,
}

/// How an accepted delivery was handled. Always acknowledged with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// State was reconciled.
    Processed,
    /// Event type not handled.
    Ignored,
    /// A write or provider call failed; the next delivery or a sync converges.
    Deferred,
    /// Nothing to act on (no resolvable user, or a stale payload).
    Skipped,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleBillingWebhookResult {
    pub event_id: String,
    pub event_type: String,
    pub outcome: WebhookOutcome,
}

/// Handler for Stripe webhook deliveries.
pub struct HandleBillingWebhookHandler {
    verifier: StripeWebhookVerifier,
    reconciler: Arc<SubscriptionReconciler>,
    registrations: Arc<CompleteRegistrationHandler>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    profiles: Arc<dyn ProfileRepository>,
    billing: Arc<dyn BillingProvider>,
}

impl HandleBillingWebhookHandler {
    pub fn new(
        verifier: StripeWebhookVerifier,
        reconciler: Arc<SubscriptionReconciler>,
        registrations: Arc<CompleteRegistrationHandler>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        profiles: Arc<dyn ProfileRepository>,
        billing: Arc<dyn BillingProvider>,
    ) -> Self {
        Self {
            verifier,
            reconciler,
            registrations,
            subscriptions,
            profiles,
            billing,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<HandleBillingWebhookResult, WebhookError> {
        // 1. Verify signature and parse, before touching any repository
        let signature = cmd.signature.ok_or(WebhookError::MissingSignature)?;
        let event = self.verifier.verify_and_parse(&cmd.payload, &signature)?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            livemode = event.livemode,
            "Webhook received"
        );

        // 2. Dispatch
        let outcome = match event.parsed_type() {
            StripeEventType::CheckoutSessionCompleted => self.checkout_completed(&event).await?,
            StripeEventType::CustomerSubscriptionUpdated => {
                self.subscription_changed(&event, false).await?
            }
            StripeEventType::CustomerSubscriptionDeleted => {
                self.subscription_changed(&event, true).await?
            }
            StripeEventType::InvoicePaymentSucceeded => self.invoice_paid(&event).await?,
            StripeEventType::Unknown => {
                tracing::info!(event_type = %event.event_type, "Unhandled webhook event type");
                WebhookOutcome::Ignored
            }
        };

        Ok(HandleBillingWebhookResult {
            event_id: event.id,
            event_type: event.event_type,
            outcome,
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event handlers
    // ════════════════════════════════════════════════════════════════════════════

    async fn checkout_completed(&self, event: &StripeEvent) -> Result<WebhookOutcome, WebhookError> {
        let session: StripeCheckoutSession = event.deserialize_object()?;
        let customer_id = session
            .customer
            .clone()
            .ok_or(WebhookError::MissingField("customer"))?;
        let metadata = session.metadata();

        let known = parse_user(metadata.user_id.as_deref())
            .or_else(|| parse_user(session.client_reference_id.as_deref()));
        let resolved = match known {
            Some(user_id) => Some(user_id),
            None => {
                match self
                    .lookup_user(session.subscription.as_deref(), &customer_id)
                    .await
                {
                    Ok(found) => found,
                    Err(err) => return Ok(deferred(&event.id, &err)),
                }
            }
        };

        let user_id = match (resolved, metadata.registration_token.as_deref()) {
            (Some(user_id), _) => user_id,
            (None, Some(token)) => {
                let token = RegistrationToken::new(token)
                    .map_err(|e| WebhookError::InvalidRegistration(e.to_string()))?;
                let command = CompleteRegistrationCommand {
                    token,
                    email_hint: session.email().map(str::to_string),
                    customer_id: Some(customer_id.clone()),
                };
                let outcome = match self.register(&event.id, command).await? {
                    Some(outcome) => outcome,
                    None => return Ok(WebhookOutcome::Deferred),
                };

                let user_id = outcome.user_id().clone();
                if let Some(subscription_id) = &session.subscription {
                    self.tag_subscription(subscription_id, &user_id).await;
                }
                user_id
            }
            (None, None) => {
                tracing::warn!(
                    event_id = %event.id,
                    customer_id = %customer_id,
                    "Checkout completed without a resolvable user"
                );
                return Ok(WebhookOutcome::Skipped);
            }
        };

        if let Err(err) = self
            .profiles
            .set_stripe_customer_id(&user_id, &customer_id)
            .await
        {
            tracing::warn!(user_id = %user_id, error = %err, "Could not record customer on profile");
        }

        Ok(self
            .run(
                event,
                ReconcileRequest {
                    user_id,
                    customer_id,
                    hint: None,
                },
            )
            .await)
    }

    async fn subscription_changed(
        &self,
        event: &StripeEvent,
        deleted: bool,
    ) -> Result<WebhookOutcome, WebhookError> {
        let object: StripeSubscription = event.deserialize_object()?;
        let subscription = object.to_billing()?;

        let user_id = match parse_user(subscription.metadata.user_id.as_deref()) {
            Some(user_id) => Some(user_id),
            None => match self
                .lookup_user(Some(&subscription.id), &subscription.customer_id)
                .await
            {
                Ok(found) => found,
                Err(err) => return Ok(deferred(&event.id, &err)),
            },
        };
        let Some(user_id) = user_id else {
            tracing::warn!(
                event_id = %event.id,
                subscription_id = %subscription.id,
                "Subscription event for unknown user"
            );
            return Ok(WebhookOutcome::Skipped);
        };

        let customer_id = subscription.customer_id.clone();
        Ok(self
            .run(
                event,
                ReconcileRequest {
                    user_id,
                    customer_id,
                    hint: Some(SubscriptionHint {
                        subscription,
                        deleted,
                    }),
                },
            )
            .await)
    }

    async fn invoice_paid(&self, event: &StripeEvent) -> Result<WebhookOutcome, WebhookError> {
        let invoice: StripeInvoice = event.deserialize_object()?;
        let (Some(customer_id), Some(subscription_id)) = (invoice.customer, invoice.subscription)
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        let from_metadata = invoice
            .metadata
            .get(metadata_keys::USER_ID)
            .and_then(|id| parse_user(Some(id)));
        let user_id = match from_metadata {
            Some(user_id) => Some(user_id),
            None => match self.lookup_user(Some(&subscription_id), &customer_id).await {
                Ok(found) => found,
                Err(err) => return Ok(deferred(&event.id, &err)),
            },
        };
        let Some(user_id) = user_id else {
            tracing::warn!(event_id = %event.id, customer_id = %customer_id, "Invoice for unknown user");
            return Ok(WebhookOutcome::Skipped);
        };

        Ok(self
            .run(
                event,
                ReconcileRequest {
                    user_id,
                    customer_id,
                    hint: None,
                },
            )
            .await)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════════

    /// Runs the registration exchange, retrying a failed write once. `None`
    /// means the delivery is acknowledged as deferred.
    async fn register(
        &self,
        event_id: &str,
        command: CompleteRegistrationCommand,
    ) -> Result<Option<RegistrationOutcome>, WebhookError> {
        let mut attempt = 1;
        loop {
            match self.registrations.handle(command.clone()).await {
                Ok(outcome) => return Ok(Some(outcome)),
                Err(err) if err.is_invalid_token() => {
                    tracing::warn!(event_id, error = %err, "Registration rejected");
                    return Err(WebhookError::InvalidRegistration(err.to_string()));
                }
                Err(err) if attempt < REGISTRATION_ATTEMPTS => {
                    tracing::warn!(event_id, attempt, error = %err, "Registration failed, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(event_id, error = %err, "Registration deferred");
                    return Ok(None);
                }
            }
        }
    }

    async fn run(&self, event: &StripeEvent, request: ReconcileRequest) -> WebhookOutcome {
        match self.reconciler.reconcile(request).await {
            Ok(ReconcileOutcome::Persisted { .. }) => WebhookOutcome::Processed,
            Ok(ReconcileOutcome::PersistenceDeferred { .. }) => WebhookOutcome::Deferred,
            Ok(ReconcileOutcome::NothingToReconcile) | Ok(ReconcileOutcome::Skipped { .. }) => {
                WebhookOutcome::Skipped
            }
            Err(err) => deferred(&event.id, &err),
        }
    }

    /// Stored subscription row by id, then by customer, then the profile.
    async fn lookup_user(
        &self,
        subscription_id: Option<&str>,
        customer_id: &str,
    ) -> Result<Option<UserId>, SubscriptionError> {
        if let Some(subscription_id) = subscription_id {
            if let Some(row) = self
                .subscriptions
                .find_by_billing_subscription_id(subscription_id)
                .await?
            {
                return Ok(Some(row.user_id));
            }
        }

        if let Some(row) = self.subscriptions.find_by_customer_id(customer_id).await? {
            return Ok(Some(row.user_id));
        }

        Ok(self
            .profiles
            .find_by_customer_id(customer_id)
            .await?
            .map(|p| p.id))
    }

    /// Writes the new account's id onto the subscription metadata so later
    /// events resolve the user directly.
    async fn tag_subscription(&self, subscription_id: &str, user_id: &UserId) {
        let mut metadata = HashMap::new();
        metadata.insert(metadata_keys::USER_ID.to_string(), user_id.to_string());

        if let Err(err) = self
            .billing
            .update_subscription_metadata(subscription_id, metadata)
            .await
        {
            tracing::warn!(
                subscription_id,
                user_id = %user_id,
                error = %err,
                "Could not write user id onto subscription metadata"
            );
        }
    }
}

fn parse_user(raw: Option<&str>) -> Option<UserId> {
    raw.and_then(|id| UserId::new(id).ok())
}

fn deferred(event_id: &str, err: &SubscriptionError) -> WebhookOutcome {
    tracing::error!(event_id, error = %err, "Webhook processing deferred");
    WebhookOutcome::Deferred
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use secrecy::SecretString;

    use crate::adapters::crypto::AesCredentialCipher;
    use crate::adapters::memory::{
        InMemoryAccountRepository, InMemoryPendingRegistrationRepository,
        InMemoryProfileRepository, InMemorySubscriptionRepository,
    };
    use crate::adapters::stripe::MockBillingProvider;
    use crate::domain::foundation::Timestamp;
    use crate::domain::registration::PendingRegistration;
    use crate::domain::subscription::{
        sign_payload, BillingStatus, BillingSubscription, PlanType, SubscriptionMetadata,
        SubscriptionStatus,
    };
    use crate::domain::user::Profile;
    use crate::ports::{BillingError, CredentialCipher};

    const SECRET: &str = "whsec_test_secret";

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        subscriptions: Arc<InMemorySubscriptionRepository>,
        profiles: Arc<InMemoryProfileRepository>,
        pending: Arc<InMemoryPendingRegistrationRepository>,
        accounts: Arc<InMemoryAccountRepository>,
        cipher: Arc<AesCredentialCipher>,
        billing: Arc<MockBillingProvider>,
        handler: HandleBillingWebhookHandler,
    }

    fn fixture() -> Fixture {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let profiles = Arc::new(InMemoryProfileRepository::new());
        let pending = Arc::new(InMemoryPendingRegistrationRepository::new());
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let cipher = Arc::new(AesCredentialCipher::new([9u8; 32]));
        let billing = Arc::new(MockBillingProvider::new());

        let reconciler = Arc::new(SubscriptionReconciler::new(
            subscriptions.clone(),
            profiles.clone(),
            billing.clone(),
        ));
        let registrations = Arc::new(CompleteRegistrationHandler::new(
            pending.clone(),
            accounts.clone(),
            profiles.clone(),
            cipher.clone(),
        ));
        let handler = HandleBillingWebhookHandler::new(
            StripeWebhookVerifier::new(SecretString::new(SECRET.into())),
            reconciler,
            registrations,
            subscriptions.clone(),
            profiles.clone(),
            billing.clone(),
        );

        Fixture {
            subscriptions,
            profiles,
            pending,
            accounts,
            cipher,
            billing,
            handler,
        }
    }

    fn signed(event: serde_json::Value) -> HandleBillingWebhookCommand {
        let payload = event.to_string();
        let signature = sign_payload(SECRET, chrono::Utc::now().timestamp(), &payload);
        HandleBillingWebhookCommand {
            payload: payload.into_bytes(),
            signature: Some(signature),
        }
    }

    fn event(event_type: &str, object: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
            "type": event_type,
            "created": chrono::Utc::now().timestamp(),
            "livemode": false,
            "data": { "object": object }
        })
    }

    fn trial_subscription(user: Option<&str>) -> BillingSubscription {
        let now = Timestamp::now();
        BillingSubscription {
            id: "sub_t".into(),
            customer_id: "cus_1".into(),
            status: BillingStatus::Trialing,
            price_id: Some("price_trial".into()),
            trial_end: Some(now.add_days(3)),
            current_period_end: Some(now.add_days(3)),
            created: now,
            metadata: SubscriptionMetadata {
                user_id: user.map(str::to_string),
                plan_type: Some("trial".into()),
                ..Default::default()
            },
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Verification
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn missing_signature_is_rejected_before_any_lookup() {
        let f = fixture();

        let err = f
            .handler
            .handle(HandleBillingWebhookCommand {
                payload: b"{}".to_vec(),
                signature: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::MissingSignature));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(f.billing.calls().is_empty());
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let f = fixture();
        let mut cmd = signed(event("invoice.payment_succeeded", serde_json::json!({"id": "in_1"})));
        cmd.signature = Some(sign_payload("whsec_other", chrono::Utc::now().timestamp(), "{}"));

        let err = f.handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }

    #[tokio::test]
    async fn unknown_event_type_is_ignored() {
        let f = fixture();
        let result = f
            .handler
            .handle(signed(event("customer.created", serde_json::json!({"id": "cus_1"}))))
            .await
            .unwrap();

        assert_eq!(result.outcome, WebhookOutcome::Ignored);
        assert_eq!(result.event_type, "customer.created");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn checkout_for_known_user_reconciles() {
        let f = fixture();
        f.profiles
            .insert(Profile::new(UserId::new("user-1").unwrap(), "a@b.fr", Timestamp::now()));
        f.billing.put_subscription(trial_subscription(Some("user-1")));

        let result = f
            .handler
            .handle(signed(event(
                "checkout.session.completed",
                serde_json::json!({
                    "id": "cs_1",
                    "customer": "cus_1",
                    "subscription": "sub_t",
                    "client_reference_id": "user-1",
                    "metadata": {"plan_type": "trial"}
                }),
            )))
            .await
            .unwrap();

        assert_eq!(result.outcome, WebhookOutcome::Processed);
        let row = f.subscriptions.get(&UserId::new("user-1").unwrap()).unwrap();
        assert_eq!(row.status, SubscriptionStatus::Trialing);
        let profile = f.profiles.get(&UserId::new("user-1").unwrap()).unwrap();
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn checkout_with_registration_token_creates_account_once() {
        let f = fixture();
        let encrypted = f
            .cipher
            .encrypt(&SecretString::new("Motdepasse!1".into()))
            .unwrap();
        let pending = PendingRegistration::new(
            RegistrationToken::generate(),
            "marie@exemple.fr",
            encrypted,
            Some("pv_9".into()),
            24,
            Timestamp::now(),
        );
        f.pending.verify_phone("pv_9");
        f.pending.insert(pending.clone());
        f.billing.put_subscription(trial_subscription(None));

        let checkout = event(
            "checkout.session.completed",
            serde_json::json!({
                "id": "cs_1",
                "customer": "cus_1",
                "subscription": "sub_t",
                "customer_details": {"email": "marie@exemple.fr"},
                "metadata": {
                    "plan_type": "trial",
                    "registration_token": pending.token.as_str()
                }
            }),
        );

        let first = f.handler.handle(signed(checkout.clone())).await.unwrap();
        let second = f.handler.handle(signed(checkout)).await.unwrap();

        assert_eq!(first.outcome, WebhookOutcome::Processed);
        assert_eq!(second.outcome, WebhookOutcome::Processed);
        assert_eq!(f.accounts.count(), 1);
        assert!(f.pending.is_consumed("pv_9"));

        let tagged = f.billing.subscription("sub_t").unwrap();
        let user_id = UserId::new(tagged.metadata.user_id.unwrap()).unwrap();
        let row = f.subscriptions.get(&user_id).unwrap();
        assert_eq!(row.plan_type, PlanType::Trial);
        assert_eq!(row.status, SubscriptionStatus::Trialing);
    }

    #[tokio::test]
    async fn unknown_registration_token_is_rejected() {
        let f = fixture();
        let err = f
            .handler
            .handle(signed(event(
                "checkout.session.completed",
                serde_json::json!({
                    "id": "cs_1",
                    "customer": "cus_1",
                    "metadata": {"registration_token": "deadbeef"}
                }),
            )))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::InvalidRegistration(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    fn seed_registration(f: &Fixture, email: &str) -> PendingRegistration {
        let encrypted = f
            .cipher
            .encrypt(&SecretString::new("Motdepasse!1".into()))
            .unwrap();
        let pending = PendingRegistration::new(
            RegistrationToken::generate(),
            email,
            encrypted,
            None,
            24,
            Timestamp::now(),
        );
        f.pending.insert(pending.clone());
        pending
    }

    fn registration_checkout(pending: &PendingRegistration, customer: &str) -> serde_json::Value {
        event(
            "checkout.session.completed",
            serde_json::json!({
                "id": "cs_1",
                "customer": customer,
                "subscription": "sub_t",
                "customer_details": {"email": pending.email},
                "metadata": {
                    "plan_type": "trial",
                    "registration_token": pending.token.as_str()
                }
            }),
        )
    }

    #[tokio::test]
    async fn registration_for_someone_elses_email_cannot_take_over_their_subscription() {
        let f = fixture();
        let victim = UserId::new("victim-user").unwrap();
        f.accounts.insert("victim@exemple.fr", victim.clone());
        let mut profile = Profile::new(victim.clone(), "victim@exemple.fr", Timestamp::now());
        profile.stripe_customer_id = Some("cus_victim".into());
        f.profiles.insert(profile);
        let mut row = crate::domain::subscription::SubscriptionRecord::pending(
            victim.clone(),
            "cus_victim",
            Some("price_direct".into()),
            PlanType::Direct,
            Timestamp::now(),
        );
        row.status = SubscriptionStatus::Active;
        row.billing_subscription_id = Some("sub_victim".into());
        f.subscriptions.insert(row);

        let pending = seed_registration(&f, "victim@exemple.fr");
        let mut attacker = trial_subscription(None);
        attacker.id = "sub_attacker".into();
        attacker.customer_id = "cus_attacker".into();
        f.billing.put_subscription(attacker);

        let mut checkout = registration_checkout(&pending, "cus_attacker");
        checkout["data"]["object"]["subscription"] = serde_json::json!("sub_attacker");
        let err = f.handler.handle(signed(checkout)).await.unwrap_err();

        assert!(matches!(err, WebhookError::InvalidRegistration(_)));
        let row = f.subscriptions.get(&victim).unwrap();
        assert_eq!(row.billing_subscription_id.as_deref(), Some("sub_victim"));
        assert_eq!(row.plan_type, PlanType::Direct);
        assert_eq!(row.status, SubscriptionStatus::Active);
        let profile = f.profiles.get(&victim).unwrap();
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_victim"));
    }

    #[tokio::test]
    async fn registration_write_failure_is_retried_inline() {
        let f = fixture();
        let pending = seed_registration(&f, "marie@exemple.fr");
        f.billing.put_subscription(trial_subscription(None));
        f.accounts.fail_next_writes(1);

        let result = f
            .handler
            .handle(signed(registration_checkout(&pending, "cus_1")))
            .await
            .unwrap();

        assert_eq!(result.outcome, WebhookOutcome::Processed);
        assert_eq!(f.accounts.count(), 1);
        let row = f.subscriptions.get(&pending.user_id).unwrap();
        assert_eq!(row.status, SubscriptionStatus::Trialing);
        assert!(!f.pending.contains(&pending.token));
    }

    #[tokio::test]
    async fn registration_that_keeps_failing_is_deferred_and_redelivery_completes() {
        let f = fixture();
        let pending = seed_registration(&f, "marie@exemple.fr");
        f.billing.put_subscription(trial_subscription(None));
        f.accounts.fail_next_writes(2);

        let first = f
            .handler
            .handle(signed(registration_checkout(&pending, "cus_1")))
            .await
            .unwrap();
        assert_eq!(first.outcome, WebhookOutcome::Deferred);
        assert_eq!(f.accounts.count(), 0);
        assert!(f.pending.contains(&pending.token));

        let second = f
            .handler
            .handle(signed(registration_checkout(&pending, "cus_1")))
            .await
            .unwrap();
        assert_eq!(second.outcome, WebhookOutcome::Processed);
        assert_eq!(f.accounts.count(), 1);
    }

    #[tokio::test]
    async fn checkout_without_user_or_token_is_skipped() {
        let f = fixture();
        let result = f
            .handler
            .handle(signed(event(
                "checkout.session.completed",
                serde_json::json!({"id": "cs_1", "customer": "cus_404"}),
            )))
            .await
            .unwrap();
        assert_eq!(result.outcome, WebhookOutcome::Skipped);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscription and invoice events
    // ════════════════════════════════════════════════════════════════════════════

    fn subscription_object(status: &str, user: Option<&str>) -> serde_json::Value {
        let now = chrono::Utc::now().timestamp();
        let mut metadata = serde_json::json!({"plan_type": "trial"});
        if let Some(user) = user {
            metadata["user_id"] = serde_json::json!(user);
        }
        serde_json::json!({
            "id": "sub_t",
            "customer": "cus_1",
            "status": status,
            "created": now,
            "trial_end": now + 3 * 86_400,
            "metadata": metadata,
            "items": {"data": [{"id": "si_1", "price": {"id": "price_trial"}}]}
        })
    }

    #[tokio::test]
    async fn subscription_update_resolves_user_from_stored_row() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();
        let mut seeded = crate::domain::subscription::SubscriptionRecord::pending(
            user.clone(),
            "cus_1",
            None,
            PlanType::Trial,
            Timestamp::now(),
        );
        seeded.billing_subscription_id = Some("sub_t".into());
        f.subscriptions.insert(seeded);
        f.billing.put_subscription(trial_subscription(None));

        let result = f
            .handler
            .handle(signed(event(
                "customer.subscription.updated",
                subscription_object("trialing", None),
            )))
            .await
            .unwrap();

        assert_eq!(result.outcome, WebhookOutcome::Processed);
        assert_eq!(f.subscriptions.get(&user).unwrap().status, SubscriptionStatus::Trialing);
    }

    #[tokio::test]
    async fn subscription_deleted_falls_back_to_payload_when_provider_is_down() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();
        f.billing.put_subscription(trial_subscription(Some("user-1")));
        f.handler
            .handle(signed(event(
                "customer.subscription.updated",
                subscription_object("trialing", Some("user-1")),
            )))
            .await
            .unwrap();

        f.billing
            .set_method_error("list_subscriptions", BillingError::network("down"));
        let result = f
            .handler
            .handle(signed(event(
                "customer.subscription.deleted",
                subscription_object("canceled", Some("user-1")),
            )))
            .await
            .unwrap();

        assert_eq!(result.outcome, WebhookOutcome::Processed);
        assert_eq!(f.subscriptions.get(&user).unwrap().status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn invoice_without_subscription_is_ignored() {
        let f = fixture();
        let result = f
            .handler
            .handle(signed(event(
                "invoice.payment_succeeded",
                serde_json::json!({"id": "in_1", "customer": "cus_1"}),
            )))
            .await
            .unwrap();
        assert_eq!(result.outcome, WebhookOutcome::Ignored);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Deferred path
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn write_failures_are_acknowledged_as_deferred() {
        let f = fixture();
        f.billing.put_subscription(trial_subscription(Some("user-1")));
        f.subscriptions.fail_next_writes(2);

        let result = f
            .handler
            .handle(signed(event(
                "customer.subscription.updated",
                subscription_object("trialing", Some("user-1")),
            )))
            .await
            .unwrap();

        assert_eq!(result.outcome, WebhookOutcome::Deferred);
        assert!(f.subscriptions.rows().is_empty());
    }

    #[tokio::test]
    async fn provider_outage_on_invoice_is_deferred() {
        let f = fixture();
        f.billing
            .set_method_error("list_subscriptions", BillingError::network("down"));

        let result = f
            .handler
            .handle(signed(event(
                "invoice.payment_succeeded",
                serde_json::json!({
                    "id": "in_1",
                    "customer": "cus_1",
                    "subscription": "sub_t",
                    "metadata": {"user_id": "user-1"}
                }),
            )))
            .await
            .unwrap();
        assert_eq!(result.outcome, WebhookOutcome::Deferred);
    }
}
