//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port over the Stripe REST API using
//! form-encoded requests and basic auth with the secret key.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key);
//! let adapter = StripeBillingAdapter::new(config);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{metadata_keys, BillingSubscription, StripeSubscription};
use crate::ports::{
    BillingError, BillingErrorCode, BillingProvider, CheckoutSession, CheckoutSessionRequest,
};

use super::api_types::{
    StripeCreatedCheckoutSession, StripeCustomer, StripeErrorEnvelope, StripeList,
};

/// Page size for list endpoints (Stripe's maximum).
const LIST_PAGE_SIZE: &str = "100";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Stripe billing provider adapter.
pub struct StripeBillingAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeBillingAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BillingError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| BillingError::network(e.to_string()))?;

        Self::decode(path, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, BillingError> {
        let response = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(form)
            .send()
            .await
            .map_err(|e| BillingError::network(e.to_string()))?;

        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, BillingError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = error_from_response(status.as_u16(), &body);
            tracing::error!(
                path,
                status = status.as_u16(),
                code = %err.code,
                error = %err.message,
                "Stripe API call failed"
            );
            return Err(err);
        }

        response.json().await.map_err(|e| {
            BillingError::invalid_response(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

/// Maps an HTTP failure to a billing error, keeping Stripe's own code.
fn error_from_response(status: u16, body: &str) -> BillingError {
    let api_error = serde_json::from_str::<StripeErrorEnvelope>(body)
        .ok()
        .map(|env| env.error);

    let code = match status {
        401 | 403 => BillingErrorCode::AuthenticationError,
        404 => BillingErrorCode::NotFound,
        429 => BillingErrorCode::RateLimitExceeded,
        400..=499 => BillingErrorCode::InvalidRequest,
        _ => BillingErrorCode::ProviderError,
    };
    let message = api_error
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| format!("Stripe API error (HTTP {})", status));

    let mut err = BillingError::new(code, message);
    if let Some(provider_code) = api_error.and_then(|e| e.code.or(e.error_type)) {
        err = err.with_provider_code(provider_code);
    }
    err
}

/// Form fields for a subscription-mode checkout session.
///
/// Metadata goes on both the session and `subscription_data` so the
/// subscription carries it after checkout.
fn checkout_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    match (&request.customer_id, &request.customer_email) {
        (Some(customer), _) => form.push(("customer".to_string(), customer.clone())),
        (None, Some(email)) => form.push(("customer_email".to_string(), email.clone())),
        (None, None) => {}
    }

    if let Some(reference) = &request.client_reference_id {
        form.push(("client_reference_id".to_string(), reference.clone()));
    }

    if let Some(days) = request.trial_period_days {
        form.push((
            "subscription_data[trial_period_days]".to_string(),
            days.to_string(),
        ));
    }

    let mut metadata: Vec<_> = request.metadata.to_map().into_iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
        form.push((format!("subscription_data[metadata][{}]", key), value));
    }

    form
}

#[async_trait]
impl BillingProvider for StripeBillingAdapter {
    async fn create_customer(
        &self,
        email: &str,
        user_id: Option<&UserId>,
    ) -> Result<String, BillingError> {
        let mut form = vec![("email".to_string(), email.to_string())];
        if let Some(user_id) = user_id {
            form.push((
                format!("metadata[{}]", metadata_keys::USER_ID),
                user_id.to_string(),
            ));
        }

        let customer: StripeCustomer = self.post("customers", &form).await?;
        tracing::info!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer.id)
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, BillingError> {
        let list: StripeList<StripeCustomer> = self
            .get(
                "customers",
                &[("email", email.to_string()), ("limit", "10".to_string())],
            )
            .await?;

        Ok(list
            .data
            .into_iter()
            .filter(|c| !c.deleted)
            .max_by_key(|c| c.created)
            .map(|c| c.id))
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let session: StripeCreatedCheckoutSession = self
            .post("checkout/sessions", &checkout_form(&request))
            .await?;

        let url = session
            .url
            .ok_or_else(|| BillingError::invalid_response("checkout session has no url"))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<BillingSubscription>, BillingError> {
        let mut subscriptions = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![
                ("customer", customer_id.to_string()),
                ("status", "all".to_string()),
                ("limit", LIST_PAGE_SIZE.to_string()),
            ];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let page: StripeList<StripeSubscription> = self.get("subscriptions", &query).await?;
            starting_after = page.data.last().map(|s| s.id.clone());

            for sub in &page.data {
                let billing = sub
                    .to_billing()
                    .map_err(|e| BillingError::invalid_response(e.to_string()))?;
                subscriptions.push(billing);
            }

            if !page.has_more || starting_after.is_none() {
                break;
            }
        }

        Ok(subscriptions)
    }

    async fn update_subscription_metadata(
        &self,
        subscription_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), BillingError> {
        let form: Vec<_> = metadata
            .into_iter()
            .map(|(k, v)| (format!("metadata[{}]", k), v))
            .collect();

        let _: StripeSubscription = self
            .post(&format!("subscriptions/{}", subscription_id), &form)
            .await?;
        Ok(())
    }
}
