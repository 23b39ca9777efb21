//! Billing provider port.
//!
//! The only way the application talks to Stripe. Built once at startup and
//! injected as `Arc<dyn BillingProvider>`; tests use the mock adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::subscription::{BillingSubscription, SubscriptionError, SubscriptionMetadata};

/// Port for the billing provider API.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer. `user_id` is stored as customer metadata when known.
    async fn create_customer(
        &self,
        email: &str,
        user_id: Option<&UserId>,
    ) -> Result<String, BillingError>;

    /// Look up a customer by email. The most recent match wins.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, BillingError>;

    /// Create a subscription-mode checkout session.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BillingError>;

    /// All subscriptions of a customer, whatever their status.
    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<BillingSubscription>, BillingError>;

    /// Merge keys into a subscription's metadata.
    async fn update_subscription_metadata(
        &self,
        subscription_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), BillingError>;
}

/// Request to create a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    /// Existing customer; when absent checkout creates one from the email.
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub price_id: String,
    /// Our user id, for signed-in users.
    pub client_reference_id: Option<String>,
    /// Copied onto both the session and the subscription it creates.
    pub metadata: SubscriptionMetadata,
    pub trial_period_days: Option<u32>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Checkout session for payment completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID.
    pub id: String,
    /// URL for customer to complete checkout.
    pub url: String,
}

/// Errors from billing provider operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingError {
    pub code: BillingErrorCode,
    pub message: String,
    /// Provider's error code (if available).
    pub provider_code: Option<String>,
    pub retryable: bool,
}

impl BillingError {
    pub fn new(code: BillingErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::AuthenticationError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(BillingErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::InvalidResponse, message)
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BillingError {}

impl From<BillingError> for DomainError {
    fn from(err: BillingError) -> Self {
        let code = match err.code {
            BillingErrorCode::NotFound => ErrorCode::NotFound,
            _ => ErrorCode::UpstreamError,
        };
        DomainError::new(code, err.message)
    }
}

impl From<BillingError> for SubscriptionError {
    fn from(err: BillingError) -> Self {
        SubscriptionError::upstream(err.to_string())
    }
}

/// Billing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingErrorCode {
    /// Network connectivity issue or timeout.
    NetworkError,
    /// API key rejected.
    AuthenticationError,
    /// Resource not found.
    NotFound,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// The request was rejected as invalid.
    InvalidRequest,
    /// The response could not be decoded.
    InvalidResponse,
    /// Provider-side failure (5xx).
    ProviderError,
}

impl BillingErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingErrorCode::NetworkError
                | BillingErrorCode::RateLimitExceeded
                | BillingErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for BillingErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BillingErrorCode::NetworkError => "network_error",
            BillingErrorCode::AuthenticationError => "authentication_error",
            BillingErrorCode::NotFound => "not_found",
            BillingErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            BillingErrorCode::InvalidRequest => "invalid_request",
            BillingErrorCode::InvalidResponse => "invalid_response",
            BillingErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
