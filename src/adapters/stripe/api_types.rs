//! Stripe REST response types.
//!
//! Only the fields the adapter reads. Subscriptions reuse the webhook object
//! types since the API returns the same shape.

use serde::Deserialize;

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub deleted: bool,
}

/// Paginated list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,

    #[serde(default)]
    pub has_more: bool,
}

/// Checkout session as returned at creation, including the hosted URL.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCreatedCheckoutSession {
    pub id: String,

    #[serde(default)]
    pub url: Option<String>,
}

/// Error envelope: `{"error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorEnvelope {
    pub error: StripeApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}
