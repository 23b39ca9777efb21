//! User profile with the denormalized billing mirror.

use serde::Serialize;

use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use crate::domain::subscription::{SubscriptionRecord, SubscriptionStatus};

/// One row per user, created at registration.
///
/// `stripe_customer_id` is set as soon as checkout knows the customer, which
/// lets the access gate tell "webhook pending" from "never checked out".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub stripe_customer_id: Option<String>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Profile {
    pub fn new(id: UserId, email: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            email: email.into(),
            stripe_customer_id: None,
            subscription_status: None,
            trial_ends_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_billing_relationship(&self) -> bool {
        self.stripe_customer_id.is_some()
    }

    /// Copies the reconciled status onto the profile.
    pub fn mirror(&mut self, record: &SubscriptionRecord, now: Timestamp) {
        if let Some(customer_id) = &record.billing_customer_id {
            self.stripe_customer_id = Some(customer_id.clone());
        }
        self.subscription_status = Some(record.status);
        self.trial_ends_at = record.trial_ends_at;
        self.updated_at = now;
    }
}

/// Lowercases and trims an email, rejecting values without a local part and
/// a domain.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::empty_field("email"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ValidationError::invalid_format("email", "expected local@domain")),
    }
}
