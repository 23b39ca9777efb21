//! Provider-side view of a subscription.
//!
//! `BillingSubscription` is the normalized snapshot the reconciler works on,
//! whether it came from a webhook payload or from a list call against the
//! provider API.

use std::collections::HashMap;

use super::{BillingStatus, PlanType};
use crate::domain::foundation::Timestamp;

/// Metadata keys written at checkout and read back by the reconciler.
pub mod metadata_keys {
    pub const USER_ID: &str = "user_id";
    pub const PLAN_TYPE: &str = "plan_type";
    pub const IS_UPGRADE: &str = "is_upgrade";
    pub const REGISTRATION_TOKEN: &str = "registration_token";
}

/// Typed view over the provider metadata map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionMetadata {
    pub user_id: Option<String>,
    /// Raw value; use [`SubscriptionMetadata::plan_type`] for the typed form.
    pub plan_type: Option<String>,
    pub is_upgrade: bool,
    pub registration_token: Option<String>,
}

impl SubscriptionMetadata {
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let non_empty = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            user_id: non_empty(metadata_keys::USER_ID),
            plan_type: non_empty(metadata_keys::PLAN_TYPE),
            is_upgrade: map
                .get(metadata_keys::IS_UPGRADE)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            registration_token: non_empty(metadata_keys::REGISTRATION_TOKEN),
        }
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(user_id) = &self.user_id {
            map.insert(metadata_keys::USER_ID.to_string(), user_id.clone());
        }
        if let Some(plan_type) = &self.plan_type {
            map.insert(metadata_keys::PLAN_TYPE.to_string(), plan_type.clone());
        }
        map.insert(
            metadata_keys::IS_UPGRADE.to_string(),
            self.is_upgrade.to_string(),
        );
        if let Some(token) = &self.registration_token {
            map.insert(metadata_keys::REGISTRATION_TOKEN.to_string(), token.clone());
        }
        map
    }

    /// The plan chosen at checkout, if the metadata carries a valid one.
    pub fn plan_type(&self) -> Option<PlanType> {
        self.plan_type.as_deref().and_then(PlanType::parse)
    }
}

/// A subscription as the billing provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingSubscription {
    pub id: String,
    pub customer_id: String,
    pub status: BillingStatus,
    pub price_id: Option<String>,
    pub trial_end: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub created: Timestamp,
    pub metadata: SubscriptionMetadata,
}

impl BillingSubscription {
    /// True when a trial end exists and lies strictly after `now`.
    pub fn has_future_trial(&self, now: &Timestamp) -> bool {
        self.trial_end.map(|end| end.is_after(now)).unwrap_or(false)
    }

    /// Flagged at checkout as a paid upgrade or as a direct plan.
    pub fn is_flagged_direct(&self) -> bool {
        self.metadata.is_upgrade || self.metadata.plan_type() == Some(PlanType::Direct)
    }
}
